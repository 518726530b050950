//! Filter compilation
//!
//! A layout is reduced to a flat list of per-byte filters. Each filter says
//! which bits of one payload byte belong to which signal, so the codec never
//! has to reason about bit ranges again.

use super::{LayoutKey, LayoutTree};
use crate::entity::EntityId;
use crate::signal::{Endianness, Signal};
use serde::Serialize;

/// One byte-slice contribution of one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalLayoutFilter {
    /// Signal the bits belong to
    pub signal_id: EntityId,
    /// Payload byte the filter reads
    pub byte_index: u8,
    /// Bits of the byte owned by the signal
    pub mask: u8,
    /// Number of bits selected by `mask`
    pub length: u8,
    /// Shift that moves the selected bits down to bit 0
    pub left_offset: u8,
}

fn low_mask(bits: usize) -> u8 {
    ((1u16 << bits) - 1) as u8
}

/// Filters of a single signal, first byte first
pub(crate) fn compile_signal(signal: &Signal) -> Vec<SignalLayoutFilter> {
    let signal_id = signal.entity_id();
    let start = signal.start_pos();
    let size = signal.size();

    let first = start / 8;
    let last = (start + size - 1) / 8;
    let offset = start % 8;

    let filter = |byte: usize, mask: u8, length: usize, left_offset: usize| SignalLayoutFilter {
        signal_id,
        byte_index: byte as u8,
        mask,
        length: length as u8,
        left_offset: left_offset as u8,
    };

    if first == last {
        return vec![filter(first, low_mask(size) << offset, size, offset)];
    }

    let big = signal.endianness() == Endianness::Big;
    let mut filters = Vec::with_capacity(last - first + 1);

    let first_len = 8 - offset;
    if big {
        filters.push(filter(first, 0xFF >> offset, first_len, 0));
    } else {
        filters.push(filter(first, 0xFF << offset, first_len, offset));
    }

    for byte in first + 1..last {
        filters.push(filter(byte, 0xFF, 8, 0));
    }

    let remaining = start + size - last * 8;
    if big {
        filters.push(filter(last, low_mask(remaining) << (8 - remaining), remaining, 8 - remaining));
    } else {
        filters.push(filter(last, low_mask(remaining), remaining, 0));
    }

    filters
}

impl LayoutTree {
    /// Rebuild the filters of `key` and of every layout nested below it
    pub(crate) fn regenerate_filters(&mut self, key: LayoutKey) {
        for k in self.subtree_layouts(key) {
            let filters: Vec<SignalLayoutFilter> = self
                .layout(k)
                .ibst
                .in_order()
                .flat_map(|(_, id)| compile_signal(self.signal(*id)))
                .collect();
            log::trace!("Compiled {} filters for layout {:?}", filters.len(), k);
            self.layout_mut(k).filters = filters;
        }
    }
}
