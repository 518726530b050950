//! Signal layouts
//!
//! A layout is a fixed-width payload holding non-overlapping signals in an
//! interval tree, plus the multiplexed layers attached to it. The root layout
//! belongs to a message; every other layout is a sub-layout of a layer.

use super::filter::SignalLayoutFilter;
use super::mux_layer::{MultiplexedLayer, MultiplexedLayerMut, MultiplexedLayerRef};
use super::{LayoutKey, LayoutTree, NameScope, SignalDecoding};
use crate::attribute::AttributeAssignments;
use crate::entity::EntityId;
use crate::error::{Cause, LayoutError, Result};
use crate::ibst::{Interval, IntervalTree};
use crate::signal::{Signal, SignalLocation};
use std::collections::HashMap;

/// Owner of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LayoutParent {
    Message,
    Layer(EntityId),
}

#[derive(Debug)]
pub(crate) struct SignalLayout {
    pub(crate) size_byte: usize,
    pub(crate) ibst: IntervalTree<EntityId>,
    /// Attached layers in insertion order
    pub(crate) layers: Vec<EntityId>,
    pub(crate) filters: Vec<SignalLayoutFilter>,
    pub(crate) parent: LayoutParent,
}

impl SignalLayout {
    pub(crate) fn new(size_byte: usize, parent: LayoutParent) -> Self {
        Self {
            size_byte,
            ibst: IntervalTree::new(),
            layers: Vec::new(),
            filters: Vec::new(),
            parent,
        }
    }
}

impl LayoutTree {
    /// Insert a new top-level signal into the root layout
    pub(crate) fn insert_root_signal(&mut self, mut signal: Signal, start_pos: usize) -> Result<EntityId> {
        let root = self.root;
        self.verify_new_signal(&signal, NameScope::Message)?;
        self.verify_placement(root, start_pos, signal.size(), None)?;

        let id = signal.entity_id();
        signal.set_start_pos(start_pos);
        signal.location = Some(SignalLocation::Layout(root));

        self.root_names.insert(signal.name().to_string(), id);
        self.layout_mut(root).ibst.insert(signal.interval(), id);
        log::debug!("Inserted {}", signal);
        self.signals.insert(id, signal);
        self.regenerate_filters(root);
        Ok(id)
    }

    /// Remove a non-muxor signal from wherever it lives
    pub(crate) fn delete_signal(&mut self, id: EntityId) -> Result<Signal> {
        let signal = self.signals.get(&id).ok_or(LayoutError::not_found(id))?;
        if signal.is_muxor() {
            return Err(LayoutError::Muxor {
                name: signal.name().to_string(),
            });
        }

        match signal.location {
            Some(SignalLocation::Layer(layer_id)) => self.delete_layer_signal(layer_id, id),
            _ => self.delete_root_signal(id),
        }
    }

    fn delete_root_signal(&mut self, id: EntityId) -> Result<Signal> {
        let root = self.root;
        let mut signal = self.signals.remove(&id).ok_or(LayoutError::not_found(id))?;
        self.layout_mut(root).ibst.delete(signal.start_pos(), &id);
        self.root_names.remove(signal.name());
        signal.location = None;
        self.regenerate_filters(root);
        log::debug!("Deleted {}", signal);
        Ok(signal)
    }

    /// Remove every top-level signal and layer
    pub(crate) fn clear_root(&mut self) {
        let root = self.root;
        let layers = std::mem::take(&mut self.layout_mut(root).layers);
        for layer_id in layers {
            self.drop_layer(layer_id);
        }
        for id in self.root_names.values() {
            self.signals.remove(id);
        }
        self.root_names.clear();
        self.layout_mut(root).ibst.clear();
        self.regenerate_filters(root);
    }

    /// Move signal `id` to `start_pos` in every layout holding it
    pub(crate) fn update_start_pos(&mut self, id: EntityId, start_pos: usize) -> Result<()> {
        let signal = self.signal(id);
        let old = signal.start_pos();
        let size = signal.size();
        if old == start_pos {
            return Ok(());
        }

        for key in self.signal_layouts(id) {
            self.verify_placement(key, start_pos, size, Some(id))?;
        }

        self.signal_mut(id).set_start_pos(start_pos);
        self.refresh_signal_interval(id, old);
        log::debug!("Moved {}", self.signal(id));
        Ok(())
    }

    /// Resize the root layout and every layout below it
    pub(crate) fn resize(&mut self, size_byte: usize) -> Result<()> {
        if size_byte > self.config.max_size_byte {
            return Err(LayoutError::Size {
                size: size_byte,
                cause: Cause::TooBig,
            });
        }

        let keys = self.subtree_layouts(self.root);
        for key in &keys {
            if let Some(high) = self.layout(*key).ibst.max_high() {
                if high >= size_byte * 8 {
                    return Err(LayoutError::Size {
                        size: size_byte,
                        cause: Cause::TooSmall,
                    });
                }
            }
        }

        for key in keys {
            self.layout_mut(key).size_byte = size_byte;
        }
        log::debug!("Resized layout tree to {} bytes", size_byte);
        Ok(())
    }

    /// Pack the signals of the root layout from bit 0, in start position order
    pub(crate) fn compact(&mut self, key: LayoutKey) -> bool {
        if key != self.root || !self.layout(key).layers.is_empty() {
            return false;
        }

        let ids: Vec<EntityId> = self.layout(key).ibst.in_order().map(|(_, id)| *id).collect();
        let mut tree = IntervalTree::new();
        let mut pos = 0;
        for id in ids {
            let signal = self.signal_mut(id);
            signal.set_start_pos(pos);
            pos += signal.size();
            tree.insert(signal.interval(), id);
        }

        self.layout_mut(key).ibst = tree;
        self.regenerate_filters(key);
        log::debug!("Compacted layout {:?} to {} bits", key, pos);
        true
    }

    /// Create a muxor at `start_pos` in layout `key` and attach a new layer
    pub(crate) fn add_multiplexed_layer(
        &mut self,
        key: LayoutKey,
        muxor_name: &str,
        start_pos: usize,
        layout_count: usize,
    ) -> Result<EntityId> {
        if layout_count == 0 {
            return Err(LayoutError::arg("layout_count", Cause::IsZero));
        }

        let mut muxor = Signal::new_muxor(muxor_name, layout_count);
        self.verify_new_signal(&muxor, self.layout_scope(key))?;
        self.verify_placement(key, start_pos, muxor.size(), None)?;

        let id = muxor.entity_id();
        muxor.set_start_pos(start_pos);
        muxor.location = Some(SignalLocation::Layout(key));

        let size_byte = self.layout(key).size_byte;
        let layouts = (0..layout_count)
            .map(|_| self.alloc_layout(size_byte, LayoutParent::Layer(id)))
            .collect();

        let mut signal_names = HashMap::new();
        signal_names.insert(muxor_name.to_string(), id);

        self.layers.insert(
            id,
            MultiplexedLayer {
                muxor: id,
                attached_layout: key,
                layouts,
                signal_layout_ids: HashMap::new(),
                signal_names,
                attributes: AttributeAssignments::new(),
            },
        );

        let layout = self.layout_mut(key);
        layout.ibst.insert(muxor.interval(), id);
        layout.layers.push(id);
        log::debug!("Added multiplexed layer {} with {} layouts", muxor, layout_count);
        self.signals.insert(id, muxor);
        self.regenerate_filters(key);
        Ok(id)
    }

    pub(crate) fn delete_multiplexed_layer(&mut self, key: LayoutKey, layer_id: EntityId) -> Result<()> {
        if !self.layout(key).layers.contains(&layer_id) {
            return Err(LayoutError::not_found(layer_id));
        }
        self.drop_layer(layer_id);
        self.regenerate_filters(key);
        Ok(())
    }
}

/// Read-only view of one layout
#[derive(Debug, Clone, Copy)]
pub struct SignalLayoutRef<'a> {
    tree: &'a LayoutTree,
    key: LayoutKey,
}

impl<'a> SignalLayoutRef<'a> {
    pub(crate) fn new(tree: &'a LayoutTree, key: LayoutKey) -> Self {
        Self { tree, key }
    }

    fn layout(&self) -> &'a SignalLayout {
        self.tree.layout(self.key)
    }

    pub fn key(&self) -> LayoutKey {
        self.key
    }

    pub fn size_byte(&self) -> usize {
        self.layout().size_byte
    }

    /// Layer this layout belongs to, `None` for the root layout
    pub fn parent_layer(&self) -> Option<MultiplexedLayerRef<'a>> {
        match self.layout().parent {
            LayoutParent::Message => None,
            LayoutParent::Layer(id) => Some(MultiplexedLayerRef::new(self.tree, id)),
        }
    }

    /// Signals placed directly in this layout, in start position order
    pub fn signals(&self) -> Vec<&'a Signal> {
        let tree = self.tree;
        self.layout()
            .ibst
            .in_order()
            .map(|(_, id)| tree.signal(*id))
            .collect()
    }

    pub fn signal_count(&self) -> usize {
        self.layout().ibst.len()
    }

    /// First signal overlapping `interval` in this layout only
    pub fn intersecting_signal(&self, interval: Interval) -> Option<&'a Signal> {
        let tree = self.tree;
        self.layout().ibst.intersects(interval).map(|id| tree.signal(*id))
    }

    pub fn filters(&self) -> &'a [SignalLayoutFilter] {
        &self.layout().filters
    }

    /// Attached layers ordered by muxor start position
    pub fn multiplexed_layers(&self) -> Vec<MultiplexedLayerRef<'a>> {
        let mut layers: Vec<MultiplexedLayerRef<'a>> = self
            .layout()
            .layers
            .iter()
            .map(|id| MultiplexedLayerRef::new(self.tree, *id))
            .collect();
        layers.sort_by_key(|l| l.muxor().start_pos());
        layers
    }

    /// Payload built from every signal's encoded value along the active path
    pub fn encode(&self) -> Vec<u8> {
        self.tree.encode(self.key)
    }

    pub fn decode(&self, data: &[u8]) -> Vec<SignalDecoding> {
        self.tree.decode(self.key, data)
    }
}

/// Mutable handle on one layout
#[derive(Debug)]
pub struct SignalLayoutMut<'a> {
    tree: &'a mut LayoutTree,
    key: LayoutKey,
}

impl<'a> SignalLayoutMut<'a> {
    pub(crate) fn new(tree: &'a mut LayoutTree, key: LayoutKey) -> Self {
        Self { tree, key }
    }

    pub fn view(&self) -> SignalLayoutRef<'_> {
        SignalLayoutRef::new(self.tree, self.key)
    }

    /// Add a multiplexed layer whose muxor sits at `muxor_start_pos`
    ///
    /// Returns the id of the new layer, which is also the id of its muxor.
    pub fn add_multiplexed_layer(
        &mut self,
        muxor_name: &str,
        muxor_start_pos: usize,
        layout_count: usize,
    ) -> Result<EntityId> {
        self.tree
            .add_multiplexed_layer(self.key, muxor_name, muxor_start_pos, layout_count)
    }

    /// Remove an attached layer together with its muxor and everything it holds
    pub fn delete_multiplexed_layer(&mut self, layer_id: EntityId) -> Result<()> {
        self.tree.delete_multiplexed_layer(self.key, layer_id)
    }

    /// Repack signals from bit 0
    ///
    /// Only the root layout of a message without multiplexed layers can be
    /// compacted; returns false otherwise. A sub-layout packed down to bit 0
    /// would overlap the muxor of its own layer, which sits in the parent
    /// layout, so sub-layouts are left untouched.
    pub fn compact(&mut self) -> bool {
        self.tree.compact(self.key)
    }

    /// Mutable handle on a layer attached to this layout
    pub fn layer_mut(self, layer_id: EntityId) -> Result<MultiplexedLayerMut<'a>> {
        if !self.tree.layout(self.key).layers.contains(&layer_id) {
            return Err(LayoutError::not_found(layer_id));
        }
        Ok(MultiplexedLayerMut::new(self.tree, layer_id))
    }
}
