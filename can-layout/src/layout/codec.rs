//! Payload encoder and decoder
//!
//! Both directions walk the compiled filters of a layout, one signal group at
//! a time. A muxor is followed immediately by the filters of the sub-layout it
//! selects, so only the active path of the multiplex tree is visited:
//! - encode selects sub-layouts by each muxor's `encoded_value`
//! - decode selects them by the raw value just read from the payload

use super::filter::SignalLayoutFilter;
use super::{LayoutKey, LayoutTree};
use crate::entity::EntityId;
use crate::signal::{Endianness, Signal, SignalTypeKind, SignalVariant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalValueType {
    Flag,
    Int,
    Uint,
    Float,
    Enum,
}

impl fmt::Display for SignalValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValueType::Flag => write!(f, "flag"),
            SignalValueType::Int => write!(f, "int"),
            SignalValueType::Uint => write!(f, "uint"),
            SignalValueType::Float => write!(f, "float"),
            SignalValueType::Enum => write!(f, "enum"),
        }
    }
}

/// Physical value of a decoded signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalValue {
    /// Single-bit flag
    Flag(bool),
    /// Signed integer after scale and offset
    Int(i64),
    /// Unsigned integer after scale and offset; muxors decode to this
    Uint(u64),
    /// Decimal or custom value after scale and offset
    Float(f64),
    /// Name of the enum value, or the configured unknown label
    Enum(String),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Flag(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            SignalValue::Int(v) => write!(f, "{}", v),
            SignalValue::Uint(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
            SignalValue::Enum(v) => write!(f, "{}", v),
        }
    }
}

impl SignalValue {
    pub fn value_type(&self) -> SignalValueType {
        match self {
            SignalValue::Flag(_) => SignalValueType::Flag,
            SignalValue::Int(_) => SignalValueType::Int,
            SignalValue::Uint(_) => SignalValueType::Uint,
            SignalValue::Float(_) => SignalValueType::Float,
            SignalValue::Enum(_) => SignalValueType::Enum,
        }
    }

    /// Numeric view of the value; enum names are not numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Flag(v) => Some(if *v { 1.0 } else { 0.0 }),
            SignalValue::Int(v) => Some(*v as f64),
            SignalValue::Uint(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Enum(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SignalValue::Flag(v) => Some(i64::from(*v)),
            SignalValue::Int(v) => Some(*v),
            SignalValue::Uint(v) => i64::try_from(*v).ok(),
            SignalValue::Float(v) => Some(*v as i64),
            SignalValue::Enum(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SignalValue::Flag(v) => Some(u64::from(*v)),
            SignalValue::Int(v) => u64::try_from(*v).ok(),
            SignalValue::Uint(v) => Some(*v),
            SignalValue::Float(_) | SignalValue::Enum(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            SignalValue::Flag(v) => *v,
            SignalValue::Int(v) => *v != 0,
            SignalValue::Uint(v) => *v != 0,
            SignalValue::Float(v) => *v != 0.0,
            SignalValue::Enum(v) => !v.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SignalValue::Enum(v) => Some(v),
            _ => None,
        }
    }
}

/// One decoded signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecoding {
    pub signal_id: EntityId,
    pub name: String,
    /// Bits read from the payload, before any conversion
    pub raw_value: u64,
    pub value: SignalValue,
    /// Unit symbol of standard signals that carry a unit
    pub unit: Option<String>,
}

impl SignalDecoding {
    pub fn value_type(&self) -> SignalValueType {
        self.value.value_type()
    }
}

impl fmt::Display for SignalDecoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)?;
        if let Some(unit) = &self.unit {
            write!(f, " {}", unit)?;
        }
        Ok(())
    }
}

fn low_bits(length: u8) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Sign-extend the low `bits` bits of `value`
fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Scatter `signal`'s encoded value over its filters
fn scatter(signal: &Signal, filters: &[SignalLayoutFilter], buf: &mut [u8]) {
    let value = signal.encoded_value();
    let big = signal.endianness() == Endianness::Big;
    let mut consumed = 0u32;
    let mut remaining = signal.size() as u32;

    for f in filters {
        let bits = if big {
            remaining -= f.length as u32;
            value.checked_shr(remaining).unwrap_or(0) & low_bits(f.length)
        } else {
            let bits = value.checked_shr(consumed).unwrap_or(0) & low_bits(f.length);
            consumed += f.length as u32;
            bits
        };

        if let Some(byte) = buf.get_mut(f.byte_index as usize) {
            *byte |= ((bits as u8) << f.left_offset) & f.mask;
        }
    }
}

/// Gather the raw value of one signal, `None` if the payload is too short
fn gather(signal: &Signal, filters: &[SignalLayoutFilter], data: &[u8]) -> Option<u64> {
    let big = signal.endianness() == Endianness::Big;
    let mut raw = 0u64;
    let mut consumed = 0u32;

    for f in filters {
        let byte = *data.get(f.byte_index as usize)?;
        let bits = ((byte & f.mask) >> f.left_offset) as u64;
        if big {
            raw = raw.checked_shl(f.length as u32).unwrap_or(0) | bits;
        } else {
            raw |= bits << consumed;
            consumed += f.length as u32;
        }
    }
    Some(raw)
}

fn signal_groups(filters: &[SignalLayoutFilter]) -> impl Iterator<Item = &[SignalLayoutFilter]> {
    filters.chunk_by(|a, b| a.signal_id == b.signal_id)
}

impl LayoutTree {
    /// Sub-layout selected by `value` in the layer of muxor `id`
    fn active_layout(&self, id: EntityId, value: u64) -> Option<LayoutKey> {
        let layer = self.layers.get(&id)?;
        usize::try_from(value)
            .ok()
            .and_then(|i| layer.layouts.get(i).copied())
    }

    /// Payload of `key`'s size built from the active path below `key`
    pub(crate) fn encode(&self, key: LayoutKey) -> Vec<u8> {
        let mut buf = vec![0u8; self.layout(key).size_byte];
        self.encode_layout(key, &mut buf);
        log::trace!("Encoded layout {:?}: {:02X?}", key, buf);
        buf
    }

    fn encode_layout(&self, key: LayoutKey, buf: &mut [u8]) {
        for group in signal_groups(&self.layout(key).filters) {
            let signal = self.signal(group[0].signal_id);
            scatter(signal, group, buf);

            if signal.is_muxor() {
                if let Some(sub) = self.active_layout(signal.entity_id(), signal.encoded_value()) {
                    self.encode_layout(sub, buf);
                }
            }
        }
    }

    /// Decode `data` along the path selected by the muxor values it carries
    pub(crate) fn decode(&self, key: LayoutKey, data: &[u8]) -> Vec<SignalDecoding> {
        let size_byte = self.layout(key).size_byte;
        if data.len() < size_byte {
            if self.config.strict_payload_length {
                log::warn!(
                    "Payload of {} bytes is shorter than layout of {} bytes, skipping decode",
                    data.len(),
                    size_byte
                );
                return Vec::new();
            }
            log::debug!("Payload of {} bytes is shorter than layout of {} bytes", data.len(), size_byte);
        }

        let mut out = Vec::new();
        self.decode_layout(key, data, &mut out);
        out
    }

    fn decode_layout(&self, key: LayoutKey, data: &[u8], out: &mut Vec<SignalDecoding>) {
        for group in signal_groups(&self.layout(key).filters) {
            let signal = self.signal(group[0].signal_id);
            let Some(raw) = gather(signal, group, data) else {
                log::warn!("Payload too short for {}, skipping", signal);
                continue;
            };

            out.push(SignalDecoding {
                signal_id: signal.entity_id(),
                name: signal.name().to_string(),
                raw_value: raw,
                value: self.convert(signal, raw),
                unit: unit_of(signal),
            });

            if signal.is_muxor() {
                match self.active_layout(signal.entity_id(), raw) {
                    Some(sub) => self.decode_layout(sub, data, out),
                    None => log::warn!("Muxor {} selects missing layout {}", signal.name(), raw),
                }
            }
        }
    }

    /// Raw bits to physical value
    fn convert(&self, signal: &Signal, raw: u64) -> SignalValue {
        match signal.variant() {
            SignalVariant::Muxor(_) => SignalValue::Uint(raw),
            SignalVariant::Enum(e) => {
                let name = e
                    .signal_enum()
                    .value_by_index(raw)
                    .map(|v| v.name.clone())
                    .unwrap_or_else(|| self.config.unknown_enum_label.clone());
                SignalValue::Enum(name)
            }
            SignalVariant::Standard(s) => {
                let t = s.signal_type();
                match t.kind() {
                    SignalTypeKind::Flag => SignalValue::Flag(raw != 0),
                    SignalTypeKind::Integer if t.signed() => SignalValue::Int(
                        sign_extend(raw, t.size())
                            .wrapping_mul(t.scale() as i64)
                            .wrapping_sub(t.offset() as i64),
                    ),
                    SignalTypeKind::Integer => SignalValue::Uint(
                        raw.wrapping_mul(t.scale() as u64)
                            .wrapping_sub(t.offset() as u64),
                    ),
                    SignalTypeKind::Decimal | SignalTypeKind::Custom => {
                        let base = if t.signed() {
                            sign_extend(raw, t.size()) as f64
                        } else {
                            raw as f64
                        };
                        SignalValue::Float(base * t.scale() + t.offset())
                    }
                }
            }
        }
    }
}

fn unit_of(signal: &Signal) -> Option<String> {
    match signal.variant() {
        SignalVariant::Standard(s) => s.unit().map(|u| u.symbol().to_string()),
        _ => None,
    }
}
