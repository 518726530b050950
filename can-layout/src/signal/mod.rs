//! Signals and the shared definitions they reference
//!
//! A [`Signal`] is one of three variants:
//! - standard: encoded through a shared [`SignalType`], optionally with a [`SignalUnit`]
//! - enum: encoded through a shared [`SignalEnum`]
//! - muxor: created by the layout engine when a multiplexed layer is added
//!
//! Signals are built detached and then moved into a message. Once inserted,
//! they are only reachable through shared references or through
//! [`SignalMut`](crate::SignalMut), which re-validates the layout on every change.

pub mod signal_enum;
pub mod signal_type;
pub mod signal_unit;

pub use signal_enum::{SignalEnum, SignalEnumValue};
pub use signal_type::{SignalType, SignalTypeKind};
pub use signal_unit::{SignalUnit, SignalUnitKind};

use crate::attribute::{Attribute, AttributeAssignment, AttributeAssignments, AttributeValue};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Cause, LayoutError, Result};
use crate::ibst::Interval;
use crate::layout::LayoutKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signal_type::size_mask;
use std::fmt;
use std::sync::Arc;

/// Byte order of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little-endian"),
            Endianness::Big => write!(f, "big-endian"),
        }
    }
}

/// How a signal is scheduled for transmission; carried as metadata only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSendType {
    #[default]
    Unset,
    Cyclic,
    OnWrite,
    OnWriteWithRepetition,
    OnChange,
    OnChangeWithRepetition,
    IfActive,
    IfActiveWithRepetition,
}

/// Variant tag of a [`Signal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Standard,
    Enum,
    Muxor,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Standard => write!(f, "standard"),
            SignalKind::Enum => write!(f, "enum"),
            SignalKind::Muxor => write!(f, "muxor"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StandardSignal {
    signal_type: Arc<SignalType>,
    unit: Option<Arc<SignalUnit>>,
}

impl StandardSignal {
    pub fn signal_type(&self) -> &Arc<SignalType> {
        &self.signal_type
    }

    pub fn unit(&self) -> Option<&Arc<SignalUnit>> {
        self.unit.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct EnumSignal {
    signal_enum: Arc<SignalEnum>,
}

impl EnumSignal {
    pub fn signal_enum(&self) -> &Arc<SignalEnum> {
        &self.signal_enum
    }
}

#[derive(Debug, Clone)]
pub struct MuxorSignal {
    layout_count: usize,
}

impl MuxorSignal {
    pub fn layout_count(&self) -> usize {
        self.layout_count
    }
}

#[derive(Debug, Clone)]
pub enum SignalVariant {
    Standard(StandardSignal),
    Enum(EnumSignal),
    Muxor(MuxorSignal),
}

/// Where an inserted signal lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalLocation {
    /// Directly in one layout: top-level signals and muxors
    Layout(LayoutKey),
    /// Member of a multiplexed layer, in one or more of its sub-layouts
    Layer(EntityId),
}

/// Bits needed by a muxor selecting among `layout_count` layouts
pub(crate) fn muxor_size(layout_count: usize) -> usize {
    if layout_count <= 2 {
        1
    } else {
        (usize::BITS - (layout_count - 1).leading_zeros()) as usize
    }
}

/// Convert a DBC big-endian ("sawtooth") start bit to a normalized start position
pub fn start_pos_from_big_endian(bit: usize) -> usize {
    bit + 7 - 2 * (bit % 8)
}

/// Convert a normalized start position back to the DBC big-endian start bit
pub fn start_pos_to_big_endian(start_pos: usize) -> usize {
    start_pos_from_big_endian(start_pos)
}

#[derive(Debug)]
pub struct Signal {
    entity: Entity,
    variant: SignalVariant,
    /// Index of the least significant bit, counted from byte 0 bit 0
    start_pos: usize,
    endianness: Endianness,
    /// Raw value used by the encoder
    encoded_value: u64,
    start_value: f64,
    send_type: SignalSendType,
    attributes: AttributeAssignments,
    pub(crate) location: Option<SignalLocation>,
}

impl Signal {
    fn build(name: impl Into<String>, variant: SignalVariant) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::Signal),
            variant,
            start_pos: 0,
            endianness: Endianness::Little,
            encoded_value: 0,
            start_value: 0.0,
            send_type: SignalSendType::Unset,
            attributes: AttributeAssignments::new(),
            location: None,
        }
    }

    /// Standard signal encoded through `signal_type`
    pub fn new_standard(name: impl Into<String>, signal_type: Arc<SignalType>) -> Self {
        Self::build(
            name,
            SignalVariant::Standard(StandardSignal {
                signal_type,
                unit: None,
            }),
        )
    }

    /// Enum signal encoded through `signal_enum`
    pub fn new_enum(name: impl Into<String>, signal_enum: Arc<SignalEnum>) -> Self {
        Self::build(name, SignalVariant::Enum(EnumSignal { signal_enum }))
    }

    pub(crate) fn new_muxor(name: impl Into<String>, layout_count: usize) -> Self {
        Self::build(name, SignalVariant::Muxor(MuxorSignal { layout_count }))
    }

    /// Builder method: set the unit of a standard signal
    pub fn with_unit(mut self, unit: Arc<SignalUnit>) -> Result<Self> {
        self.set_unit(Some(unit))?;
        Ok(self)
    }

    /// Builder method: set the byte order
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn desc(&self) -> &str {
        self.entity.desc()
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.entity.create_time()
    }

    pub fn kind(&self) -> SignalKind {
        match self.variant {
            SignalVariant::Standard(_) => SignalKind::Standard,
            SignalVariant::Enum(_) => SignalKind::Enum,
            SignalVariant::Muxor(_) => SignalKind::Muxor,
        }
    }

    pub fn variant(&self) -> &SignalVariant {
        &self.variant
    }

    pub fn is_muxor(&self) -> bool {
        matches!(self.variant, SignalVariant::Muxor(_))
    }

    /// Size in bits, derived from the type, enum or layout count
    pub fn size(&self) -> usize {
        match &self.variant {
            SignalVariant::Standard(s) => s.signal_type.size(),
            SignalVariant::Enum(e) => e.signal_enum.size(),
            SignalVariant::Muxor(m) => muxor_size(m.layout_count),
        }
    }

    pub fn start_pos(&self) -> usize {
        self.start_pos
    }

    pub fn low(&self) -> usize {
        self.start_pos
    }

    pub fn high(&self) -> usize {
        self.start_pos + self.size() - 1
    }

    pub fn interval(&self) -> Interval {
        Interval::from_start_size(self.start_pos, self.size())
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn encoded_value(&self) -> u64 {
        self.encoded_value
    }

    pub fn start_value(&self) -> f64 {
        self.start_value
    }

    pub fn send_type(&self) -> SignalSendType {
        self.send_type
    }

    /// Whether the signal is currently owned by a message
    pub fn is_attached(&self) -> bool {
        self.location.is_some()
    }

    pub fn as_standard(&self) -> Result<&StandardSignal> {
        match &self.variant {
            SignalVariant::Standard(s) => Ok(s),
            _ => Err(self.conversion_error(SignalKind::Standard)),
        }
    }

    pub fn as_enum(&self) -> Result<&EnumSignal> {
        match &self.variant {
            SignalVariant::Enum(e) => Ok(e),
            _ => Err(self.conversion_error(SignalKind::Enum)),
        }
    }

    pub fn as_muxor(&self) -> Result<&MuxorSignal> {
        match &self.variant {
            SignalVariant::Muxor(m) => Ok(m),
            _ => Err(self.conversion_error(SignalKind::Muxor)),
        }
    }

    fn conversion_error(&self, to: SignalKind) -> LayoutError {
        LayoutError::Conversion {
            from: self.kind().to_string(),
            to: to.to_string(),
        }
    }

    pub fn update_name(&mut self, name: impl Into<String>) {
        self.entity.set_name(name);
    }

    pub fn set_desc(&mut self, desc: impl Into<String>) {
        self.entity.set_desc(desc);
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn set_start_value(&mut self, start_value: f64) {
        self.start_value = start_value;
    }

    pub fn set_send_type(&mut self, send_type: SignalSendType) {
        self.send_type = send_type;
    }

    /// Check that `value` is encodable by this signal
    pub fn verify_encoded_value(&self, value: u64) -> Result<()> {
        let fits = match &self.variant {
            SignalVariant::Muxor(m) => value < m.layout_count as u64,
            _ => value <= size_mask(self.size()),
        };
        if fits {
            Ok(())
        } else {
            Err(LayoutError::arg("encoded_value", Cause::OutOfBounds))
        }
    }

    pub fn update_encoded_value(&mut self, value: u64) -> Result<()> {
        self.verify_encoded_value(value)?;
        self.encoded_value = value;
        Ok(())
    }

    /// Set or clear the unit of a standard signal
    pub fn set_unit(&mut self, unit: Option<Arc<SignalUnit>>) -> Result<()> {
        match &mut self.variant {
            SignalVariant::Standard(s) => {
                s.unit = unit;
                Ok(())
            }
            _ => Err(self.conversion_error(SignalKind::Standard)),
        }
    }

    /// Replace the type of a detached standard signal
    pub fn update_type(&mut self, signal_type: Arc<SignalType>) -> Result<()> {
        match &mut self.variant {
            SignalVariant::Standard(s) => {
                s.signal_type = signal_type;
            }
            _ => return Err(self.conversion_error(SignalKind::Standard)),
        }
        self.truncate_encoded_value();
        Ok(())
    }

    /// Replace the enum of a detached enum signal
    pub fn update_enum(&mut self, signal_enum: Arc<SignalEnum>) -> Result<()> {
        match &mut self.variant {
            SignalVariant::Enum(e) => {
                e.signal_enum = signal_enum;
            }
            _ => return Err(self.conversion_error(SignalKind::Enum)),
        }
        self.truncate_encoded_value();
        Ok(())
    }

    pub fn assign_attribute(&mut self, attribute: Arc<Attribute>, value: AttributeValue) -> Result<()> {
        self.attributes.assign(attribute, value)
    }

    pub fn remove_attribute_assignment(&mut self, attribute_id: EntityId) -> Result<AttributeAssignment> {
        self.attributes.remove(attribute_id)
    }

    pub fn attribute_assignments(&self) -> &AttributeAssignments {
        &self.attributes
    }

    pub(crate) fn set_start_pos(&mut self, start_pos: usize) {
        self.start_pos = start_pos;
    }

    pub(crate) fn set_layout_count(&mut self, layout_count: usize) {
        if let SignalVariant::Muxor(m) = &mut self.variant {
            m.layout_count = layout_count;
            if self.encoded_value >= layout_count as u64 {
                self.encoded_value = 0;
            }
        }
    }

    fn truncate_encoded_value(&mut self) {
        self.encoded_value &= size_mask(self.size());
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) start_pos {} size {} {}",
            self.name(),
            self.kind(),
            self.start_pos,
            self.size(),
            self.endianness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u8_type() -> Arc<SignalType> {
        Arc::new(SignalType::integer("uint8_t", 8, false).unwrap())
    }

    #[test]
    fn test_muxor_size() {
        assert_eq!(muxor_size(1), 1);
        assert_eq!(muxor_size(2), 1);
        assert_eq!(muxor_size(3), 2);
        assert_eq!(muxor_size(4), 2);
        assert_eq!(muxor_size(5), 3);
        assert_eq!(muxor_size(256), 8);
        assert_eq!(muxor_size(257), 9);
    }

    #[test]
    fn test_big_endian_start_pos() {
        assert_eq!(start_pos_from_big_endian(7), 0);
        assert_eq!(start_pos_from_big_endian(11), 12);
        assert_eq!(start_pos_from_big_endian(31), 24);
        assert_eq!(start_pos_from_big_endian(35), 36);
        assert_eq!(start_pos_to_big_endian(12), 11);
    }

    #[test]
    fn test_conversions() {
        let sig = Signal::new_standard("speed", u8_type());
        assert_eq!(sig.kind(), SignalKind::Standard);
        assert!(sig.as_standard().is_ok());

        let err = sig.as_muxor().unwrap_err();
        assert_eq!(
            err,
            LayoutError::Conversion {
                from: "standard".to_string(),
                to: "muxor".to_string()
            }
        );
        assert!(sig.as_enum().is_err());
    }

    #[test]
    fn test_encoded_value_bounds() {
        let mut sig = Signal::new_standard("speed", u8_type());
        sig.update_encoded_value(255).unwrap();
        assert!(sig.update_encoded_value(256).is_err());
        assert_eq!(sig.encoded_value(), 255);

        let mut mux = Signal::new_muxor("mux", 3);
        assert_eq!(mux.size(), 2);
        mux.update_encoded_value(2).unwrap();
        // Fits in 2 bits but selects no layout
        assert!(mux.update_encoded_value(3).is_err());
    }

    #[test]
    fn test_update_type_truncates_value() {
        let mut sig = Signal::new_standard("speed", u8_type());
        sig.update_encoded_value(0xFF).unwrap();
        sig.update_type(Arc::new(SignalType::integer("uint4_t", 4, false).unwrap()))
            .unwrap();
        assert_eq!(sig.size(), 4);
        assert_eq!(sig.encoded_value(), 0x0F);
        assert!(sig.update_enum(Arc::new(SignalEnum::new("e"))).is_err());
    }

    #[test]
    fn test_unit_only_on_standard() {
        let unit = Arc::new(SignalUnit::new("volt", SignalUnitKind::Voltage, "V"));
        let sig = Signal::new_standard("v", u8_type()).with_unit(unit.clone()).unwrap();
        assert_eq!(sig.as_standard().unwrap().unit().map(|u| u.symbol()), Some("V"));

        let e = Signal::new_enum("e", Arc::new(SignalEnum::new("e")));
        assert!(e.with_unit(unit).is_err());
    }

    #[test]
    fn test_interval() {
        let mut sig = Signal::new_standard("speed", u8_type());
        sig.set_start_pos(8);
        assert_eq!(sig.low(), 8);
        assert_eq!(sig.high(), 15);
        assert_eq!(sig.interval(), Interval::new(8, 15));
        assert!(!sig.is_attached());
    }
}
