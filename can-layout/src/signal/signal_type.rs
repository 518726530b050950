//! Signal types: how a raw bit pattern maps to a physical value

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Cause, LayoutError, Result};
use crate::registry::Registered;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported signal size in bits
pub const MAX_SIGNAL_SIZE: usize = 64;

/// Kind of a [`SignalType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalTypeKind {
    Flag,
    Integer,
    Decimal,
    Custom,
}

impl fmt::Display for SignalTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalTypeKind::Flag => write!(f, "flag"),
            SignalTypeKind::Integer => write!(f, "integer"),
            SignalTypeKind::Decimal => write!(f, "decimal"),
            SignalTypeKind::Custom => write!(f, "custom"),
        }
    }
}

/// Shared description of a standard signal's encoding
///
/// Types are built once and then shared through `Arc` handles, usually
/// handed out by a [`Registry`](crate::Registry).
#[derive(Debug, Clone)]
pub struct SignalType {
    entity: Entity,
    kind: SignalTypeKind,
    /// Size in bits (1..=64)
    size: usize,
    /// Whether raw values are two's complement
    signed: bool,
    min: f64,
    max: f64,
    scale: f64,
    offset: f64,
}

/// Physical range of an integer of `size` bits
fn integer_range(size: usize, signed: bool) -> (f64, f64) {
    if signed {
        let half = 2f64.powi(size as i32 - 1);
        (-half, half - 1.0)
    } else {
        (0.0, 2f64.powi(size as i32) - 1.0)
    }
}

fn verify_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(LayoutError::Size {
            size,
            cause: Cause::IsZero,
        });
    }
    if size > MAX_SIGNAL_SIZE {
        return Err(LayoutError::Size {
            size,
            cause: Cause::TooBig,
        });
    }
    Ok(())
}

impl SignalType {
    fn build(
        name: impl Into<String>,
        kind: SignalTypeKind,
        size: usize,
        signed: bool,
        min: f64,
        max: f64,
    ) -> Result<Self> {
        verify_size(size)?;
        Ok(Self {
            entity: Entity::new(name, EntityKind::SignalType),
            kind,
            size,
            signed,
            min,
            max,
            scale: 1.0,
            offset: 0.0,
        })
    }

    /// Single-bit boolean type
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::SignalType),
            kind: SignalTypeKind::Flag,
            size: 1,
            signed: false,
            min: 0.0,
            max: 1.0,
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// Integer type whose range is derived from size and signedness
    pub fn integer(name: impl Into<String>, size: usize, signed: bool) -> Result<Self> {
        let (min, max) = integer_range(size, signed);
        Self::build(name, SignalTypeKind::Integer, size, signed, min, max)
    }

    /// Scaled type decoded as a float
    pub fn decimal(name: impl Into<String>, size: usize, signed: bool) -> Result<Self> {
        let (min, max) = integer_range(size, signed);
        Self::build(name, SignalTypeKind::Decimal, size, signed, min, max)
    }

    pub fn custom(
        name: impl Into<String>,
        size: usize,
        signed: bool,
        min: f64,
        max: f64,
    ) -> Result<Self> {
        Self::build(name, SignalTypeKind::Custom, size, signed, min, max)
    }

    /// Builder method: set the scale applied on decode
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Builder method: set the offset applied on decode
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Builder method: override the physical range
    pub fn with_min_max(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.entity.set_desc(desc);
        self
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

    pub fn kind(&self) -> SignalTypeKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Truncate a two's complement value to this type's size
    pub fn raw_from_signed(&self, value: i64) -> u64 {
        (value as u64) & size_mask(self.size)
    }
}

impl Registered for SignalType {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}{}; scale {}, offset {})",
            self.name(),
            self.kind,
            if self.signed { "i" } else { "u" },
            self.size,
            self.scale,
            self.offset
        )
    }
}

/// Mask selecting the low `size` bits
pub(crate) fn size_mask(size: usize) -> u64 {
    if size >= 64 {
        u64::MAX
    } else {
        (1u64 << size) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ranges() {
        let u8_t = SignalType::integer("uint8_t", 8, false).unwrap();
        assert_eq!(u8_t.min(), 0.0);
        assert_eq!(u8_t.max(), 255.0);

        let i16_t = SignalType::integer("int16_t", 16, true).unwrap();
        assert_eq!(i16_t.min(), -32768.0);
        assert_eq!(i16_t.max(), 32767.0);
    }

    #[test]
    fn test_flag_type() {
        let flag = SignalType::flag("flag_t");
        assert_eq!(flag.size(), 1);
        assert_eq!(flag.kind(), SignalTypeKind::Flag);
        assert!(!flag.signed());
    }

    #[test]
    fn test_invalid_sizes() {
        let err = SignalType::integer("zero", 0, false).unwrap_err();
        assert_eq!(err.cause(), Some(Cause::IsZero));

        let err = SignalType::decimal("huge", 65, true).unwrap_err();
        assert_eq!(err.cause(), Some(Cause::TooBig));
    }

    #[test]
    fn test_raw_from_signed() {
        let i8_t = SignalType::integer("int8_t", 8, true).unwrap();
        assert_eq!(i8_t.raw_from_signed(-63), 0xC1);

        let i64_t = SignalType::integer("int64_t", 64, true).unwrap();
        assert_eq!(i64_t.raw_from_signed(-1), u64::MAX);
    }

    #[test]
    fn test_builder() {
        let t = SignalType::decimal("volts", 16, false)
            .unwrap()
            .with_scale(0.5)
            .with_offset(100.5)
            .with_min_max(0.0, 1000.0);
        assert_eq!(t.scale(), 0.5);
        assert_eq!(t.offset(), 100.5);
        assert_eq!(t.max(), 1000.0);
    }
}
