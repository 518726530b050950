//! Enumerations shared by enum signals

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Cause, LayoutError, Result};
use crate::registry::Registered;
use crate::signal::signal_type::MAX_SIGNAL_SIZE;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One named value of a [`SignalEnum`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnumValue {
    pub index: u64,
    pub name: String,
    pub desc: String,
}

/// Bits needed to hold `index`, at least 1
fn bits_for_index(index: u64) -> usize {
    (64 - index.leading_zeros() as usize).max(1)
}

/// Mapping from names to non-negative indexes
#[derive(Debug, Clone)]
pub struct SignalEnum {
    entity: Entity,
    values: BTreeMap<u64, SignalEnumValue>,
    names: HashMap<String, u64>,
    max_index: u64,
    /// Pinned size; when `None` the size follows `max_index`
    fixed_size: Option<usize>,
}

impl SignalEnum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::SignalEnum),
            values: BTreeMap::new(),
            names: HashMap::new(),
            max_index: 0,
            fixed_size: None,
        }
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

    /// Size in bits needed to encode every value
    pub fn size(&self) -> usize {
        self.fixed_size.unwrap_or_else(|| bits_for_index(self.max_index))
    }

    pub fn max_index(&self) -> u64 {
        self.max_index
    }

    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size.is_some()
    }

    pub fn add_value(&mut self, index: u64, name: impl Into<String>) -> Result<&SignalEnumValue> {
        self.add_value_with_desc(index, name, "")
    }

    pub fn add_value_with_desc(
        &mut self,
        index: u64,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Result<&SignalEnumValue> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(LayoutError::name(&name, Cause::IsDuplicated));
        }
        if self.values.contains_key(&index) {
            return Err(LayoutError::Index {
                index,
                cause: Cause::IsDuplicated,
            });
        }
        if let Some(size) = self.fixed_size {
            if bits_for_index(index) > size {
                return Err(LayoutError::Index {
                    index,
                    cause: Cause::OutOfBounds,
                });
            }
        }

        self.max_index = self.max_index.max(index);
        self.names.insert(name.clone(), index);
        let value = self.values.entry(index).or_insert(SignalEnumValue {
            index,
            name,
            desc: desc.into(),
        });
        Ok(value)
    }

    pub fn remove_value(&mut self, index: u64) -> Result<SignalEnumValue> {
        let value = self.values.remove(&index).ok_or(LayoutError::Index {
            index,
            cause: Cause::NotFound,
        })?;
        self.names.remove(&value.name);
        self.max_index = self.values.keys().next_back().copied().unwrap_or(0);
        Ok(value)
    }

    /// Pin the size to its current value, or release it
    pub fn set_fixed_size(&mut self, fixed: bool) {
        self.fixed_size = if fixed { Some(self.size()) } else { None };
    }

    /// Change the pinned size of a fixed-size enum
    ///
    /// On an enum that is not fixed the size stays derived from `max_index`
    /// and this only validates `size`.
    pub fn update_size(&mut self, size: usize) -> Result<()> {
        if size > MAX_SIGNAL_SIZE {
            return Err(LayoutError::Size {
                size,
                cause: Cause::TooBig,
            });
        }
        if size < bits_for_index(self.max_index) {
            return Err(LayoutError::Size {
                size,
                cause: Cause::TooSmall,
            });
        }
        if self.fixed_size.is_some() {
            self.fixed_size = Some(size);
        }
        Ok(())
    }

    pub fn value_by_index(&self, index: u64) -> Option<&SignalEnumValue> {
        self.values.get(&index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&SignalEnumValue> {
        self.names.get(name).and_then(|i| self.values.get(i))
    }

    /// Values ordered by index
    pub fn values(&self) -> impl Iterator<Item = &SignalEnumValue> {
        self.values.values()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Registered for SignalEnum {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl fmt::Display for SignalEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} values, {} bits)", self.name(), self.len(), self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_follows_max_index() {
        let mut e = SignalEnum::new("gear");
        assert_eq!(e.size(), 1);

        for i in 0..4 {
            e.add_value(i, format!("enum_value_{}", i)).unwrap();
        }
        assert_eq!(e.size(), 2);

        e.add_value(4, "enum_value_4").unwrap();
        assert_eq!(e.size(), 3);

        e.remove_value(4).unwrap();
        assert_eq!(e.size(), 2);
        assert_eq!(e.max_index(), 3);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut e = SignalEnum::new("gear");
        e.add_value(0, "park").unwrap();

        let err = e.add_value(1, "park").unwrap_err();
        assert!(matches!(err, LayoutError::Name { cause: Cause::IsDuplicated, .. }));

        let err = e.add_value(0, "drive").unwrap_err();
        assert!(matches!(err, LayoutError::Index { index: 0, cause: Cause::IsDuplicated }));
    }

    #[test]
    fn test_fixed_size() {
        let mut e = SignalEnum::new("fixed");
        e.add_value(0, "enum_value_0").unwrap();
        e.set_fixed_size(true);
        e.update_size(8).unwrap();
        assert_eq!(e.size(), 8);

        e.add_value(127, "enum_value_127").unwrap();
        assert_eq!(e.size(), 8);

        // Does not fit in 8 bits
        let err = e.add_value(256, "too_big").unwrap_err();
        assert_eq!(err.cause(), Some(Cause::OutOfBounds));

        // Cannot shrink below max index
        let err = e.update_size(6).unwrap_err();
        assert_eq!(err.cause(), Some(Cause::TooSmall));
    }

    #[test]
    fn test_lookup() {
        let mut e = SignalEnum::new("gear");
        e.add_value_with_desc(2, "drive", "forward").unwrap();
        assert_eq!(e.value_by_index(2).map(|v| v.name.as_str()), Some("drive"));
        assert_eq!(e.value_by_name("drive").map(|v| v.desc.as_str()), Some("forward"));
        assert!(e.value_by_index(3).is_none());
    }
}
