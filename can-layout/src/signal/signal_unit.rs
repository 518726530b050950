//! Physical units attached to standard signals

use crate::entity::{Entity, EntityId, EntityKind};
use crate::registry::Registered;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a [`SignalUnit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalUnitKind {
    #[default]
    Custom,
    Temperature,
    Voltage,
    Current,
}

/// Shared physical unit, e.g. `V` or `degC`
#[derive(Debug, Clone)]
pub struct SignalUnit {
    entity: Entity,
    kind: SignalUnitKind,
    symbol: String,
}

impl SignalUnit {
    pub fn new(name: impl Into<String>, kind: SignalUnitKind, symbol: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::SignalUnit),
            kind,
            symbol: symbol.into(),
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

    pub fn kind(&self) -> SignalUnitKind {
        self.kind
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Registered for SignalUnit {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl fmt::Display for SignalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name(), self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit() {
        let unit = SignalUnit::new("volt", SignalUnitKind::Voltage, "V");
        assert_eq!(unit.symbol(), "V");
        assert_eq!(unit.kind(), SignalUnitKind::Voltage);
        assert_eq!(unit.to_string(), "volt [V]");
    }
}
