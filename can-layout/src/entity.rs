//! Entity identity shared by every addressable object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable, opaque identifier of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    pub(crate) fn generate() -> Self {
        EntityId(Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind tag of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Network,
    Bus,
    Message,
    Signal,
    SignalType,
    SignalUnit,
    SignalEnum,
    Attribute,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Network => "network",
            EntityKind::Bus => "bus",
            EntityKind::Message => "message",
            EntityKind::Signal => "signal",
            EntityKind::SignalType => "signal_type",
            EntityKind::SignalUnit => "signal_unit",
            EntityKind::SignalEnum => "signal_enum",
            EntityKind::Attribute => "attribute",
        };
        f.write_str(name)
    }
}

/// Common header embedded in every entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    name: String,
    desc: String,
    kind: EntityKind,
    create_time: DateTime<Utc>,
}

impl Entity {
    pub(crate) fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            desc: String::new(),
            kind,
            create_time: Utc::now(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_desc(&mut self, desc: impl Into<String>) {
        self.desc = desc.into();
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} ({})", self.kind, self.name, self.id)
    }
}
