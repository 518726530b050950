//! Opaque typed annotations carried by signals, layers and messages
//!
//! The layout engine never interprets attributes. It only validates that an
//! assigned value fits its attribute definition and keeps the assignments in
//! insertion order.

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Cause, LayoutError, Result};
use crate::registry::Registered;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Definition-specific part of an [`Attribute`]
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    String {
        default: String,
    },
    Integer {
        default: i64,
        min: i64,
        max: i64,
        hex_format: bool,
    },
    Float {
        default: f64,
        min: f64,
        max: f64,
    },
    /// Ordered values; the first one is the default
    Enum {
        values: Vec<String>,
    },
}

/// Value assigned to an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Float(f64),
    Enum(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(v) | AttributeValue::Enum(v) => write!(f, "{:?}", v),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Named attribute definition
#[derive(Debug, Clone)]
pub struct Attribute {
    entity: Entity,
    kind: AttributeKind,
}

impl Attribute {
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::Attribute),
            kind: AttributeKind::String {
                default: default.into(),
            },
        }
    }

    pub fn integer(name: impl Into<String>, default: i64, min: i64, max: i64) -> Result<Self> {
        Self::build_integer(name.into(), default, min, max, false)
    }

    /// Integer attribute rendered in hexadecimal; bounds must be non-negative
    pub fn hex_integer(name: impl Into<String>, default: i64, min: i64, max: i64) -> Result<Self> {
        if min < 0 {
            return Err(LayoutError::arg("min", Cause::IsNegative));
        }
        if max < 0 {
            return Err(LayoutError::arg("max", Cause::IsNegative));
        }
        Self::build_integer(name.into(), default, min, max, true)
    }

    fn build_integer(name: String, default: i64, min: i64, max: i64, hex_format: bool) -> Result<Self> {
        if min > max {
            return Err(LayoutError::arg("min", Cause::OutOfBounds));
        }
        if default < min || default > max {
            return Err(LayoutError::AttributeValue {
                name,
                reason: format!("default {} outside [{}, {}]", default, min, max),
            });
        }
        Ok(Self {
            entity: Entity::new(name, EntityKind::Attribute),
            kind: AttributeKind::Integer {
                default,
                min,
                max,
                hex_format,
            },
        })
    }

    pub fn float(name: impl Into<String>, default: f64, min: f64, max: f64) -> Result<Self> {
        let name = name.into();
        if min > max {
            return Err(LayoutError::arg("min", Cause::OutOfBounds));
        }
        if default < min || default > max {
            return Err(LayoutError::AttributeValue {
                name,
                reason: format!("default {} outside [{}, {}]", default, min, max),
            });
        }
        Ok(Self {
            entity: Entity::new(name, EntityKind::Attribute),
            kind: AttributeKind::Float { default, min, max },
        })
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(LayoutError::arg("values", Cause::IsZero));
        }
        let mut seen = HashSet::new();
        for v in &values {
            if !seen.insert(v.as_str()) {
                return Err(LayoutError::name(v, Cause::IsDuplicated));
            }
        }
        Ok(Self {
            entity: Entity::new(name, EntityKind::Attribute),
            kind: AttributeKind::Enum { values },
        })
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity.id()
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn default_value(&self) -> AttributeValue {
        match &self.kind {
            AttributeKind::String { default } => AttributeValue::String(default.clone()),
            AttributeKind::Integer { default, .. } => AttributeValue::Integer(*default),
            AttributeKind::Float { default, .. } => AttributeValue::Float(*default),
            AttributeKind::Enum { values } => {
                AttributeValue::Enum(values.first().cloned().unwrap_or_default())
            }
        }
    }

    /// Check that `value` fits this attribute
    pub fn validate(&self, value: &AttributeValue) -> Result<()> {
        let reason = match (&self.kind, value) {
            (AttributeKind::String { .. }, AttributeValue::String(_)) => None,
            (AttributeKind::Integer { min, max, .. }, AttributeValue::Integer(v)) => {
                (v < min || v > max).then(|| format!("{} outside [{}, {}]", v, min, max))
            }
            (AttributeKind::Float { min, max, .. }, AttributeValue::Float(v)) => {
                (v < min || v > max).then(|| format!("{} outside [{}, {}]", v, min, max))
            }
            (AttributeKind::Enum { values }, AttributeValue::Enum(v)) => {
                (!values.contains(v)).then(|| format!("{:?} is not a value of the enum", v))
            }
            (_, other) => Some(format!("{} does not match the attribute kind", other)),
        };

        match reason {
            Some(reason) => Err(LayoutError::AttributeValue {
                name: self.name().to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl Registered for Attribute {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

/// An attribute bound to a value on some entity
#[derive(Debug, Clone)]
pub struct AttributeAssignment {
    attribute: Arc<Attribute>,
    value: AttributeValue,
}

impl AttributeAssignment {
    pub fn attribute(&self) -> &Arc<Attribute> {
        &self.attribute
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}

/// Insertion-ordered attribute assignments of one entity
#[derive(Debug, Clone, Default)]
pub struct AttributeAssignments {
    items: Vec<AttributeAssignment>,
}

impl AttributeAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value`, replacing any previous assignment of the same attribute
    pub fn assign(&mut self, attribute: Arc<Attribute>, value: AttributeValue) -> Result<()> {
        attribute.validate(&value)?;
        let id = attribute.entity_id();
        match self.items.iter_mut().find(|a| a.attribute.entity_id() == id) {
            Some(existing) => existing.value = value,
            None => self.items.push(AttributeAssignment { attribute, value }),
        }
        Ok(())
    }

    pub fn remove(&mut self, attribute_id: EntityId) -> Result<AttributeAssignment> {
        let pos = self
            .items
            .iter()
            .position(|a| a.attribute.entity_id() == attribute_id)
            .ok_or(LayoutError::not_found(attribute_id))?;
        Ok(self.items.remove(pos))
    }

    pub fn get(&self, attribute_id: EntityId) -> Option<&AttributeAssignment> {
        self.items.iter().find(|a| a.attribute.entity_id() == attribute_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeAssignment> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
