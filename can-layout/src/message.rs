//! CAN messages
//!
//! A [`Message`] is the container of one layout tree: it owns the root
//! layout, every multiplexed layer below it and every signal placed in them.
//! The message's own name scope holds the names of its top-level signals.

use crate::attribute::{Attribute, AttributeAssignment, AttributeAssignments, AttributeValue};
use crate::config::LayoutConfig;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{LayoutError, Result};
use crate::layout::{
    LayoutTree, MultiplexedLayerMut, MultiplexedLayerRef, NameScope, SignalDecoding, SignalLayoutMut,
    SignalLayoutRef, SignalMut,
};
use crate::signal::Signal;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub struct Message {
    entity: Entity,
    can_id: u32,
    tree: LayoutTree,
    attributes: AttributeAssignments,
}

impl Message {
    /// Create a message with the default [`LayoutConfig`]
    pub fn new(name: impl Into<String>, can_id: u32, size_byte: usize) -> Result<Self> {
        Self::with_config(name, can_id, size_byte, LayoutConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        can_id: u32,
        size_byte: usize,
        config: LayoutConfig,
    ) -> Result<Self> {
        let tree = LayoutTree::new(size_byte, config)?;
        let message = Self {
            entity: Entity::new(name, EntityKind::Message),
            can_id,
            tree,
            attributes: AttributeAssignments::new(),
        };
        log::debug!("Created message {} (0x{:X}, {} bytes)", message.name(), can_id, size_byte);
        Ok(message)
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

    pub fn set_desc(&mut self, desc: impl Into<String>) {
        self.entity.set_desc(desc);
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.entity.create_time()
    }

    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    pub(crate) fn set_can_id(&mut self, can_id: u32) {
        self.can_id = can_id;
    }

    pub fn size_byte(&self) -> usize {
        self.layout().size_byte()
    }

    pub fn config(&self) -> &LayoutConfig {
        self.tree.config()
    }

    /// Check that `name` is free for a new top-level signal
    pub fn verify_signal_name(&self, name: &str) -> Result<()> {
        self.tree.verify_signal_name(NameScope::Message, name)
    }

    /// Names of the top-level signals, sorted
    pub fn signal_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tree.root_names().collect();
        names.sort_unstable();
        names
    }

    /// Place `signal` in the root layout
    pub fn insert_signal(&mut self, signal: Signal, start_pos: usize) -> Result<EntityId> {
        self.tree.insert_root_signal(signal, start_pos)
    }

    /// Remove a signal from wherever it lives and hand it back detached
    pub fn delete_signal(&mut self, signal_id: EntityId) -> Result<Signal> {
        self.tree.delete_signal(signal_id)
    }

    /// Remove every signal and multiplexed layer
    pub fn clear_signals(&mut self) {
        self.tree.clear_root();
        log::debug!("Cleared message {}", self.name());
    }

    /// Pack top-level signals from bit 0; false if the message is multiplexed
    pub fn compact(&mut self) -> bool {
        let root = self.tree.root();
        self.tree.compact(root)
    }

    /// Change the payload size of the message and every layout in it
    pub fn resize(&mut self, size_byte: usize) -> Result<()> {
        self.tree.resize(size_byte)
    }

    pub fn layout(&self) -> SignalLayoutRef<'_> {
        SignalLayoutRef::new(&self.tree, self.tree.root())
    }

    pub fn layout_mut(&mut self) -> SignalLayoutMut<'_> {
        let root = self.tree.root();
        SignalLayoutMut::new(&mut self.tree, root)
    }

    /// Any multiplexed layer of the message, nested or not
    pub fn layer(&self, layer_id: EntityId) -> Result<MultiplexedLayerRef<'_>> {
        self.tree.try_layer(layer_id)?;
        Ok(MultiplexedLayerRef::new(&self.tree, layer_id))
    }

    pub fn layer_mut(&mut self, layer_id: EntityId) -> Result<MultiplexedLayerMut<'_>> {
        self.tree.try_layer(layer_id)?;
        Ok(MultiplexedLayerMut::new(&mut self.tree, layer_id))
    }

    pub fn signal(&self, signal_id: EntityId) -> Option<&Signal> {
        self.tree.get_signal(signal_id)
    }

    pub fn signal_by_name(&self, name: &str) -> Option<&Signal> {
        self.tree.signal_by_name(name)
    }

    pub fn signal_mut(&mut self, signal_id: EntityId) -> Result<SignalMut<'_>> {
        if self.tree.get_signal(signal_id).is_none() {
            return Err(LayoutError::not_found(signal_id));
        }
        Ok(SignalMut::new(&mut self.tree, signal_id))
    }

    /// Every signal of the message, muxors included
    pub fn signals(&self) -> Vec<&Signal> {
        self.tree.all_signals()
    }

    pub fn encode(&self) -> Vec<u8> {
        self.layout().encode()
    }

    pub fn decode(&self, data: &[u8]) -> Vec<SignalDecoding> {
        self.layout().decode(data)
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
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (0x{:X}, {} bytes, {} signals)",
            self.name(),
            self.can_id,
            self.size_byte(),
            self.tree.all_signals().len()
        )
    }
}
