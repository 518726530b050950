//! Mutable handle on a signal owned by a message

use super::LayoutTree;
use crate::attribute::{Attribute, AttributeAssignment, AttributeValue};
use crate::entity::EntityId;
use crate::error::Result;
use crate::signal::{Endianness, Signal, SignalEnum, SignalSendType, SignalType, SignalUnit};
use std::sync::Arc;

/// Mutable handle on an inserted signal
///
/// Changes that affect placement (name, position, size) are verified against
/// the whole multiplex tree before anything is modified.
#[derive(Debug)]
pub struct SignalMut<'a> {
    tree: &'a mut LayoutTree,
    id: EntityId,
}

impl<'a> SignalMut<'a> {
    pub(crate) fn new(tree: &'a mut LayoutTree, id: EntityId) -> Self {
        Self { tree, id }
    }

    pub fn get(&self) -> &Signal {
        self.tree.signal(self.id)
    }

    fn signal_mut(&mut self) -> &mut Signal {
        self.tree.signal_mut(self.id)
    }

    /// Rename, keeping names unique across the message's scopes
    pub fn update_name(&mut self, name: &str) -> Result<()> {
        let old = self.get().name().to_string();
        if old == name {
            return Ok(());
        }

        let scope = self.tree.name_scope(self.id);
        self.tree.verify_signal_name(scope, name)?;

        let names = self.tree.names_mut(scope);
        names.remove(&old);
        names.insert(name.to_string(), self.id);
        self.signal_mut().update_name(name);
        log::debug!("Renamed signal {:?} to {:?}", old, name);
        Ok(())
    }

    pub fn update_start_pos(&mut self, start_pos: usize) -> Result<()> {
        self.tree.update_start_pos(self.id, start_pos)
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        let old_low = self.get().start_pos();
        self.signal_mut().set_endianness(endianness);
        self.tree.refresh_signal_interval(self.id, old_low);
    }

    pub fn update_encoded_value(&mut self, value: u64) -> Result<()> {
        self.signal_mut().update_encoded_value(value)
    }

    /// Re-type a standard signal, resizing it in place
    pub fn update_type(&mut self, signal_type: Arc<SignalType>) -> Result<()> {
        self.get().as_standard()?;
        self.tree.verify_signal_resize(self.id, signal_type.size())?;

        let old_low = self.get().start_pos();
        self.signal_mut().update_type(signal_type)?;
        self.tree.refresh_signal_interval(self.id, old_low);
        Ok(())
    }

    /// Point an enum signal at another enum, resizing it in place
    pub fn update_enum(&mut self, signal_enum: Arc<SignalEnum>) -> Result<()> {
        self.get().as_enum()?;
        self.tree.verify_signal_resize(self.id, signal_enum.size())?;

        let old_low = self.get().start_pos();
        self.signal_mut().update_enum(signal_enum)?;
        self.tree.refresh_signal_interval(self.id, old_low);
        Ok(())
    }

    /// Change the layout count of a muxor's layer
    pub fn update_layout_count(&mut self, layout_count: usize) -> Result<()> {
        self.get().as_muxor()?;
        self.tree.update_layout_count(self.id, layout_count)
    }

    pub fn set_unit(&mut self, unit: Option<Arc<SignalUnit>>) -> Result<()> {
        self.signal_mut().set_unit(unit)
    }

    pub fn set_desc(&mut self, desc: &str) {
        self.signal_mut().set_desc(desc);
    }

    pub fn set_start_value(&mut self, start_value: f64) {
        self.signal_mut().set_start_value(start_value);
    }

    pub fn set_send_type(&mut self, send_type: SignalSendType) {
        self.signal_mut().set_send_type(send_type);
    }

    pub fn assign_attribute(&mut self, attribute: Arc<Attribute>, value: AttributeValue) -> Result<()> {
        self.signal_mut().assign_attribute(attribute, value)
    }

    pub fn remove_attribute_assignment(&mut self, attribute_id: EntityId) -> Result<AttributeAssignment> {
        self.signal_mut().remove_attribute_assignment(attribute_id)
    }
}
