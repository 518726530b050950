//! Networks and buses
//!
//! A [`Network`] owns the registries of shared definitions (types, units,
//! enums and attributes) referenced by its signals, plus a list of [`Bus`]es.
//! Each bus owns its messages and keeps their names and CAN ids unique.

use crate::attribute::Attribute;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Cause, LayoutError, Result};
use crate::message::Message;
use crate::registry::Registry;
use crate::signal::{SignalEnum, SignalType, SignalUnit};
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct Bus {
    entity: Entity,
    messages: Vec<Message>,
}

impl Bus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::Bus),
            messages: Vec::new(),
        }
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

    fn verify_can_id(&self, can_id: u32) -> Result<()> {
        if self.messages.iter().any(|m| m.can_id() == can_id) {
            return Err(LayoutError::arg("can_id", Cause::IsDuplicated));
        }
        Ok(())
    }

    /// Take ownership of `message`; names and CAN ids are unique per bus
    pub fn add_message(&mut self, message: Message) -> Result<EntityId> {
        if self.message_by_name(message.name()).is_some() {
            return Err(LayoutError::name(message.name(), Cause::IsDuplicated));
        }
        self.verify_can_id(message.can_id())?;

        let id = message.entity_id();
        log::debug!("Added message {} to bus {}", message, self.name());
        self.messages.push(message);
        Ok(id)
    }

    pub fn remove_message(&mut self, message_id: EntityId) -> Result<Message> {
        let index = self
            .messages
            .iter()
            .position(|m| m.entity_id() == message_id)
            .ok_or(LayoutError::not_found(message_id))?;
        Ok(self.messages.remove(index))
    }

    /// Move a message to another CAN id
    pub fn update_can_id(&mut self, message_id: EntityId, can_id: u32) -> Result<()> {
        let current = self
            .message(message_id)
            .ok_or(LayoutError::not_found(message_id))?
            .can_id();
        if current == can_id {
            return Ok(());
        }
        self.verify_can_id(can_id)?;

        if let Some(message) = self.message_mut(message_id) {
            message.set_can_id(can_id);
        }
        Ok(())
    }

    pub fn message(&self, message_id: EntityId) -> Option<&Message> {
        self.messages.iter().find(|m| m.entity_id() == message_id)
    }

    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name() == name)
    }

    pub fn message_by_can_id(&self, can_id: u32) -> Option<&Message> {
        self.messages.iter().find(|m| m.can_id() == can_id)
    }

    pub fn message_mut(&mut self, message_id: EntityId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.entity_id() == message_id)
    }

    /// Messages in insertion order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Root of a CAN database
#[derive(Debug)]
pub struct Network {
    entity: Entity,
    /// Signal types shared by standard signals
    pub types: Registry<SignalType>,
    pub units: Registry<SignalUnit>,
    pub enums: Registry<SignalEnum>,
    pub attributes: Registry<Attribute>,
    buses: Vec<Bus>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entity: Entity::new(name, EntityKind::Network),
            types: Registry::new(),
            units: Registry::new(),
            enums: Registry::new(),
            attributes: Registry::new(),
            buses: Vec::new(),
        }
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

    pub fn add_bus(&mut self, bus: Bus) -> Result<EntityId> {
        if self.bus_by_name(bus.name()).is_some() {
            return Err(LayoutError::name(bus.name(), Cause::IsDuplicated));
        }
        let id = bus.entity_id();
        log::debug!("Added bus {} to network {}", bus.name(), self.name());
        self.buses.push(bus);
        Ok(id)
    }

    pub fn remove_bus(&mut self, bus_id: EntityId) -> Result<Bus> {
        let index = self
            .buses
            .iter()
            .position(|b| b.entity_id() == bus_id)
            .ok_or(LayoutError::not_found(bus_id))?;
        Ok(self.buses.remove(index))
    }

    pub fn bus(&self, bus_id: EntityId) -> Option<&Bus> {
        self.buses.iter().find(|b| b.entity_id() == bus_id)
    }

    pub fn bus_by_name(&self, name: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.name() == name)
    }

    pub fn bus_mut(&mut self, bus_id: EntityId) -> Option<&mut Bus> {
        self.buses.iter_mut().find(|b| b.entity_id() == bus_id)
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::sync::Arc;

    #[test]
    fn test_bus_uniqueness() {
        let mut bus = Bus::new("powertrain");
        let engine = bus.add_message(Message::new("engine", 0x100, 8).unwrap()).unwrap();

        // Should reject the same name and the same CAN id
        let err = bus.add_message(Message::new("engine", 0x200, 8).unwrap()).unwrap_err();
        assert_eq!(err.cause(), Some(Cause::IsDuplicated));
        let err = bus.add_message(Message::new("brake", 0x100, 8).unwrap()).unwrap_err();
        assert!(matches!(err, LayoutError::Arg { .. }));

        let brake = bus.add_message(Message::new("brake", 0x200, 8).unwrap()).unwrap();
        assert!(bus.update_can_id(brake, 0x100).is_err());
        bus.update_can_id(brake, 0x300).unwrap();
        assert_eq!(bus.message_by_can_id(0x300).map(|m| m.entity_id()), Some(brake));

        let removed = bus.remove_message(engine).unwrap();
        assert_eq!(removed.name(), "engine");
        assert!(bus.message(engine).is_none());
        assert_eq!(bus.messages().len(), 1);
    }

    #[test]
    fn test_registry_references_through_signals() {
        let mut network = Network::new("vehicle");
        let u8_t = network.types.add(SignalType::integer("u8", 8, false).unwrap()).unwrap();
        let type_id = u8_t.entity_id();

        let mut bus = Bus::new("body");
        let mut msg = Message::new("doors", 0x120, 8).unwrap();
        let sig = msg.insert_signal(Signal::new_standard("front_left", u8_t), 0).unwrap();
        let msg_id = bus.add_message(msg).unwrap();
        let bus_id = network.add_bus(bus).unwrap();

        assert_eq!(network.types.references(type_id).unwrap(), 1);
        assert!(network.types.remove(type_id).is_err());

        // Dropping the signal releases its handle
        let bus = network.bus_mut(bus_id).unwrap();
        let detached = bus.message_mut(msg_id).unwrap().delete_signal(sig).unwrap();
        drop(detached);
        assert_eq!(network.types.references(type_id).unwrap(), 0);
        assert!(network.types.remove(type_id).is_ok());
    }

    #[test]
    fn test_duplicate_bus() {
        let mut network = Network::new("vehicle");
        network.add_bus(Bus::new("can0")).unwrap();
        assert!(network.add_bus(Bus::new("can0")).is_err());
        assert!(network.bus_by_name("can0").is_some());
    }

    #[test]
    fn test_network_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Network>();
        let _ = Arc::new(Network::new("shared"));
    }
}
