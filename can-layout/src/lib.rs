//! CAN Signal Layout Library
//!
//! A library for modeling CAN communication databases: networks of buses
//! carrying messages whose payloads pack bit-level signals, with nested
//! signal multiplexing.
//!
//! # Architecture
//!
//! The core is the signal layout engine:
//! - an interval tree per layout rejects overlapping signals
//! - multiplexed layers attach alternative sub-layouts selected by a muxor
//! - every placement is checked against the whole multiplex tree
//! - layouts compile to per-byte filters that drive encode and decode
//!
//! Around it sit the shared definitions (signal types, units, enums,
//! attributes) kept in reference-counted registries, and the
//! [`Network`] / [`Bus`] / [`Message`] containers.
//!
//! The library does NOT:
//! - Read or write DBC files
//! - Generate code or documentation
//! - Schedule or transmit frames
//!
//! # Example Usage
//!
//! ```
//! use can_layout::{Message, Signal, SignalType};
//! use std::sync::Arc;
//!
//! let speed = Arc::new(SignalType::integer("u16", 16, false).unwrap());
//!
//! let mut msg = Message::new("vehicle_speed", 0x120, 8).unwrap();
//! let id = msg.insert_signal(Signal::new_standard("speed", speed), 0).unwrap();
//! msg.signal_mut(id).unwrap().update_encoded_value(3073).unwrap();
//!
//! let payload = msg.encode();
//! assert_eq!(&payload[..2], &[0x01, 0x0C]);
//!
//! for decoded in msg.decode(&payload) {
//!     println!("{}", decoded);
//! }
//! ```

// Public modules
pub mod attribute;
pub mod config;
pub mod entity;
pub mod error;
pub mod ibst;
pub mod layout;
pub mod message;
pub mod network;
pub mod registry;
pub mod signal;

// Re-export main types for convenience
pub use attribute::{Attribute, AttributeAssignment, AttributeAssignments, AttributeKind, AttributeValue};
pub use config::LayoutConfig;
pub use entity::{Entity, EntityId, EntityKind};
pub use error::{Cause, LayoutError, Result};
pub use layout::{
    LayoutKey, MultiplexedLayerMut, MultiplexedLayerRef, SignalDecoding, SignalLayoutFilter,
    SignalLayoutMut, SignalLayoutRef, SignalMut, SignalValue, SignalValueType,
};
pub use message::Message;
pub use network::{Bus, Network};
pub use registry::{Registered, Registry};
pub use signal::{
    start_pos_from_big_endian, start_pos_to_big_endian, Endianness, Signal, SignalEnum,
    SignalEnumValue, SignalKind, SignalSendType, SignalType, SignalTypeKind, SignalUnit,
    SignalUnitKind, SignalVariant,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
