//! Build a network from a layout description

use crate::config::{AppConfig, EnumConfig, LayerConfig, MessageConfig, SignalConfig, TypeConfig};
use anyhow::{anyhow, bail, Context, Result};
use can_layout::{
    start_pos_from_big_endian, Bus, EntityId, Message, Network, Signal, SignalEnum, SignalType,
    SignalTypeKind, SignalUnit,
};

/// Register every definition and build every message of `config`
pub fn build_network(name: &str, config: &AppConfig) -> Result<Network> {
    let mut network = Network::new(name);

    for t in &config.types {
        let signal_type = build_type(t).with_context(|| format!("Invalid signal type {:?}", t.name))?;
        network.types.add(signal_type)?;
    }
    for u in &config.units {
        network
            .units
            .add(SignalUnit::new(&u.name, u.kind, &u.symbol))
            .with_context(|| format!("Invalid unit {:?}", u.name))?;
    }
    for e in &config.enums {
        let signal_enum = build_enum(e).with_context(|| format!("Invalid enum {:?}", e.name))?;
        network.enums.add(signal_enum)?;
    }

    for m in &config.messages {
        let message = build_message(&network, config, m)
            .with_context(|| format!("Failed to build message {:?}", m.name))?;

        let bus_id = match network.bus_by_name(&m.bus) {
            Some(bus) => bus.entity_id(),
            None => network.add_bus(Bus::new(&m.bus))?,
        };
        let bus = network
            .bus_mut(bus_id)
            .ok_or_else(|| anyhow!("Bus {:?} disappeared", m.bus))?;
        bus.add_message(message)
            .with_context(|| format!("Failed to add message {:?} to bus {:?}", m.name, m.bus))?;
    }

    log::info!(
        "Built network {} with {} buses",
        network.name(),
        network.buses().len()
    );
    Ok(network)
}

fn build_type(t: &TypeConfig) -> Result<SignalType> {
    let signal_type = match t.kind {
        SignalTypeKind::Flag => SignalType::flag(&t.name),
        SignalTypeKind::Integer => SignalType::integer(&t.name, t.size, t.signed)?,
        SignalTypeKind::Decimal => SignalType::decimal(&t.name, t.size, t.signed)?,
        SignalTypeKind::Custom => {
            let (min, max) = t
                .min
                .zip(t.max)
                .ok_or_else(|| anyhow!("custom types need min and max"))?;
            SignalType::custom(&t.name, t.size, t.signed, min, max)?
        }
    };

    let mut signal_type = signal_type
        .with_scale(t.scale)
        .with_offset(t.offset)
        .with_desc(&t.desc);
    if let (Some(min), Some(max)) = (t.min, t.max) {
        signal_type = signal_type.with_min_max(min, max);
    }
    Ok(signal_type)
}

fn build_enum(e: &EnumConfig) -> Result<SignalEnum> {
    let mut signal_enum = SignalEnum::new(&e.name);
    if let Some(size) = e.fixed_size {
        signal_enum.set_fixed_size(true);
        signal_enum.update_size(size)?;
    }
    for v in &e.values {
        signal_enum.add_value_with_desc(v.index, &v.name, &v.desc)?;
    }
    Ok(signal_enum)
}

fn start_pos(s: &SignalConfig) -> Result<usize> {
    match (s.start_pos, s.big_endian_start_bit) {
        (Some(pos), None) => Ok(pos),
        (None, Some(bit)) => Ok(start_pos_from_big_endian(bit)),
        (Some(_), Some(_)) => bail!("signal {:?} sets both start_pos and big_endian_start_bit", s.name),
        (None, None) => bail!("signal {:?} needs start_pos or big_endian_start_bit", s.name),
    }
}

/// Detached signal for `s`, resolved against the network's registries
fn build_signal(network: &Network, s: &SignalConfig) -> Result<Signal> {
    let signal = match (&s.signal_type, &s.signal_enum) {
        (Some(type_name), None) => {
            let signal_type = network
                .types
                .get_by_name(type_name)
                .ok_or_else(|| anyhow!("unknown signal type {:?}", type_name))?;
            let mut signal = Signal::new_standard(&s.name, signal_type);
            if let Some(unit_name) = &s.unit {
                let unit = network
                    .units
                    .get_by_name(unit_name)
                    .ok_or_else(|| anyhow!("unknown unit {:?}", unit_name))?;
                signal = signal.with_unit(unit)?;
            }
            signal
        }
        (None, Some(enum_name)) => {
            let signal_enum = network
                .enums
                .get_by_name(enum_name)
                .ok_or_else(|| anyhow!("unknown enum {:?}", enum_name))?;
            Signal::new_enum(&s.name, signal_enum)
        }
        _ => bail!("signal {:?} needs exactly one of type or enum", s.name),
    };

    let mut signal = signal.with_endianness(s.endianness);
    signal.set_desc(&s.desc);
    if let Some(value) = s.value {
        signal
            .update_encoded_value(value)
            .with_context(|| format!("Invalid value for signal {:?}", s.name))?;
    }
    Ok(signal)
}

fn build_message(network: &Network, config: &AppConfig, m: &MessageConfig) -> Result<Message> {
    let mut message = Message::with_config(&m.name, m.can_id, m.size_byte, config.engine.clone())?;
    message.set_desc(&m.desc);

    for s in &m.signals {
        let signal = build_signal(network, s)?;
        message
            .insert_signal(signal, start_pos(s)?)
            .with_context(|| format!("Failed to place signal {:?}", s.name))?;
    }
    for layer in &m.layers {
        add_layer(network, &mut message, None, layer)?;
    }
    Ok(message)
}

/// Add `layer` to the root layout, or to a sub-layout of `parent`
fn add_layer(
    network: &Network,
    message: &mut Message,
    parent: Option<EntityId>,
    layer: &LayerConfig,
) -> Result<()> {
    let id = match parent {
        None => message
            .layout_mut()
            .add_multiplexed_layer(&layer.muxor, layer.start_pos, layer.layout_count),
        Some(parent_id) => {
            let layout_id = layer
                .layout
                .ok_or_else(|| anyhow!("nested layer {:?} needs a layout index", layer.muxor))?;
            message
                .layer_mut(parent_id)?
                .layout_mut(layout_id)?
                .add_multiplexed_layer(&layer.muxor, layer.start_pos, layer.layout_count)
        }
    }
    .with_context(|| format!("Failed to add multiplexed layer {:?}", layer.muxor))?;

    if let Some(value) = layer.value {
        message.signal_mut(id)?.update_encoded_value(value)?;
    }

    for s in &layer.signals {
        let signal = build_signal(network, s)?;
        message
            .layer_mut(id)?
            .insert_signal(signal, start_pos(s)?, &s.layouts)
            .with_context(|| format!("Failed to place signal {:?} in layer {:?}", s.name, layer.muxor))?;
    }
    for nested in &layer.layers {
        add_layer(network, message, Some(id), nested)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_config() -> AppConfig {
        toml::from_str(
            r#"
            [[types]]
            name = "u8"
            kind = "integer"

            [[types]]
            name = "u16"
            kind = "integer"
            size = 16

            [[messages]]
            name = "mux_tree"
            can_id = 0x200
            size_byte = 8
            bus = "chassis"

            [[messages.signals]]
            name = "base"
            type = "u16"
            start_pos = 24
            value = 49153

            [[messages.layers]]
            muxor = "top_mux"
            start_pos = 0
            layout_count = 256
            value = 1

            [[messages.layers.layers]]
            muxor = "inner_mux"
            start_pos = 8
            layout_count = 256
            layout = 1
            value = 255

            [[messages.layers.layers.signals]]
            name = "in_255"
            type = "u8"
            start_pos = 16
            layouts = [255]
            value = 193

            [[messages.layers]]
            muxor = "bottom_mux"
            start_pos = 56
            layout_count = 256
            value = 0

            [[messages.layers.signals]]
            name = "in02"
            type = "u8"
            start_pos = 40
            layouts = [0]
            value = 193

            [[messages.layers.signals]]
            name = "in0"
            type = "u8"
            start_pos = 48
            layouts = [0]
            value = 193
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_multiplexed_message() {
        let network = build_network("test", &scenario_config()).unwrap();
        let bus = network.bus_by_name("chassis").unwrap();
        let message = bus.message_by_can_id(0x200).unwrap();

        assert_eq!(message.signals().len(), 7);
        assert_eq!(
            message.encode(),
            vec![0x01, 0xFF, 0xC1, 0x01, 0xC0, 0xC1, 0xC1, 0x00]
        );
        assert_eq!(network.types.references(network.types.get_by_name("u8").unwrap().entity_id()).unwrap(), 3);
    }

    #[test]
    fn test_build_errors_carry_context() {
        let mut config = scenario_config();
        config.messages[0].signals[0].start_pos = Some(0);
        let err = build_network("test", &config).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("Failed to build message \"mux_tree\""));
        assert!(chain.contains("top_mux"));

        let mut config = scenario_config();
        config.messages[0].signals[0].signal_type = Some("u32".to_string());
        let err = build_network("test", &config).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown signal type"));
    }

    #[test]
    fn test_big_endian_start_bit() {
        let config: AppConfig = toml::from_str(
            r#"
            [[types]]
            name = "u12"
            kind = "integer"
            size = 12

            [[messages]]
            name = "be"
            can_id = 0x300
            size_byte = 8

            [[messages.signals]]
            name = "a"
            type = "u12"
            endianness = "big"
            big_endian_start_bit = 7
            value = 3073

            [[messages.signals]]
            name = "b"
            type = "u12"
            endianness = "big"
            big_endian_start_bit = 11
            value = 3073
            "#,
        )
        .unwrap();

        let network = build_network("test", &config).unwrap();
        let message = network.buses()[0].message_by_name("be").unwrap();
        assert_eq!(&message.encode()[..3], &[0xC0, 0x1C, 0x01]);
    }
}
