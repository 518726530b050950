// Flat (non-multiplexed) layouts: placement, codec and maintenance

use can_layout::{
    start_pos_from_big_endian, Cause, Endianness, LayoutConfig, LayoutError, Message, Network,
    Signal, SignalEnum, SignalType, SignalUnit, SignalUnitKind, SignalValue,
};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn u16_type() -> Arc<SignalType> {
    Arc::new(SignalType::integer("u16", 16, false).unwrap())
}

/// Four u16 signals at 0, 16, 32 and 48, all set to 3073
fn four_u16(endianness: Endianness) -> Message {
    let t = u16_type();
    let mut msg = Message::new("four_u16", 0x100, 8).unwrap();
    for i in 0..4 {
        let sig = Signal::new_standard(format!("s{}", i), t.clone()).with_endianness(endianness);
        let id = msg.insert_signal(sig, i * 16).unwrap();
        msg.signal_mut(id).unwrap().update_encoded_value(3073).unwrap();
    }
    msg
}

#[test]
fn test_basic_u16_layout() {
    init_logging();
    let msg = four_u16(Endianness::Little);

    let bytes = msg.encode();
    assert_eq!(bytes, vec![0x01, 0x0C, 0x01, 0x0C, 0x01, 0x0C, 0x01, 0x0C]);

    let decoded = msg.decode(&bytes);
    assert_eq!(decoded.len(), 4);
    for (i, d) in decoded.iter().enumerate() {
        assert_eq!(d.name, format!("s{}", i));
        assert_eq!(d.raw_value, 3073);
        assert_eq!(d.value, SignalValue::Uint(3073));
    }
}

#[test]
fn test_typed_mixed_layout() {
    init_logging();
    let mut network = Network::new("bench");
    let volt = network
        .units
        .add(SignalUnit::new("volt", SignalUnitKind::Voltage, "V"))
        .unwrap();
    let flag = network.types.add(SignalType::flag("flag")).unwrap();
    let u8_t = network.types.add(SignalType::integer("u8", 8, false).unwrap()).unwrap();
    let i8_t = network.types.add(SignalType::integer("i8", 8, true).unwrap()).unwrap();
    let du16 = network
        .types
        .add(SignalType::decimal("du16", 16, false).unwrap().with_scale(0.5).with_offset(100.5))
        .unwrap();
    let di16 = network
        .types
        .add(SignalType::decimal("di16", 16, true).unwrap().with_scale(0.5).with_offset(100.5))
        .unwrap();

    let mut msg = Message::new("mixed", 0x101, 7).unwrap();
    let mut place = |sig: Signal, start: usize, value: u64| {
        let id = msg.insert_signal(sig, start).unwrap();
        msg.signal_mut(id).unwrap().update_encoded_value(value).unwrap();
    };
    place(Signal::new_standard("flag", flag), 0, 1);
    place(Signal::new_standard("u8", u8_t), 8, 193);
    place(Signal::new_standard("i8", i8_t.clone()), 16, i8_t.raw_from_signed(-63));
    place(Signal::new_standard("du16", du16).with_unit(volt.clone()).unwrap(), 24, 0xC001);
    place(Signal::new_standard("di16", di16).with_unit(volt).unwrap(), 40, 0xC001);

    let bytes = msg.encode();
    assert_eq!(bytes, vec![0x01, 0xC1, 0xC1, 0x01, 0xC0, 0x01, 0xC0]);

    let decoded = msg.decode(&bytes);
    let values: Vec<&SignalValue> = decoded.iter().map(|d| &d.value).collect();
    assert_eq!(
        values,
        vec![
            &SignalValue::Flag(true),
            &SignalValue::Uint(193),
            &SignalValue::Int(-63),
            &SignalValue::Float(24677.0),
            &SignalValue::Float(-8091.0),
        ]
    );
    assert_eq!(decoded[3].unit.as_deref(), Some("V"));
    assert_eq!(decoded[4].unit.as_deref(), Some("V"));
    assert_eq!(decoded[0].unit, None);
}

#[test]
fn test_big_endian_layouts() {
    init_logging();

    // Byte-aligned big-endian u16 keeps the most significant byte first
    let msg = four_u16(Endianness::Big);
    assert_eq!(
        msg.encode(),
        vec![0x0C, 0x01, 0x0C, 0x01, 0x0C, 0x01, 0x0C, 0x01]
    );

    // 12-bit signals addressed by DBC sawtooth start bits
    let t = Arc::new(SignalType::integer("u12", 12, false).unwrap());
    let mut msg = Message::new("be12", 0x102, 8).unwrap();
    for (i, bit) in [7usize, 11, 31, 35].into_iter().enumerate() {
        let sig = Signal::new_standard(format!("be{}", i), t.clone()).with_endianness(Endianness::Big);
        let id = msg.insert_signal(sig, start_pos_from_big_endian(bit)).unwrap();
        msg.signal_mut(id).unwrap().update_encoded_value(0xC01).unwrap();
    }

    let bytes = msg.encode();
    assert_eq!(bytes, vec![0xC0, 0x1C, 0x01, 0xC0, 0x1C, 0x01, 0x00, 0x00]);
    assert!(msg.decode(&bytes).iter().all(|d| d.raw_value == 0xC01));
}

#[test]
fn test_enum_layout() {
    init_logging();
    let build = |name: &str, count: u64| {
        let mut e = SignalEnum::new(name);
        for i in 0..count {
            e.add_value(i, format!("enum_value_{}", i)).unwrap();
        }
        e
    };

    let small = Arc::new(build("small", 4));
    let medium = Arc::new(build("medium", 8));
    let mut wide = build("wide", 128);
    wide.set_fixed_size(true);
    wide.update_size(8).unwrap();
    let wide = Arc::new(wide);
    assert_eq!((small.size(), medium.size(), wide.size()), (2, 3, 8));

    let mut msg = Message::new("enums", 0x103, 4).unwrap();
    for (name, e, start, value) in [
        ("a", small, 0, 1),
        ("b", medium, 8, 2),
        ("c", wide, 16, 127),
    ] {
        let id = msg.insert_signal(Signal::new_enum(name, e), start).unwrap();
        msg.signal_mut(id).unwrap().update_encoded_value(value).unwrap();
    }

    let bytes = msg.encode();
    assert_eq!(bytes, vec![0x01, 0x02, 0x7F, 0x00]);

    let names: Vec<String> = msg
        .decode(&bytes)
        .into_iter()
        .filter_map(|d| d.value.as_str().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["enum_value_1", "enum_value_2", "enum_value_127"]);
}

#[test]
fn test_overlap_rejection() {
    init_logging();
    let mut msg = four_u16(Endianness::Little);
    let before = msg.encode();

    let err = msg
        .insert_signal(Signal::new_standard("overlap", u16_type()), 8)
        .unwrap_err();
    match err {
        LayoutError::Intersect { with } => assert!(with == "s0" || with == "s1"),
        other => panic!("unexpected error: {}", other),
    }

    // State unchanged
    assert_eq!(msg.signals().len(), 4);
    assert!(msg.signal_by_name("overlap").is_none());
    assert_eq!(msg.encode(), before);
    assert_eq!(msg.layout().filters().len(), 8);
}

#[test]
fn test_bounds_and_names() {
    let mut msg = Message::new("bounds", 0x104, 2).unwrap();

    let err = msg
        .insert_signal(Signal::new_standard("late", u16_type()), 1)
        .unwrap_err();
    assert!(matches!(err, LayoutError::StartPos { cause: Cause::OutOfBounds, .. }));

    msg.insert_signal(Signal::new_standard("a", u16_type()), 0).unwrap();
    msg.resize(4).unwrap();
    let err = msg
        .insert_signal(Signal::new_standard("a", u16_type()), 16)
        .unwrap_err();
    assert!(matches!(err, LayoutError::Name { cause: Cause::IsDuplicated, .. }));
    assert_eq!(msg.signals().len(), 1);
}

#[test]
fn test_round_trip_every_position() {
    // Any value fitting the signal reads back as the same raw value
    let t = Arc::new(SignalType::integer("u11", 11, false).unwrap());
    for endianness in [Endianness::Little, Endianness::Big] {
        for start in 0..=(64 - 11) {
            let mut msg = Message::new("rt", 0x106, 8).unwrap();
            let sig = Signal::new_standard("s", t.clone()).with_endianness(endianness);
            let id = msg.insert_signal(sig, start).unwrap();
            for value in [0u64, 1, 0x2AA, 0x555, 0x7FF] {
                msg.signal_mut(id).unwrap().update_encoded_value(value).unwrap();
                let decoded = msg.decode(&msg.encode());
                assert_eq!(decoded[0].raw_value, value, "{} at {}", endianness, start);
            }
        }
    }
}

#[test]
fn test_encoded_value_bounds() {
    let mut msg = Message::new("values", 0x107, 8).unwrap();
    let id = msg.insert_signal(Signal::new_standard("s", u16_type()), 0).unwrap();

    let mut sig = msg.signal_mut(id).unwrap();
    assert!(sig.update_encoded_value(0xFFFF).is_ok());
    assert!(sig.update_encoded_value(0x1_0000).is_err());
    assert_eq!(sig.get().encoded_value(), 0xFFFF);
}

#[test]
fn test_update_start_pos() {
    let mut msg = four_u16(Endianness::Little);
    let s3 = msg.signal_by_name("s3").unwrap().entity_id();
    let s0 = msg.signal_by_name("s0").unwrap().entity_id();

    // Moving onto a neighbour fails and leaves the signal in place
    let err = msg.signal_mut(s3).unwrap().update_start_pos(40).unwrap_err();
    assert!(matches!(err, LayoutError::Intersect { .. }));
    assert_eq!(msg.signal(s3).unwrap().start_pos(), 48);

    msg.signal_mut(s0).unwrap().update_start_pos(0).unwrap();
    msg.delete_signal(s3).unwrap();
    msg.signal_mut(s0).unwrap().update_start_pos(48).unwrap();
    assert_eq!(msg.encode(), vec![0x00, 0x00, 0x01, 0x0C, 0x01, 0x0C, 0x01, 0x0C]);
}

#[test]
fn test_overflowing_start_pos_is_out_of_bounds() {
    init_logging();
    let mut msg = four_u16(Endianness::Little);
    let s0 = msg.signal_by_name("s0").unwrap().entity_id();
    msg.delete_signal(msg.signal_by_name("s3").unwrap().entity_id()).unwrap();
    let u8_t = Arc::new(SignalType::integer("u8", 8, false).unwrap());

    for start_pos in [usize::MAX, usize::MAX - 2] {
        let err = msg
            .insert_signal(Signal::new_standard("far", u8_t.clone()), start_pos)
            .unwrap_err();
        assert!(matches!(err, LayoutError::StartPos { cause: Cause::OutOfBounds, .. }));

        let err = msg.signal_mut(s0).unwrap().update_start_pos(start_pos).unwrap_err();
        assert!(matches!(err, LayoutError::StartPos { cause: Cause::OutOfBounds, .. }));

        let err = msg
            .layout_mut()
            .add_multiplexed_layer("far_mux", start_pos, 4)
            .unwrap_err();
        assert!(matches!(err, LayoutError::StartPos { cause: Cause::OutOfBounds, .. }));
    }

    // Nothing was placed and the remaining signals still encode
    assert!(msg.signal_by_name("far").is_none());
    assert_eq!(msg.signal(s0).unwrap().start_pos(), 0);
    assert_eq!(msg.signals().len(), 3);
    assert_eq!(msg.encode(), vec![0x01, 0x0C, 0x01, 0x0C, 0x01, 0x0C, 0x00, 0x00]);
}

#[test]
fn test_update_type_and_enum() {
    let mut msg = Message::new("retype", 0x108, 8).unwrap();
    let u8_t = Arc::new(SignalType::integer("u8", 8, false).unwrap());
    let a = msg.insert_signal(Signal::new_standard("a", u8_t.clone()), 0).unwrap();
    msg.insert_signal(Signal::new_standard("b", u8_t), 8).unwrap();
    msg.signal_mut(a).unwrap().update_encoded_value(0xFF).unwrap();

    // Growing into the neighbour is rejected
    let err = msg.signal_mut(a).unwrap().update_type(u16_type()).unwrap_err();
    assert!(matches!(err, LayoutError::Intersect { .. }));
    assert_eq!(msg.signal(a).unwrap().size(), 8);

    // Shrinking truncates the encoded value
    let u4 = Arc::new(SignalType::integer("u4", 4, false).unwrap());
    msg.signal_mut(a).unwrap().update_type(u4).unwrap();
    assert_eq!(msg.signal(a).unwrap().size(), 4);
    assert_eq!(msg.signal(a).unwrap().encoded_value(), 0xF);
    assert_eq!(msg.layout().filters()[0].mask, 0x0F);

    // Enum operations on a standard signal are conversion errors
    let e = Arc::new(SignalEnum::new("e"));
    let err = msg.signal_mut(a).unwrap().update_enum(e).unwrap_err();
    assert!(matches!(err, LayoutError::Conversion { .. }));
}

#[test]
fn test_resize() {
    let mut msg = four_u16(Endianness::Little);

    let err = msg.resize(7).unwrap_err();
    assert_eq!(err.cause(), Some(Cause::TooSmall));
    assert_eq!(msg.size_byte(), 8);

    let err = msg.resize(9).unwrap_err();
    assert_eq!(err.cause(), Some(Cause::TooBig));

    let config = LayoutConfig::new().with_max_size_byte(64);
    let mut fd = Message::with_config("fd", 0x109, 8, config).unwrap();
    fd.insert_signal(Signal::new_standard("s", u16_type()), 48).unwrap();
    fd.resize(64).unwrap();
    fd.insert_signal(Signal::new_standard("tail", u16_type()), 496).unwrap();
    assert_eq!(fd.encode().len(), 64);
    assert!(fd.resize(8).is_err());
}

#[test]
fn test_compact_is_idempotent() {
    let mut msg = Message::new("sparse", 0x10A, 8).unwrap();
    let u8_t = Arc::new(SignalType::integer("u8", 8, false).unwrap());
    let a = msg.insert_signal(Signal::new_standard("a", u8_t.clone()), 40).unwrap();
    let b = msg.insert_signal(Signal::new_standard("b", u16_type()), 12).unwrap();
    let c = msg.insert_signal(Signal::new_standard("c", u8_t), 60 - 8).unwrap();

    assert!(msg.compact());
    let positions = |msg: &Message| {
        [a, b, c].map(|id| msg.signal(id).unwrap().start_pos())
    };
    assert_eq!(positions(&msg), [16, 0, 24]);

    let filters = msg.layout().filters().to_vec();
    assert!(msg.compact());
    assert_eq!(positions(&msg), [16, 0, 24]);
    assert_eq!(msg.layout().filters(), filters.as_slice());

    // A multiplexed message is never compacted
    msg.layout_mut().add_multiplexed_layer("mux", 56, 4).unwrap();
    assert!(!msg.compact());
}

#[test]
fn test_clear_signals() {
    let mut msg = four_u16(Endianness::Little);
    msg.layout_mut().add_multiplexed_layer("mux", 0, 2).unwrap_err();
    msg.clear_signals();

    assert!(msg.signals().is_empty());
    assert!(msg.signal_names().is_empty());
    assert_eq!(msg.encode(), vec![0; 8]);

    // Names are free again
    msg.insert_signal(Signal::new_standard("s0", u16_type()), 0).unwrap();
}

#[test]
fn test_reference_counts() {
    let mut network = Network::new("refs");
    let t = network.types.add(SignalType::integer("u8", 8, false).unwrap()).unwrap();
    let type_id = t.entity_id();

    let mut msg = Message::new("m", 0x10B, 8).unwrap();
    let ids: Vec<_> = (0..3)
        .map(|i| {
            msg.insert_signal(Signal::new_standard(format!("s{}", i), t.clone()), i * 8)
                .unwrap()
        })
        .collect();
    drop(t);
    assert_eq!(network.types.references(type_id).unwrap(), 3);

    let err = network.types.remove(type_id).unwrap_err();
    assert_eq!(err.cause(), Some(Cause::InUse));

    // Retyping releases the old type
    let u4 = Arc::new(SignalType::integer("u4", 4, false).unwrap());
    msg.signal_mut(ids[0]).unwrap().update_type(u4).unwrap();
    assert_eq!(network.types.references(type_id).unwrap(), 2);

    msg.clear_signals();
    assert_eq!(network.types.references(type_id).unwrap(), 0);
    network.types.remove(type_id).unwrap();
}

#[test]
fn test_decodings_serialize() {
    let msg = four_u16(Endianness::Little);
    let json = serde_json::to_value(msg.decode(&msg.encode())).unwrap();

    assert_eq!(json[0]["name"], "s0");
    assert_eq!(json[0]["raw_value"], 3073);
    assert_eq!(json[0]["value"]["uint"], 3073);
    assert!(json[0]["unit"].is_null());
}
