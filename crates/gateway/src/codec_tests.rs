// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_payload() -> Payload {
    Payload {
        type_url: "tnc.example/Heartbeat".to_string(),
        value: vec![1, 2, 3, 4, 5, 0, 255],
    }
}

#[test]
fn round_trips_without_source_id() {
    let original = sample_payload();
    let bus = BusPayload::to_bus(&original, None);
    let (decoded, source_id) = bus.from_bus().expect("valid base64");
    assert_eq!(decoded, original);
    assert!(source_id.is_none());
}

#[test]
fn round_trips_with_source_id() {
    let original = sample_payload();
    let source_id = Uuid::new_v4();
    let bus = BusPayload::to_bus(&original, Some(source_id));
    let (decoded, decoded_source) = bus.from_bus().expect("valid base64");
    assert_eq!(decoded, original);
    assert_eq!(decoded_source, Some(source_id));
}

#[test]
fn never_inspects_value_bytes() {
    let payload = Payload {
        type_url: String::new(),
        value: (0u8..=255).collect(),
    };
    let bus = BusPayload::to_bus(&payload, None);
    let (decoded, _) = bus.from_bus().expect("valid base64");
    assert_eq!(decoded.value, payload.value);
}

#[test]
fn json_round_trip_preserves_fields() {
    let bus = BusPayload {
        object_type: "tnc.example/Ping".to_string(),
        value: "AAAA".to_string(),
        source_id: Some(Uuid::new_v4()),
    };
    let bytes = bus.to_bytes().expect("serializable");
    let back = BusPayload::from_bytes(&bytes).expect("deserializable");
    assert_eq!(bus, back);
}

#[test]
fn rejects_non_base64_value() {
    let bus = BusPayload {
        object_type: "x".to_string(),
        value: "not base64!!".to_string(),
        source_id: None,
    };
    assert!(bus.from_bus().is_err());
}

#[test]
fn rejects_malformed_json() {
    assert!(BusPayload::from_bytes(b"{not json").is_err());
}

proptest::proptest! {
    #[test]
    fn to_bus_from_bus_preserves_arbitrary_bytes(type_url: String, value: Vec<u8>) {
        let payload = Payload { type_url, value };
        let bus = BusPayload::to_bus(&payload, None);
        let (decoded, _) = bus.from_bus().expect("valid base64");
        proptest::prop_assert_eq!(decoded, payload);
    }
}
