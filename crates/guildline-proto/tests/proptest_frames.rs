//! Property-based tests for the frame codec and event registry.
//!
//! 1. Decoding never panics, whatever the input
//! 2. Any tag without a registry entry materializes as `Unrecognized`
//! 3. Routing fields survive an encode/decode pass

use guildline_proto::{decode_frame, encode_frame, Event, EventEnvelope, EventRegistry, Opcode};
use proptest::prelude::*;
use serde_json::json;

// =============================================================================
// STRATEGIES
// =============================================================================

/// Tags that look like real ones but are not in the default registry.
fn unknown_tag_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z]{2,30}")
        .expect("valid regex")
        .prop_filter("must not be a default tag", |tag| {
            !EventRegistry::with_defaults().contains(tag)
        })
}

fn message_id_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::string::string_regex("[a-f0-9]{8,32}").expect("valid regex"))
}

fn opcode_strategy() -> impl Strategy<Value = Opcode> {
    any::<u8>().prop_map(Opcode::from_u8)
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn decode_never_panics(raw in ".{0,256}") {
        let _ = decode_frame(&raw);
    }

    #[test]
    fn decode_never_panics_on_object_shaped_input(
        op in prop_oneof![Just(json!(0)), Just(json!(-3)), Just(json!("1")), Just(json!(null)), Just(json!(1e9))],
        tag in prop_oneof![Just(json!("ChatMessageCreated")), Just(json!(7)), Just(json!(null))],
    ) {
        let raw = json!({"op": op, "t": tag, "d": {}}).to_string();
        let _ = decode_frame(&raw);
    }

    #[test]
    fn unknown_tags_are_unrecognized(tag in unknown_tag_strategy(), n in any::<i64>()) {
        let registry = EventRegistry::with_defaults();
        let envelope = EventEnvelope::event(tag.clone(), json!({ "value": n }));

        let event = registry.materialize(&envelope).unwrap();
        prop_assert_eq!(event, Event::Unrecognized { tag });
    }

    #[test]
    fn routing_fields_survive_encoding(
        tag in "[A-Za-z]{1,24}",
        opcode in opcode_strategy(),
        message_id in message_id_strategy(),
    ) {
        let mut envelope = EventEnvelope::event(tag, json!({}));
        envelope.opcode = opcode;
        envelope.message_id = message_id;

        let decoded = decode_frame(&encode_frame(&envelope)).unwrap();
        prop_assert_eq!(decoded, envelope);
    }
}
