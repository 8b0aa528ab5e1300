//! Property-based tests for lenient collaborator reply parsing.
//!
//! Whatever a model sends back, parsing must not panic, names come out
//! trimmed and non-empty, and scores stay within [0, 1].

use anima_reasoning::schema::{
    parse_generated_text, parse_json_object, parse_reply, Classification, ResponseNeed,
};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn arbitrary_replies_never_panic(reply in ".{0,200}") {
        let _ = parse_json_object(&reply);
        let _ = parse_reply::<Classification>(&reply);
        let _ = parse_generated_text(&reply);
    }

    #[test]
    fn state_names_are_trimmed_and_non_empty(
        raw in prop::collection::vec("[ \\t]{0,2}[а-яА-Я ]{0,8}[ \\t]{0,2}", 0..8),
    ) {
        let reply = json!({ "states": raw }).to_string();
        let parsed: Classification = parse_reply(&reply).unwrap();
        let expected: Vec<String> = raw
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        prop_assert_eq!(parsed.states, expected);
    }

    #[test]
    fn urgency_is_clamped(urgency in -1.0e6f64..1.0e6) {
        let reply = json!({ "respond": true, "urgency": urgency }).to_string();
        let parsed: ResponseNeed = parse_reply(&reply).unwrap();
        let value = parsed.urgency.unwrap();
        prop_assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn plain_prose_is_returned_as_is(text in "[а-яА-Я][а-яА-Я ,.!?]{0,60}") {
        let parsed = parse_generated_text(&text).unwrap();
        prop_assert_eq!(parsed, text.trim());
    }
}
