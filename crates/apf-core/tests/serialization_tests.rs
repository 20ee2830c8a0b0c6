//! Serialization tests for apf-core types.

use apf_core::ports::LedgerEvent;
use apf_core::*;
use pretty_assertions::assert_eq;

#[test]
fn test_tier_roundtrip_through_json() {
    for tier in Tier::ALL {
        let json = serde_json::to_string(&tier).expect("serialize");
        let parsed: Tier = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, tier);
    }
}

#[test]
fn test_tier_rejects_capitalised_json() {
    assert!(serde_json::from_str::<Tier>("\"Pro\"").is_err());
}

#[test]
fn test_ledger_event_cancellation_shape() {
    let event = LedgerEvent::Cancellation {
        email: "a@b.com".to_string(),
        previous_tier: Tier::Pro,
    };
    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({
            "type": "cancellation",
            "email": "a@b.com",
            "previous_tier": "pro"
        })
    );
    let parsed: LedgerEvent = serde_json::from_value(value).expect("deserialize");
    assert_eq!(parsed, event);
}

#[test]
fn test_ids_serialize_as_plain_strings() {
    let id = CheckoutSessionId::from("cs_0123456789abcdef01234567");
    assert_eq!(
        serde_json::to_value(&id).expect("serialize"),
        serde_json::json!("cs_0123456789abcdef01234567")
    );
}

#[test]
fn test_credential_key_id_serializes_bare() {
    let cred = ApiCredential::parse("apf_free_ffffffffffffffffffffffffffffffff").expect("valid");
    assert_eq!(
        serde_json::to_value(cred.key_id()).expect("serialize"),
        serde_json::json!("ffffffffffffffffffffffffffffffff")
    );
}
