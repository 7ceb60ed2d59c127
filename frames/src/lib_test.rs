use super::*;
use serde_json::json;

#[test]
fn frame_type_reads_string_discriminator() {
    let frame = json!({"type": "user_joined", "user_id": 1});
    assert_eq!(frame_type(&frame).expect("type"), "user_joined");
}

#[test]
fn frame_type_rejects_missing_or_non_string_discriminator() {
    assert!(matches!(frame_type(&json!({"user_id": 1})), Err(FrameError::MissingType)));
    assert!(matches!(frame_type(&json!({"type": 7})), Err(FrameError::MissingType)));
    assert!(matches!(frame_type(&json!(["type"])), Err(FrameError::MissingType)));
}

#[test]
fn payload_prefers_nested_data_object() {
    let frame = json!({"type": "x", "data": {"k": "v"}});
    assert_eq!(payload(&frame), &json!({"k": "v"}));
}

#[test]
fn payload_falls_back_to_frame_when_data_is_not_an_object() {
    let frame = json!({"type": "x", "data": "scalar", "k": "v"});
    assert_eq!(payload(&frame), &frame);
}

#[test]
fn id_accepts_numeric_and_string_forms() {
    let numeric: Id = serde_json::from_value(json!(42)).expect("numeric id");
    let text: Id = serde_json::from_value(json!("42")).expect("string id");
    assert_eq!(numeric, text);
    assert_eq!(numeric.as_str(), "42");
}

#[test]
fn id_serializes_as_string() {
    let id = Id::from(7_i64);
    assert_eq!(serde_json::to_value(&id).expect("serialize"), json!("7"));
    assert_eq!(id.to_string(), "7");
}

#[test]
fn id_rejects_non_scalar_values() {
    assert!(serde_json::from_value::<Id>(json!({"id": 1})).is_err());
    assert!(serde_json::from_value::<Id>(json!(null)).is_err());
}

#[test]
fn field_reports_missing_field_with_kind() {
    let err = field::<Id>("user_left", &json!({}), "user_id").expect_err("missing field");
    match err {
        FrameError::MissingField { kind, field } => {
            assert_eq!(kind, "user_left");
            assert_eq!(field, "user_id");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn parse_reports_payload_errors_with_kind() {
    let err = parse::<Vec<Id>>("online_users", &json!("nope")).expect_err("bad payload");
    assert!(err.to_string().contains("online_users"));
}
