use super::*;
use crate::model::message::{checkin_payload, emergency_payload, location_payload};
use serde_json::json;

#[test]
fn test_priority_defaults_to_medium() {
    let message = Message::new(
        Participant::new("S1", Role::Student),
        Participant::new("D1", Role::Driver),
        MessageType::LocationUpdate,
    );
    assert_eq!(message.priority(), Priority::Medium);
}

#[test]
fn test_new_message_is_unread_with_created_at() {
    let message = Message::new(
        Participant::new("S1", Role::Student),
        Participant::new("D1", Role::Driver),
        MessageType::Checkin,
    );
    assert!(!message.is_read());
    assert!(message.read_at().is_none());
    assert!(message.created_at() > 0);
    assert!(!message.id().is_empty());
}

#[test]
fn test_message_ids_are_unique() {
    let a = Message::new(
        Participant::new("S1", Role::Student),
        Participant::new("D1", Role::Driver),
        MessageType::Notification,
    );
    let b = Message::new(
        Participant::new("S1", Role::Student),
        Participant::new("D1", Role::Driver),
        MessageType::Notification,
    );
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_mark_read_sets_read_at_once() {
    let mut message = Message::new(
        Participant::new("S1", Role::Student),
        Participant::new("SV1", Role::Supervisor),
        MessageType::Notification,
    );

    message.mark_read(1_725_000_000_000);
    assert!(message.is_read());
    assert_eq!(message.read_at(), Some(1_725_000_000_000));

    // Re-marking must not move the timestamp
    message.mark_read(1_725_000_999_999);
    assert_eq!(message.read_at(), Some(1_725_000_000_000));
}

#[test]
fn test_priority_parse_rejects_unknown_values() {
    assert!("urgent".parse::<Priority>().is_ok());
    let err = "critical".parse::<Priority>();
    assert!(err.is_err());

    // Wire-level decoding is just as strict
    assert!(serde_json::from_value::<Priority>(json!("critical")).is_err());
}

#[test]
fn test_role_and_kind_parse() {
    assert_eq!("driver".parse::<Role>().unwrap(), Role::Driver);
    assert!("dispatcher".parse::<Role>().is_err());
    assert_eq!(
        "location_update".parse::<MessageType>().unwrap(),
        MessageType::LocationUpdate
    );
    assert!("ping".parse::<MessageType>().is_err());
}

#[test]
fn test_checkin_method_parse() {
    assert_eq!("qr".parse::<CheckinMethod>().unwrap(), CheckinMethod::Qr);
    assert!("nfc".parse::<CheckinMethod>().is_err());
}

#[test]
fn test_message_serializes_flat_snake_case() {
    let message = Message::new(
        Participant::new("S1", Role::Student),
        Participant::new("SV1", Role::Supervisor),
        MessageType::Emergency,
    )
    .with_priority(Priority::Urgent)
    .with_title("EMERGENCY ALERT")
    .with_body("help")
    .with_bus_id("B1")
    .with_student_id("S1");

    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["receiver_id"], json!("SV1"));
    assert_eq!(value["receiver_role"], json!("supervisor"));
    assert_eq!(value["kind"], json!("emergency"));
    assert_eq!(value["priority"], json!("urgent"));
    assert_eq!(value["read"], json!(false));
    assert_eq!(value["bus_id"], json!("B1"));
    // Unset correlation fields stay off the wire entirely
    assert!(value.get("route_id").is_none());

    let decoded: Message = serde_json::from_value(value).unwrap();
    assert_eq!(decoded.id(), message.id());
    assert_eq!(decoded.kind(), MessageType::Emergency);
    assert_eq!(decoded.priority(), Priority::Urgent);
    assert_eq!(decoded.created_at(), message.created_at());
}

#[test]
fn test_payload_builders_carry_typed_keys() {
    let location = location_payload(37.0, -122.0, 20.0, "N", 1_725_000_000_000);
    assert_eq!(location["latitude"], json!(37.0));
    assert_eq!(location["heading"], json!("N"));

    let checkin = checkin_payload("STOP-3", CheckinMethod::Qr, 1_725_000_000_000);
    assert_eq!(checkin["stop_id"], json!("STOP-3"));
    assert_eq!(checkin["method"], json!("qr"));

    let emergency = emergency_payload("medical", 1_725_000_000_000);
    assert_eq!(emergency["category"], json!("medical"));
    assert_eq!(emergency["timestamp"], json!(1_725_000_000_000i64));
}

#[test]
fn test_entities_decode_from_partial_documents() {
    // Only the id is mandatory; everything else defaults
    let bus: Bus = serde_json::from_value(json!({ "bus_id": "B9" })).unwrap();
    assert_eq!(bus.bus_id, "B9");
    assert!(bus.driver_id.is_none());
    assert!(bus.current_location.is_none());
    assert_eq!(bus.speed, 0.0);

    let supervisor: Supervisor =
        serde_json::from_value(json!({ "supervisor_id": "SV9", "is_active": true })).unwrap();
    assert!(supervisor.assigned_routes.is_empty());
    assert!(supervisor.is_active);
}
