//! Message definitions for the sync core.
//!
//! `Message` is the canonical unit exchanged between the three client roles.
//! Fields are chosen to support addressed delivery (sender/receiver pairs),
//! routing and rendering by kind, and a priority policy with an emergency
//! escalation path.
//!
//! Notes on fields:
//! - `id`: opaque unique id generated by the sender at construction; doubles
//!   as the stored document id, so re-dispatch and read-marking are keyed
//!   stably
//! - `created_at` / `read_at`: milliseconds since UNIX epoch
//! - `payload`: open JSON object whose keys vary by `kind`
//! - `bus_id` / `route_id` / `student_id`: correlation fields carried through
//!   for downstream filtering

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::model::entities::CheckinMethod;
use crate::utils::SyncError;

/// Party role in the fleet-tracking product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Driver,
    Supervisor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Student => "student",
            Role::Driver => "driver",
            Role::Supervisor => "supervisor",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "driver" => Ok(Role::Driver),
            "supervisor" => Ok(Role::Supervisor),
            other => Err(SyncError::InvalidValue {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Message kind; determines routing and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    LocationUpdate,
    Checkin,
    Emergency,
    Notification,
    StatusUpdate,
    Attendance,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::LocationUpdate => "location_update",
            MessageType::Checkin => "checkin",
            MessageType::Emergency => "emergency",
            MessageType::Notification => "notification",
            MessageType::StatusUpdate => "status_update",
            MessageType::Attendance => "attendance",
        };
        f.write_str(s)
    }
}

impl FromStr for MessageType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location_update" => Ok(MessageType::LocationUpdate),
            "checkin" => Ok(MessageType::Checkin),
            "emergency" => Ok(MessageType::Emergency),
            "notification" => Ok(MessageType::Notification),
            "status_update" => Ok(MessageType::StatusUpdate),
            "attendance" => Ok(MessageType::Attendance),
            other => Err(SyncError::InvalidValue {
                field: "message_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Delivery priority. Unrecognized wire values are rejected, not coerced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(SyncError::InvalidValue {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// An addressable party: the id/role pair used on both ends of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    pub id: String,
    pub role: Role,
}

impl Participant {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// The unit exchanged between roles.
///
/// `id`, sender, receiver and `kind` are fixed at construction; everything
/// else is set through the `with_*` builders before the message is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: String,
    sender_id: String,
    sender_role: Role,
    receiver_id: String,
    receiver_role: Role,
    kind: MessageType,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    payload: Map<String, Value>,
    #[serde(default)]
    read: bool,
    #[serde(default)]
    read_at: Option<i64>,
    created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bus_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    route_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    student_id: Option<String>,
}

impl Message {
    /// Create a new unread message addressed from `sender` to `receiver`.
    ///
    /// Generates the id, stamps `created_at`, and defaults the priority to
    /// `Medium`.
    pub fn new(sender: Participant, receiver: Participant, kind: MessageType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.id,
            sender_role: sender.role,
            receiver_id: receiver.id,
            receiver_role: receiver.role,
            kind,
            priority: Priority::Medium,
            title: String::new(),
            body: String::new(),
            payload: Map::new(),
            read: false,
            read_at: None,
            created_at: chrono::Utc::now().timestamp_millis(),
            bus_id: None,
            route_id: None,
            student_id: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_bus_id(mut self, bus_id: impl Into<String>) -> Self {
        self.bus_id = Some(bus_id.into());
        self
    }

    pub fn with_route_id(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    pub fn with_student_id(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> Participant {
        Participant::new(self.sender_id.clone(), self.sender_role)
    }

    pub fn receiver(&self) -> Participant {
        Participant::new(self.receiver_id.clone(), self.receiver_role)
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn read_at(&self) -> Option<i64> {
        self.read_at
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn bus_id(&self) -> Option<&str> {
        self.bus_id.as_deref()
    }

    pub fn route_id(&self) -> Option<&str> {
        self.route_id.as_deref()
    }

    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_deref()
    }

    /// Mark the message read, stamping `read_at` on the first transition
    /// only. Re-marking an already-read message leaves `read_at` untouched.
    pub fn mark_read(&mut self, at: i64) {
        if !self.read {
            self.read = true;
            self.read_at = Some(at);
        }
    }
}

/// Payload for a `location_update` message.
pub fn location_payload(
    latitude: f64,
    longitude: f64,
    speed: f64,
    heading: &str,
    timestamp: i64,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("latitude".into(), json!(latitude));
    payload.insert("longitude".into(), json!(longitude));
    payload.insert("speed".into(), json!(speed));
    payload.insert("heading".into(), json!(heading));
    payload.insert("timestamp".into(), json!(timestamp));
    payload
}

/// Payload for a `checkin` message.
pub fn checkin_payload(
    stop_id: &str,
    method: CheckinMethod,
    timestamp: i64,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("stop_id".into(), json!(stop_id));
    payload.insert("method".into(), json!(method.to_string()));
    payload.insert("timestamp".into(), json!(timestamp));
    payload
}

/// Payload for an `emergency` message.
pub fn emergency_payload(category: &str, timestamp: i64) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("category".into(), json!(category));
    payload.insert("timestamp".into(), json!(timestamp));
    payload
}
