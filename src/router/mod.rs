//! Message Router.
//!
//! Constructs and persists cross-app messages, resolving fan-out recipient
//! sets per send. Recipient resolution is never cached: each send looks the
//! bus, driver and supervisors up against the store so staleness is bounded
//! to a single operation. Fan-out legs are independent sends; an individual
//! leg failure is logged and recorded in the report, never surfaced as an
//! error to the caller.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::model::{
    AttendanceRecord, Bus, CheckinMethod, Message, MessageType, Participant, Priority, Role,
    Supervisor,
    message::{checkin_payload, emergency_payload, location_payload},
};
use crate::store::{Query, RemoteStore, collections, encode};
use crate::utils::SyncError;

/// Outcome of one fan-out leg.
#[derive(Debug, Clone)]
pub struct FanOutLeg {
    pub recipient: Participant,
    pub delivered: bool,
}

/// Per-recipient outcomes of one fan-out send. The caller-facing contract
/// stays "recipient resolution succeeded"; tests and diagnostics can
/// inspect individual legs.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub legs: Vec<FanOutLeg>,
}

impl FanOutReport {
    pub fn attempted(&self) -> usize {
        self.legs.len()
    }

    pub fn delivered(&self) -> usize {
        self.legs.iter().filter(|leg| leg.delivered).count()
    }

    pub fn is_complete(&self) -> bool {
        self.legs.iter().all(|leg| leg.delivered)
    }
}

pub struct MessageRouter {
    store: Arc<dyn RemoteStore>,
}

impl MessageRouter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Persist one message. Preconditions (addressed sender and receiver)
    /// are checked before any store call; on success the message is durably
    /// written unread under its own id.
    pub async fn send(&self, message: &Message) -> Result<String, SyncError> {
        if message.sender().id.is_empty() {
            return Err(SyncError::MissingField("sender_id"));
        }
        if message.receiver().id.is_empty() {
            return Err(SyncError::MissingField("receiver_id"));
        }
        let data = encode(message)?;
        self.store
            .set(collections::MESSAGES, message.id(), data)
            .await?;
        debug!(
            "sent {} message {} to {} ({})",
            message.kind(),
            message.id(),
            message.receiver().id,
            message.receiver().role,
        );
        Ok(message.id().to_string())
    }

    /// Fan a location update out to the bus's driver and every supervisor
    /// covering the bus's route. Only the bus lookup can fail; a bus with no
    /// assigned driver skips the driver leg and a route with no supervisors
    /// is a no-op.
    pub async fn send_location_update(
        &self,
        student_id: &str,
        bus_id: &str,
        latitude: f64,
        longitude: f64,
        speed: f64,
        heading: &str,
    ) -> Result<FanOutReport, SyncError> {
        let bus = self.bus(bus_id).await?;
        let payload = location_payload(
            latitude,
            longitude,
            speed,
            heading,
            chrono::Utc::now().timestamp_millis(),
        );
        let sender = Participant::new(student_id, Role::Student);

        let mut outbound = Vec::new();
        if let Some(driver_id) = &bus.driver_id {
            outbound.push(
                Message::new(
                    sender.clone(),
                    Participant::new(driver_id, Role::Driver),
                    MessageType::LocationUpdate,
                )
                .with_title("Student location update")
                .with_body(format!("Student {student_id} location updated"))
                .with_payload(payload.clone())
                .with_bus_id(bus_id)
                .with_student_id(student_id),
            );
        } else {
            debug!("bus {bus_id} has no assigned driver, skipping driver leg");
        }
        if let Some(route_id) = &bus.route_id {
            for supervisor in self.route_supervisors(route_id).await {
                outbound.push(
                    Message::new(
                        sender.clone(),
                        Participant::new(&supervisor.supervisor_id, Role::Supervisor),
                        MessageType::LocationUpdate,
                    )
                    .with_title("Student location update")
                    .with_body(format!(
                        "Student {student_id} location updated on route {route_id}"
                    ))
                    .with_payload(payload.clone())
                    .with_bus_id(bus_id)
                    .with_route_id(route_id)
                    .with_student_id(student_id),
                );
            }
        }

        Ok(self.fan_out(outbound).await)
    }

    /// Fan a check-in out to the driver and the route's supervisors at high
    /// priority.
    pub async fn send_check_in_notification(
        &self,
        student_id: &str,
        bus_id: &str,
        stop_id: &str,
        method: CheckinMethod,
    ) -> Result<FanOutReport, SyncError> {
        let bus = self.bus(bus_id).await?;
        let payload = checkin_payload(stop_id, method, chrono::Utc::now().timestamp_millis());
        let sender = Participant::new(student_id, Role::Student);

        let mut outbound = Vec::new();
        if let Some(driver_id) = &bus.driver_id {
            outbound.push(
                Message::new(
                    sender.clone(),
                    Participant::new(driver_id, Role::Driver),
                    MessageType::Checkin,
                )
                .with_priority(Priority::High)
                .with_title("Student check-in")
                .with_body(format!("Student {student_id} checked in at stop {stop_id}"))
                .with_payload(payload.clone())
                .with_bus_id(bus_id)
                .with_student_id(student_id),
            );
        } else {
            debug!("bus {bus_id} has no assigned driver, skipping driver leg");
        }
        if let Some(route_id) = &bus.route_id {
            for supervisor in self.route_supervisors(route_id).await {
                outbound.push(
                    Message::new(
                        sender.clone(),
                        Participant::new(&supervisor.supervisor_id, Role::Supervisor),
                        MessageType::Checkin,
                    )
                    .with_priority(Priority::High)
                    .with_title("Student check-in")
                    .with_body(format!("Student {student_id} checked in at stop {stop_id}"))
                    .with_payload(payload.clone())
                    .with_bus_id(bus_id)
                    .with_route_id(route_id)
                    .with_student_id(student_id),
                );
            }
        }

        Ok(self.fan_out(outbound).await)
    }

    /// Broadcast an emergency to the bus's driver and every active
    /// supervisor, organization-wide, at urgent priority. Always.
    pub async fn send_emergency_alert(
        &self,
        student_id: &str,
        bus_id: &str,
        category: &str,
        message: &str,
    ) -> Result<FanOutReport, SyncError> {
        let bus = self.bus(bus_id).await?;
        let payload = emergency_payload(category, chrono::Utc::now().timestamp_millis());
        let sender = Participant::new(student_id, Role::Student);

        let mut outbound = Vec::new();
        if let Some(driver_id) = &bus.driver_id {
            outbound.push(
                Message::new(
                    sender.clone(),
                    Participant::new(driver_id, Role::Driver),
                    MessageType::Emergency,
                )
                .with_priority(Priority::Urgent)
                .with_title("EMERGENCY ALERT")
                .with_body(message)
                .with_payload(payload.clone())
                .with_bus_id(bus_id)
                .with_student_id(student_id),
            );
        } else {
            debug!("bus {bus_id} has no assigned driver, skipping driver leg");
        }
        for supervisor in self.active_supervisors().await {
            outbound.push(
                Message::new(
                    sender.clone(),
                    Participant::new(&supervisor.supervisor_id, Role::Supervisor),
                    MessageType::Emergency,
                )
                .with_priority(Priority::Urgent)
                .with_title("EMERGENCY ALERT")
                .with_body(message)
                .with_payload(payload.clone())
                .with_bus_id(bus_id)
                .with_student_id(student_id),
            );
        }

        Ok(self.fan_out(outbound).await)
    }

    /// Mirror one check-in into the attendance collection for the
    /// supervisor app. Returns the stored record id.
    pub async fn record_attendance(
        &self,
        student_id: &str,
        bus_id: &str,
        stop_id: &str,
        method: CheckinMethod,
        timestamp: i64,
    ) -> Result<String, SyncError> {
        let record = AttendanceRecord {
            student_id: student_id.to_string(),
            bus_id: bus_id.to_string(),
            stop_id: stop_id.to_string(),
            method,
            timestamp,
            synced_at: chrono::Utc::now().timestamp_millis(),
        };
        let id = self
            .store
            .add(collections::ATTENDANCE, encode(&record)?)
            .await?;
        debug!("attendance record {id} stored for student {student_id}");
        Ok(id)
    }

    /// Mark a message read, stamping `read_at` on the first transition only.
    /// Marking an already-read message succeeds without touching it.
    pub async fn mark_read(&self, message_id: &str) -> Result<(), SyncError> {
        let document = self
            .store
            .get(collections::MESSAGES, message_id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                collection: collections::MESSAGES.to_string(),
                id: message_id.to_string(),
            })?;
        let message: Message = document.decode().map_err(|e| SyncError::Decode {
            collection: collections::MESSAGES.to_string(),
            source: e,
        })?;
        if message.is_read() {
            debug!("message {message_id} already read");
            return Ok(());
        }

        let mut patch = crate::store::DocumentData::new();
        patch.insert("read".into(), serde_json::json!(true));
        patch.insert(
            "read_at".into(),
            serde_json::json!(chrono::Utc::now().timestamp_millis()),
        );
        self.store
            .update(collections::MESSAGES, message_id, patch)
            .await?;
        debug!("message {message_id} marked read");
        Ok(())
    }

    async fn bus(&self, bus_id: &str) -> Result<Bus, SyncError> {
        let document = self
            .store
            .get(collections::BUSES, bus_id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                collection: collections::BUSES.to_string(),
                id: bus_id.to_string(),
            })?;
        document.decode().map_err(|e| SyncError::Decode {
            collection: collections::BUSES.to_string(),
            source: e,
        })
    }

    /// Active supervisors whose assigned routes cover `route_id`. Resolution
    /// failure degrades to an empty set so sibling legs still go out.
    async fn route_supervisors(&self, route_id: &str) -> Vec<Supervisor> {
        let query = Query::collection(collections::SUPERVISORS)
            .where_array_contains("assigned_routes", route_id)
            .where_eq("is_active", true);
        self.supervisors(query, route_id).await
    }

    /// Every active supervisor, regardless of route assignment.
    async fn active_supervisors(&self) -> Vec<Supervisor> {
        let query = Query::collection(collections::SUPERVISORS).where_eq("is_active", true);
        self.supervisors(query, "*").await
    }

    async fn supervisors(&self, query: Query, scope: &str) -> Vec<Supervisor> {
        match self.store.query(&query).await {
            Ok(documents) => documents
                .iter()
                .filter_map(|document| match document.decode::<Supervisor>() {
                    Ok(supervisor) => Some(supervisor),
                    Err(e) => {
                        warn!("skipping undecodable supervisor {}: {e}", document.id);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!("failed to resolve supervisors for {scope}: {e}");
                Vec::new()
            }
        }
    }

    /// Send every leg concurrently; log failures, report per-leg outcomes.
    async fn fan_out(&self, outbound: Vec<Message>) -> FanOutReport {
        let results = join_all(outbound.iter().map(|message| self.send(message))).await;
        let mut report = FanOutReport::default();
        for (message, result) in outbound.iter().zip(results) {
            let delivered = match result {
                Ok(_) => true,
                Err(e) => {
                    warn!(
                        "fan-out leg to {} ({}) failed: {e}",
                        message.receiver().id,
                        message.receiver().role,
                    );
                    false
                }
            };
            report.legs.push(FanOutLeg {
                recipient: message.receiver(),
                delivered,
            });
        }
        report
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter").finish()
    }
}
