//! Sync Orchestrator.
//!
//! Wires up the long-lived watches a logged-in session needs and bridges
//! every inbound change to the right local callback (and, for bus
//! locations, back out through the router). Watch callbacks run on the
//! registry's forwarding tasks, so they may execute concurrently across
//! topics; a document that fails to decode is skipped with a warning while
//! its siblings in the same batch are still delivered.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::SyncSettings;
use crate::model::{Bus, Message, Role, Route, Schedule, Student};
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::router::MessageRouter;
use crate::store::{Direction, Query, RemoteStore, Snapshot, WatchTarget, collections};
use crate::utils::SyncError;

pub type MessagesCallback = Arc<dyn Fn(Vec<Message>) + Send + Sync>;
pub type StudentCallback = Arc<dyn Fn(Student) + Send + Sync>;
pub type BusCallback = Arc<dyn Fn(Bus) + Send + Sync>;
pub type RouteCallback = Arc<dyn Fn(Route) + Send + Sync>;
pub type SchedulesCallback = Arc<dyn Fn(Vec<Schedule>) + Send + Sync>;

pub struct SyncOrchestrator {
    router: Arc<MessageRouter>,
    registry: SubscriptionRegistry,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        router: Arc<MessageRouter>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            router,
            registry: SubscriptionRegistry::new(store),
            settings,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Watch the caller's unread messages, newest first. Every emission
    /// delivers the full current unread set, not a diff.
    pub fn start_message_sync(
        &self,
        user_id: &str,
        role: Role,
        on_new_messages: MessagesCallback,
    ) -> Result<Subscription, SyncError> {
        debug!("starting message sync for {user_id} ({role})");
        let query = self.unread_query(user_id, role);
        self.registry.open(
            WatchTarget::query(query),
            Arc::new(move |snapshot| {
                on_new_messages(decode_batch::<Message>(&snapshot, collections::MESSAGES));
                Ok(())
            }),
        )
    }

    /// Watch unread urgent emergencies on an independent channel so an
    /// emergency is never delayed behind general-message batching.
    pub fn start_emergency_sync(
        &self,
        user_id: &str,
        role: Role,
        on_emergency: MessagesCallback,
    ) -> Result<Subscription, SyncError> {
        debug!("starting emergency sync for {user_id} ({role})");
        let query = self
            .unread_query(user_id, role)
            .where_eq("kind", "emergency")
            .where_eq("priority", "urgent");
        self.registry.open(
            WatchTarget::query(query),
            Arc::new(move |snapshot| {
                let emergencies = decode_batch::<Message>(&snapshot, collections::MESSAGES);
                if !emergencies.is_empty() {
                    on_emergency(emergencies);
                }
                Ok(())
            }),
        )
    }

    /// Watch the student's own document.
    pub fn start_student_status_sync(
        &self,
        student_id: &str,
        on_update: StudentCallback,
    ) -> Result<Subscription, SyncError> {
        debug!("starting student status sync for {student_id}");
        self.registry.open(
            WatchTarget::document(collections::STUDENTS, student_id),
            Arc::new(move |snapshot| {
                if let Some(student) = decode_document::<Student>(&snapshot, collections::STUDENTS)
                {
                    on_update(student);
                }
                Ok(())
            }),
        )
    }

    /// Watch the assigned bus. Every change is forwarded to the caller and,
    /// when the bus carries a position, re-broadcast outward through the
    /// router so the counterpart apps see it too.
    pub fn start_bus_location_sync(
        &self,
        student_id: &str,
        bus_id: &str,
        on_location: BusCallback,
    ) -> Result<Subscription, SyncError> {
        debug!("starting bus location sync for student {student_id}, bus {bus_id}");
        let router = Arc::clone(&self.router);
        let rebroadcast = self.settings.rebroadcast_location;
        let student_id = student_id.to_string();
        let bus_id = bus_id.to_string();
        self.registry.open(
            WatchTarget::document(collections::BUSES, &bus_id),
            Arc::new(move |snapshot| {
                let Some(bus) = decode_document::<Bus>(&snapshot, collections::BUSES) else {
                    return Ok(());
                };
                let location = bus.current_location;
                let speed = bus.speed;
                let heading = bus.heading.clone().unwrap_or_default();
                on_location(bus);

                if rebroadcast {
                    if let Some(location) = location {
                        let router = Arc::clone(&router);
                        let student_id = student_id.clone();
                        let bus_id = bus_id.clone();
                        tokio::spawn(async move {
                            match router
                                .send_location_update(
                                    &student_id,
                                    &bus_id,
                                    location.latitude,
                                    location.longitude,
                                    speed,
                                    &heading,
                                )
                                .await
                            {
                                Ok(report) => debug!(
                                    "re-broadcast bus {bus_id} location to {} recipients",
                                    report.attempted(),
                                ),
                                Err(e) => warn!("bus {bus_id} location re-broadcast failed: {e}"),
                            }
                        });
                    }
                }
                Ok(())
            }),
        )
    }

    /// Watch one route document.
    pub fn start_route_sync(
        &self,
        route_id: &str,
        on_route_changed: RouteCallback,
    ) -> Result<Subscription, SyncError> {
        debug!("starting route sync for {route_id}");
        self.registry.open(
            WatchTarget::document(collections::ROUTES, route_id),
            Arc::new(move |snapshot| {
                if let Some(route) = decode_document::<Route>(&snapshot, collections::ROUTES) {
                    on_route_changed(route);
                }
                Ok(())
            }),
        )
    }

    /// Watch the active schedules of one route.
    pub fn start_schedule_sync(
        &self,
        route_id: &str,
        on_schedules: SchedulesCallback,
    ) -> Result<Subscription, SyncError> {
        debug!("starting schedule sync for route {route_id}");
        let query = Query::collection(collections::SCHEDULES)
            .where_eq("route_id", route_id)
            .where_eq("is_active", true);
        self.registry.open(
            WatchTarget::query(query),
            Arc::new(move |snapshot| {
                on_schedules(decode_batch::<Schedule>(&snapshot, collections::SCHEDULES));
                Ok(())
            }),
        )
    }

    /// Tear down every open watch. Safe to call on an idle orchestrator;
    /// all `start_*` methods remain usable afterwards.
    pub fn stop_all_sync(&self) {
        debug!("stopping all sync watches");
        self.registry.close_all();
    }

    fn unread_query(&self, user_id: &str, role: Role) -> Query {
        Query::collection(collections::MESSAGES)
            .where_eq("receiver_id", user_id)
            .where_eq("receiver_role", role.to_string())
            .where_eq("read", false)
            .order_by("created_at", Direction::Descending)
            .limit(self.settings.unread_query_limit)
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Decode every document in a batch snapshot, skipping the ones that fail.
fn decode_batch<T: DeserializeOwned>(snapshot: &Snapshot, collection: &str) -> Vec<T> {
    let documents = match snapshot {
        Snapshot::Batch(documents) => documents.as_slice(),
        Snapshot::Document(Some(document)) => std::slice::from_ref(document),
        Snapshot::Document(None) => &[],
    };
    documents
        .iter()
        .filter_map(|document| match document.decode::<T>() {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("skipping undecodable document {collection}/{}: {e}", document.id);
                None
            }
        })
        .collect()
}

/// Decode a single-document snapshot; `None` when the document is missing
/// or does not decode.
fn decode_document<T: DeserializeOwned>(snapshot: &Snapshot, collection: &str) -> Option<T> {
    match snapshot {
        Snapshot::Document(Some(document)) => match document.decode::<T>() {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("skipping undecodable document {collection}/{}: {e}", document.id);
                None
            }
        },
        Snapshot::Document(None) => None,
        Snapshot::Batch(_) => None,
    }
}
