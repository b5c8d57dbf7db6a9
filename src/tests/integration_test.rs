//! End-to-end flow over a seeded local store: a student session checks in
//! and raises an emergency, a supervisor session watches its inbox and
//! renders alerts through the dispatch policy.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use crate::config::Settings;
use crate::model::{CheckinMethod, Message, MessageType, Priority, Role};
use crate::notify::{Alert, AlertSink, Channel, NotificationDispatcher, Urgency};
use crate::session::Session;
use crate::store::{DocumentData, LocalStore, RemoteStore, collections};

#[derive(Default)]
struct CapturingSink {
    alerts: Mutex<Vec<Alert>>,
}

impl CapturingSink {
    fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AlertSink for CapturingSink {
    fn render(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }

    fn retract(&self, _key: &str) {}
}

fn doc(fields: serde_json::Value) -> DocumentData {
    match fields {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

async fn seed_fleet(store: &LocalStore) {
    store
        .set(
            collections::BUSES,
            "B1",
            doc(json!({ "bus_id": "B1", "driver_id": "D1", "route_id": "R1" })),
        )
        .await
        .unwrap();
    for id in ["SV1", "SV2"] {
        store
            .set(
                collections::SUPERVISORS,
                id,
                doc(json!({
                    "supervisor_id": id,
                    "assigned_routes": ["R1"],
                    "is_active": true,
                })),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_check_in_to_alert_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::open(dir.path().to_str().unwrap()).unwrap());
    seed_fleet(&store).await;
    let settings = Settings::default();

    let student = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &settings,
        "S1",
        Role::Student,
    );
    let supervisor = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &settings,
        "SV1",
        Role::Supervisor,
    );

    let sink = Arc::new(CapturingSink::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&sink)));

    // Supervisor inbox: render every emission, forward it for assertions
    let (tx, mut rx) = mpsc::unbounded_channel();
    let inbox_dispatcher = Arc::clone(&dispatcher);
    supervisor
        .orchestrator()
        .start_message_sync(
            "SV1",
            Role::Supervisor,
            Arc::new(move |messages: Vec<Message>| {
                inbox_dispatcher.dispatch_batch(&messages, "inbox");
                let _ = tx.send(messages);
            }),
        )
        .unwrap();
    let initial = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(initial.is_empty());

    // Student checks in; the supervisor sees exactly one high-priority
    // checkin message
    let report = student
        .router()
        .send_check_in_notification("S1", "B1", "STOP-3", CheckinMethod::Qr)
        .await
        .unwrap();
    assert_eq!(report.attempted(), 3); // D1, SV1, SV2

    let unread = loop {
        let emission = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        // Emissions for SV1 only; skip any interleaved empty set
        if !emission.is_empty() {
            break emission;
        }
    };
    assert_eq!(unread.len(), 1);
    let checkin = &unread[0];
    assert_eq!(checkin.kind(), MessageType::Checkin);
    assert_eq!(checkin.priority(), Priority::High);
    assert_eq!(checkin.receiver().id, "SV1");

    // The rendered alert followed the policy table
    let alert = sink
        .alerts()
        .into_iter()
        .find(|a| a.message_id.as_deref() == Some(checkin.id()))
        .unwrap();
    assert_eq!(alert.spec.channel, Channel::General);
    assert_eq!(alert.spec.urgency, Urgency::High);

    // Reading it empties the unread set again; drain any emissions queued
    // by the earlier fan-out writes until the empty set shows up
    supervisor.router().mark_read(checkin.id()).await.unwrap();
    loop {
        let emission = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("unread set never emptied after mark_read")
            .unwrap();
        if emission.is_empty() {
            break;
        }
    }

    supervisor.logout();
    student.logout();
    assert!(supervisor.orchestrator().registry().is_empty());
}

#[tokio::test]
async fn test_emergency_escalates_to_emergency_alert() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::open(dir.path().to_str().unwrap()).unwrap());
    seed_fleet(&store).await;
    let settings = Settings::default();

    let student = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &settings,
        "S1",
        Role::Student,
    );
    let supervisor = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &settings,
        "SV1",
        Role::Supervisor,
    );

    let sink = Arc::new(CapturingSink::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&sink)));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let emergency_dispatcher = Arc::clone(&dispatcher);
    supervisor
        .orchestrator()
        .start_emergency_sync(
            "SV1",
            Role::Supervisor,
            Arc::new(move |messages: Vec<Message>| {
                for message in &messages {
                    emergency_dispatcher.dispatch(message);
                }
                let _ = tx.send(messages);
            }),
        )
        .unwrap();

    student
        .router()
        .send_emergency_alert("S1", "B1", "medical", "Student needs assistance")
        .await
        .unwrap();

    let emergencies = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(emergencies.len(), 1);
    let alert = sink
        .alerts()
        .into_iter()
        .find(|a| a.message_id.as_deref() == Some(emergencies[0].id()))
        .unwrap();
    assert_eq!(alert.spec.channel, Channel::Emergency);
    assert_eq!(alert.spec.urgency, Urgency::Max);
    assert!(alert.spec.full_screen);

    supervisor.logout();
    student.logout();
}
