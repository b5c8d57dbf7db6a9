//! CLI for BusLink
//!
//! Subcommands:
//! - `demo`: seed a local store and run the student/supervisor message flows
//!   end to end (useful for smoke tests)
//! - `watch`: follow incoming messages for one user until interrupted

use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use buslink::config::load_config;
use buslink::model::{Bus, CheckinMethod, Driver, GeoPoint, Role, Route, Student, Supervisor};
use buslink::notify::{LogSink, NotificationDispatcher};
use buslink::session::Session;
use buslink::store::{LocalStore, RemoteStore, collections, encode};
use buslink::sync::MessagesCallback;

#[derive(Parser)]
#[command(name = "buslink")]
enum Command {
    /// Seed a local store and run the cross-app message flows end to end
    Demo {
        /// Store path override (default: the configured store.path)
        #[arg(long)]
        store_path: Option<String>,
    },
    /// Follow incoming messages for one user until Ctrl-C
    Watch {
        /// User id to watch messages for
        #[arg(long)]
        user_id: String,
        /// Role of the user: student, driver or supervisor
        #[arg(long, default_value = "student")]
        role: String,
        /// Store path override (default: the configured store.path)
        #[arg(long)]
        store_path: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    buslink::utils::logging::init("info");
    dotenvy::dotenv().ok();

    let cmd = Command::parse();

    let result = match cmd {
        Command::Demo { store_path } => run_demo(store_path).await,
        Command::Watch {
            user_id,
            role,
            store_path,
        } => run_watch(&user_id, &role, store_path).await,
    };
    if let Err(e) = result {
        error!("command failed: {e}");
        std::process::exit(1);
    }
}

fn open_store(
    store_path: Option<String>,
    config: &buslink::config::Settings,
) -> Result<Arc<LocalStore>, Box<dyn std::error::Error>> {
    let path = store_path.unwrap_or_else(|| config.store.path.clone());
    Ok(Arc::new(LocalStore::open(&path)?))
}

async fn run_demo(store_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(store_path, &config)?;
    seed_fleet(store.as_ref()).await?;

    // Student session: owns the outbound flows and the bus watch.
    let student = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &config,
        "S1",
        Role::Student,
    );

    // Supervisor session: shows what the counterpart app receives.
    let supervisor = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &config,
        "SV1",
        Role::Supervisor,
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(LogSink));

    let batch_dispatcher = Arc::clone(&dispatcher);
    let on_messages: MessagesCallback = Arc::new(move |messages| {
        batch_dispatcher.dispatch_batch(&messages, "supervisor-inbox");
    });
    supervisor
        .orchestrator()
        .start_message_sync("SV1", Role::Supervisor, on_messages)?;

    let emergency_dispatcher = Arc::clone(&dispatcher);
    let on_emergency: MessagesCallback = Arc::new(move |messages| {
        for message in &messages {
            emergency_dispatcher.dispatch(message);
        }
    });
    supervisor
        .orchestrator()
        .start_emergency_sync("SV1", Role::Supervisor, on_emergency)?;

    // Student-side flows: check-in, then the emergency path.
    let report = student
        .router()
        .send_check_in_notification("S1", "B1", "STOP-3", CheckinMethod::Qr)
        .await?;
    info!(
        "check-in fan-out: {}/{} legs delivered",
        report.delivered(),
        report.attempted()
    );
    student
        .router()
        .record_attendance("S1", "B1", "STOP-3", CheckinMethod::Qr, chrono::Utc::now().timestamp_millis())
        .await?;

    let report = student
        .router()
        .send_location_update("S1", "B1", 37.7749, -122.4194, 18.5, "N")
        .await?;
    info!(
        "location fan-out: {}/{} legs delivered",
        report.delivered(),
        report.attempted()
    );

    let report = student
        .router()
        .send_emergency_alert("S1", "B1", "medical", "Student needs assistance")
        .await?;
    info!(
        "emergency fan-out: {}/{} legs delivered",
        report.delivered(),
        report.attempted()
    );

    // Let the watch tasks drain before tearing down.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    info!("alerts rendered: {}", dispatcher.rendered_count());

    supervisor.logout();
    student.logout();
    Ok(())
}

async fn run_watch(
    user_id: &str,
    role: &str,
    store_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(store_path, &config)?;
    let role = Role::from_str(role)?;

    let session = Session::start(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        &config,
        user_id,
        role,
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(LogSink));

    let batch_dispatcher = Arc::clone(&dispatcher);
    let on_messages: MessagesCallback = Arc::new(move |messages| {
        batch_dispatcher.dispatch_batch(&messages, "inbox");
    });
    session
        .orchestrator()
        .start_message_sync(user_id, role, on_messages)?;

    let emergency_dispatcher = Arc::clone(&dispatcher);
    let on_emergency: MessagesCallback = Arc::new(move |messages| {
        for message in &messages {
            emergency_dispatcher.dispatch(message);
        }
    });
    session
        .orchestrator()
        .start_emergency_sync(user_id, role, on_emergency)?;

    info!("watching messages for {user_id} ({role}), Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting gracefully");
    session.logout();
    Ok(())
}

/// Seed the demo fleet: student S1 on bus B1, driven by D1 on route R1,
/// overseen by supervisors SV1 and SV2.
async fn seed_fleet(store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
    let student = Student {
        student_id: "S1".into(),
        name: "Jordan Pine".into(),
        grade: "7".into(),
        assigned_bus_id: Some("B1".into()),
        parent_phone: "555-0100".into(),
        emergency_contact: "555-0199".into(),
        is_active: true,
    };
    store
        .set(collections::STUDENTS, "S1", encode(&student)?)
        .await?;

    let bus = Bus {
        bus_id: "B1".into(),
        bus_number: "42".into(),
        driver_id: Some("D1".into()),
        route_id: Some("R1".into()),
        current_location: Some(GeoPoint {
            latitude: 37.7749,
            longitude: -122.4194,
        }),
        speed: 18.5,
        heading: Some("N".into()),
        is_moving: true,
        is_on_route: true,
        status: "in_service".into(),
        last_updated: Some(chrono::Utc::now().timestamp_millis()),
        capacity: 40,
        current_passengers: 17,
    };
    store.set(collections::BUSES, "B1", encode(&bus)?).await?;

    let driver = Driver {
        driver_id: "D1".into(),
        name: "Avery Cole".into(),
        phone: "555-0142".into(),
        assigned_bus_id: Some("B1".into()),
        route_id: Some("R1".into()),
        is_active: true,
        is_on_duty: true,
    };
    store
        .set(collections::DRIVERS, "D1", encode(&driver)?)
        .await?;

    let route = Route {
        route_id: "R1".into(),
        route_name: "Hillcrest Loop".into(),
        description: "Morning loop through Hillcrest".into(),
        stops: Vec::new(),
        is_active: true,
    };
    store.set(collections::ROUTES, "R1", encode(&route)?).await?;

    for (id, name, routes, active) in [
        ("SV1", "Sam Reyes", vec!["R1".to_string()], true),
        ("SV2", "Noor Haddad", vec!["R1".to_string()], true),
    ] {
        let supervisor = Supervisor {
            supervisor_id: id.into(),
            name: name.into(),
            department: "Transport".into(),
            assigned_routes: routes,
            is_active: active,
        };
        store
            .set(collections::SUPERVISORS, id, encode(&supervisor)?)
            .await?;
    }

    info!("demo fleet seeded");
    Ok(())
}
