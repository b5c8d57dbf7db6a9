//! Domain records shared between the three client apps through the remote
//! store. These decode leniently: optional fields default so a partially
//! populated document still yields a usable entity, and a document that
//! fails to decode is skipped by the sync layer rather than failing its
//! whole batch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::SyncError;

/// How a student checked in at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinMethod {
    Gps,
    Qr,
    Manual,
}

impl fmt::Display for CheckinMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckinMethod::Gps => "gps",
            CheckinMethod::Qr => "qr",
            CheckinMethod::Manual => "manual",
        };
        f.write_str(s)
    }
}

impl FromStr for CheckinMethod {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gps" => Ok(CheckinMethod::Gps),
            "qr" => Ok(CheckinMethod::Qr),
            "manual" => Ok(CheckinMethod::Manual),
            other => Err(SyncError::InvalidValue {
                field: "checkin_method",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub assigned_bus_id: Option<String>,
    #[serde(default)]
    pub parent_phone: String,
    #[serde(default)]
    pub emergency_contact: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub bus_id: String,
    #[serde(default)]
    pub bus_number: String,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub current_location: Option<GeoPoint>,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub is_moving: bool,
    #[serde(default)]
    pub is_on_route: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub current_passengers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub assigned_bus_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_on_duty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supervisor {
    pub supervisor_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub assigned_routes: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusStop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub route_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stops: Vec<BusStop>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub stop_id: String,
    #[serde(default)]
    pub day_of_week: String,
    #[serde(default)]
    pub pickup_time: Option<i64>,
    #[serde(default)]
    pub dropoff_time: Option<i64>,
    #[serde(default)]
    pub is_active: bool,
}

/// One check-in event, mirrored into the `attendance` collection for the
/// supervisor app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub bus_id: String,
    pub stop_id: String,
    pub method: CheckinMethod,
    pub timestamp: i64,
    pub synced_at: i64,
}
