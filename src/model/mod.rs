//! Canonical data model for cross-app communication.
//!
//! `message` defines the addressed/typed/prioritized unit exchanged between
//! the student, driver and supervisor clients. `entities` holds the domain
//! records those clients share through the remote store.

pub mod entities;
pub mod message;

pub use entities::{
    AttendanceRecord, Bus, BusStop, CheckinMethod, Driver, GeoPoint, Route, Schedule, Student,
    Supervisor,
};
pub use message::{Message, MessageType, Participant, Priority, Role};

#[cfg(test)]
mod tests;
