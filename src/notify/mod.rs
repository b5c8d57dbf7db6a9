//! Notification dispatch.
//!
//! `policy` maps a message's (kind, priority) pair to a delivery channel,
//! urgency and action set; `dispatch` renders the result through an
//! `AlertSink`, idempotently per message id.

pub mod dispatch;
pub mod policy;

pub use dispatch::{Alert, AlertSink, LogSink, NotificationDispatcher};
pub use policy::{AlertAction, AlertSpec, Channel, Urgency};
