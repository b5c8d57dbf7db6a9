//! Dispatch policy.
//!
//! State-free and deterministic: the same (kind, priority) pair always maps
//! to the same channel, urgency and actions. `priority=urgent` escalates to
//! the emergency channel no matter the kind.

use crate::model::{Message, MessageType, Priority};

/// Local delivery channel for a rendered alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Emergency,
    General,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Low,
    Default,
    High,
    Max,
}

/// Action offered on a rendered alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    CallEmergencyContact,
    ViewLocation,
    MarkRead,
    OpenDetails,
}

/// How one message should be presented locally.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSpec {
    pub channel: Channel,
    pub urgency: Urgency,
    /// Take over the screen and keep the alert up until dismissed.
    pub full_screen: bool,
    pub ongoing: bool,
    /// No tone, no vibration.
    pub silent: bool,
    pub actions: Vec<AlertAction>,
}

impl AlertSpec {
    pub fn for_message(message: &Message) -> Self {
        let mut spec = match message.kind() {
            MessageType::Emergency => Self {
                channel: Channel::Emergency,
                urgency: Urgency::Max,
                full_screen: true,
                ongoing: true,
                silent: false,
                actions: vec![AlertAction::CallEmergencyContact, AlertAction::ViewLocation],
            },
            MessageType::LocationUpdate => Self {
                channel: Channel::Location,
                urgency: Urgency::Low,
                full_screen: false,
                ongoing: false,
                silent: true,
                actions: Vec::new(),
            },
            MessageType::Checkin => Self {
                channel: Channel::General,
                urgency: if message.priority() == Priority::High {
                    Urgency::High
                } else {
                    Urgency::Default
                },
                full_screen: false,
                ongoing: false,
                silent: false,
                actions: vec![AlertAction::MarkRead],
            },
            MessageType::Notification | MessageType::StatusUpdate | MessageType::Attendance => {
                Self {
                    channel: Channel::General,
                    urgency: mirror_priority(message.priority()),
                    full_screen: false,
                    ongoing: false,
                    silent: false,
                    actions: vec![AlertAction::OpenDetails],
                }
            }
        };

        // Urgent always escalates, whatever the kind says.
        if message.priority() == Priority::Urgent {
            spec.channel = Channel::Emergency;
            spec.urgency = Urgency::Max;
        }
        spec
    }

    pub fn is_emergency(&self) -> bool {
        self.channel == Channel::Emergency
    }
}

fn mirror_priority(priority: Priority) -> Urgency {
    match priority {
        Priority::Low => Urgency::Low,
        Priority::Medium => Urgency::Default,
        Priority::High => Urgency::High,
        Priority::Urgent => Urgency::Max,
    }
}
