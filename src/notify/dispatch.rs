//! Alert rendering.
//!
//! `NotificationDispatcher` turns inbound messages into rendered alerts
//! through an `AlertSink`. Dispatch is idempotent per message id: a
//! re-dispatched message replaces its rendered alert instead of stacking a
//! duplicate. Batches of non-emergency messages additionally render one
//! summary alert under its own key; individual alerts keep their identity.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::model::Message;

use super::policy::{AlertSpec, Channel, Urgency};

/// One rendered alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Stable identity: the message id, or `summary:<group>` for summaries.
    pub key: String,
    pub spec: AlertSpec,
    pub title: String,
    pub body: String,
    /// Absent on summary alerts.
    pub message_id: Option<String>,
}

/// Where rendered alerts go. The surrounding app plugs the platform
/// notifier in here; `LogSink` is the built-in stand-in.
pub trait AlertSink: Send + Sync {
    fn render(&self, alert: &Alert);
    /// Remove a previously rendered alert, if it is still showing.
    fn retract(&self, key: &str);
}

impl<S: AlertSink> AlertSink for std::sync::Arc<S> {
    fn render(&self, alert: &Alert) {
        (**self).render(alert);
    }

    fn retract(&self, key: &str) {
        (**self).retract(key);
    }
}

/// Sink that logs alerts instead of rendering them.
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn render(&self, alert: &Alert) {
        info!(
            "[{:?}/{:?}] {}: {}",
            alert.spec.channel, alert.spec.urgency, alert.title, alert.body,
        );
    }

    fn retract(&self, key: &str) {
        debug!("alert {key} retracted");
    }
}

pub struct NotificationDispatcher<S: AlertSink> {
    sink: S,
    rendered: Mutex<HashMap<String, Alert>>,
}

impl<S: AlertSink> NotificationDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            rendered: Mutex::new(HashMap::new()),
        }
    }

    /// Render one message. Re-dispatching the same message id replaces the
    /// prior alert.
    pub fn dispatch(&self, message: &Message) {
        let alert = Alert {
            key: message.id().to_string(),
            spec: AlertSpec::for_message(message),
            title: message.title().to_string(),
            body: message.body().to_string(),
            message_id: Some(message.id().to_string()),
        };
        self.render(alert);
    }

    /// Render a batch that arrived together. More than one non-emergency
    /// message also renders a summary alert keyed independently of the
    /// individual alerts; emergencies are never folded into the summary.
    pub fn dispatch_batch(&self, messages: &[Message], group: &str) {
        let plain = messages
            .iter()
            .filter(|m| !AlertSpec::for_message(m).is_emergency())
            .count();
        if plain > 1 {
            self.render(Alert {
                key: format!("summary:{group}"),
                spec: AlertSpec {
                    channel: Channel::General,
                    urgency: Urgency::Default,
                    full_screen: false,
                    ongoing: false,
                    silent: false,
                    actions: Vec::new(),
                },
                title: format!("New messages ({plain})"),
                body: format!("You have {plain} new messages"),
                message_id: None,
            });
        }
        for message in messages {
            self.dispatch(message);
        }
    }

    /// Take a rendered alert down.
    pub fn dismiss(&self, key: &str) {
        if self.rendered.lock().unwrap().remove(key).is_some() {
            self.sink.retract(key);
        }
    }

    pub fn dismiss_all(&self) {
        let keys: Vec<String> = self.rendered.lock().unwrap().drain().map(|(k, _)| k).collect();
        for key in keys {
            self.sink.retract(&key);
        }
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }

    /// The alert currently rendered under `key`, if any.
    pub fn rendered(&self, key: &str) -> Option<Alert> {
        self.rendered.lock().unwrap().get(key).cloned()
    }

    fn render(&self, alert: Alert) {
        let replaced = self
            .rendered
            .lock()
            .unwrap()
            .insert(alert.key.clone(), alert.clone());
        if replaced.is_some() {
            self.sink.retract(&alert.key);
            debug!("alert {} replaced", alert.key);
        }
        self.sink.render(&alert);
    }
}

impl<S: AlertSink> std::fmt::Debug for NotificationDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("rendered", &self.rendered_count())
            .finish()
    }
}
