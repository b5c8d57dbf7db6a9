//! Per-session context.
//!
//! One `Session` per logged-in user owns the router and orchestrator for
//! that user's lifetime; nothing here is process-global. Logging out tears
//! down every watch and leaves the session restartable.

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::model::{Participant, Role};
use crate::router::MessageRouter;
use crate::store::RemoteStore;
use crate::sync::SyncOrchestrator;

pub struct Session {
    user: Participant,
    router: Arc<MessageRouter>,
    orchestrator: SyncOrchestrator,
}

impl Session {
    /// Build the session services for `user_id` against `store`. No watches
    /// are opened yet; callers start the syncs they need.
    pub fn start(
        store: Arc<dyn RemoteStore>,
        settings: &Settings,
        user_id: impl Into<String>,
        role: Role,
    ) -> Self {
        let user = Participant::new(user_id, role);
        let router = Arc::new(MessageRouter::new(Arc::clone(&store)));
        let orchestrator =
            SyncOrchestrator::new(store, Arc::clone(&router), settings.sync.clone());
        info!("session started for {} ({})", user.id, user.role);
        Self {
            user,
            router,
            orchestrator,
        }
    }

    pub fn user(&self) -> &Participant {
        &self.user
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Stop every watch this session opened. `start_*` calls on the
    /// orchestrator work again afterwards; a fresh login can reuse the
    /// session object.
    pub fn logout(&self) {
        self.orchestrator.stop_all_sync();
        info!("session closed for {} ({})", self.user.id, self.user.role);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("user", &self.user).finish()
    }
}
