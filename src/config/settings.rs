use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the local store binding and the sync core.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub sync: SyncSettings,
}

/// Configuration settings for the local store binding.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub path: String,
}

/// Configuration settings for the sync core.
///
/// `unread_query_limit` caps the unread-message watch result set;
/// `rebroadcast_location` gates the outward re-broadcast of observed bus
/// locations.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    pub unread_query_limit: usize,
    pub rebroadcast_location: bool,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub store: Option<PartialStoreSettings>,
    pub sync: Option<PartialSyncSettings>,
}

/// Partial store settings.
#[derive(Debug, Deserialize)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
}

/// Partial sync settings.
#[derive(Debug, Deserialize)]
pub struct PartialSyncSettings {
    pub unread_query_limit: Option<usize>,
    pub rebroadcast_location: Option<bool>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                path: "buslink_db".to_string(),
            },
            sync: SyncSettings {
                unread_query_limit: 50,
                rebroadcast_location: true,
            },
        }
    }
}
