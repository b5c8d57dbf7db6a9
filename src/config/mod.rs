mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{Settings, StoreSettings, SyncSettings};

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the store and sync configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        store: StoreSettings {
            path: partial
                .store
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.store.path),
        },
        sync: SyncSettings {
            unread_query_limit: partial
                .sync
                .as_ref()
                .and_then(|s| s.unread_query_limit)
                .unwrap_or(default.sync.unread_query_limit),
            rebroadcast_location: partial
                .sync
                .as_ref()
                .and_then(|s| s.rebroadcast_location)
                .unwrap_or(default.sync.rebroadcast_location),
        },
    })
}
