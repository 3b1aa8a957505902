mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LoggingSettings, QueueSettings, Settings, StoreSettings};

/// Environment variables are read as `DOCQUEUE_<SECTION>__<KEY>`,
/// e.g. `DOCQUEUE_QUEUE__VISIBILITY_SECS=10`.
const ENV_PREFIX: &str = "DOCQUEUE";

/// Loads the configuration from `config/default` and environment variables,
/// merged over default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Loads the configuration from the file at `path` (any format the `config`
/// crate recognizes, extension optional) and environment variables.
/// A `.env` file in the working directory is honored. Missing values fall
/// back to `Settings::default()`.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

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
        queue: QueueSettings {
            name: partial
                .queue
                .as_ref()
                .and_then(|q| q.name.clone())
                .unwrap_or(default.queue.name),
            visibility_secs: partial
                .queue
                .as_ref()
                .and_then(|q| q.visibility_secs)
                .unwrap_or(default.queue.visibility_secs),
            expiry_secs: partial
                .queue
                .as_ref()
                .and_then(|q| q.expiry_secs)
                .or(default.queue.expiry_secs),
            sweep_interval_secs: partial
                .queue
                .as_ref()
                .and_then(|q| q.sweep_interval_secs)
                .unwrap_or(default.queue.sweep_interval_secs),
        },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}

#[cfg(test)]
mod tests;
