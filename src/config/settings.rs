use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the backing store, the queue and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub store: StoreSettings,
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
}

/// Where the sled database lives.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreSettings {
    pub path: String,
}

/// Queue name and lease/expiry policy, in (fractional) seconds.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct QueueSettings {
    pub name: String,
    pub visibility_secs: f64,
    pub expiry_secs: Option<f64>,
    pub sweep_interval_secs: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub store: Option<PartialStoreSettings>,
    pub queue: Option<PartialQueueSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStoreSettings {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialQueueSettings {
    pub name: Option<String>,
    pub visibility_secs: Option<f64>,
    pub expiry_secs: Option<f64>,
    pub sweep_interval_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Thirty second leases, no expiry, a one minute sweep period.
impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                path: "docqueue_db".to_string(),
            },
            queue: QueueSettings {
                name: "default".to_string(),
                visibility_secs: 30.0,
                expiry_secs: None,
                sweep_interval_secs: 60.0,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
