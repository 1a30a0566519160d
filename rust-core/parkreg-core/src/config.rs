//! # Configuration
//!
//! TOML configuration for the registry server. Every section is optional and
//! falls back to the defaults below.
//!
//! ```toml
//! [server]
//! address = "127.0.0.1:8080"
//!
//! [capacity]
//! car = 20
//! motorcycle = 10
//!
//! [store]
//! kind = "sqlite"
//! url = "sqlite:parking.db?mode=rwc"
//! ```

use crate::error::{Error, Result};
use crate::vehicle::VehicleType;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listener settings
    pub server: ServerSection,
    /// Per-type capacity limits
    pub capacity: CapacityConfig,
    /// Record store backend
    pub store: StoreConfig,
    /// Bearer-token authentication
    pub auth: AuthSection,
    /// Alert header naming
    pub alerts: AlertsSection,
    /// CORS headers
    pub cors: CorsSection,
    /// Logging output
    pub log: LogSection,
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Address to bind to
    pub address: SocketAddr,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8080).into(),
            max_body_size: 1024 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerSection {
    /// Shutdown drain timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// `[capacity]` section
///
/// A missing entry means the type is not capacity-limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacityConfig {
    /// Maximum number of cars present at once
    #[serde(default)]
    pub car: Option<u64>,
    /// Maximum number of motorcycles present at once
    #[serde(default)]
    pub motorcycle: Option<u64>,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            car: Some(20),
            motorcycle: Some(10),
        }
    }
}

impl CapacityConfig {
    /// Configured limit for a vehicle type
    #[must_use]
    pub const fn limit(&self, vehicle_type: VehicleType) -> Option<u64> {
        match vehicle_type {
            VehicleType::Car => self.car,
            VehicleType::Motorcycle => self.motorcycle,
        }
    }

    /// Capacity with no limits at all
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            car: None,
            motorcycle: None,
        }
    }
}

/// `[store]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Volatile in-process store
    #[default]
    Memory,
    /// SQLite database through SQLx
    Sqlite {
        /// Database URL, e.g. `sqlite:parking.db?mode=rwc`
        url: String,
        /// Pool size
        #[serde(default)]
        max_connections: Option<u32>,
    },
}

/// `[auth]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    /// HS256 secret; when set, `/api` routes require a bearer token
    pub jwt_secret: Option<String>,
}

/// `[alerts]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsSection {
    /// Application name used in `X-<app>-alert` headers
    pub app_name: String,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            app_name: "parkingApp".to_string(),
        }
    }
}

/// `[cors]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsSection {
    /// Value of `Access-Control-Allow-Origin`
    pub allow_origin: String,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable single line
    Compact,
}

/// `[log]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text is not valid TOML, has unknown keys,
    /// or fails [`Config::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_size == 0 {
            return Err(Error::Config {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }
        if let StoreConfig::Sqlite { url, .. } = &self.store {
            if !url.starts_with("sqlite:") {
                return Err(Error::Config {
                    message: format!("store.url must be a sqlite: URL, got '{url}'"),
                });
            }
        }
        if matches!(&self.auth.jwt_secret, Some(secret) if secret.is_empty()) {
            return Err(Error::Config {
                message: "auth.jwt_secret must not be empty".to_string(),
            });
        }
        let name_ok = !self.alerts.app_name.is_empty()
            && self
                .alerts
                .app_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !name_ok {
            return Err(Error::Config {
                message: format!(
                    "alerts.app_name '{}' is not a valid header token",
                    self.alerts.app_name
                ),
            });
        }
        Ok(())
    }
}
