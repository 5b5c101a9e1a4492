/// Configuration management for Courtline
use crate::error::{WaitlistError, WaitlistResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offer windows last 24 hours; the sweep must run more often than that.
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 3600;

const DEFAULT_LOG_LEVEL: &str = "courtline=debug,tower_http=debug";

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub email: Option<EmailConfig>,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Bearer token the external cron caller presents to `/api/waitlist/sweep`
    pub cron_token: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Run the in-process expiry sweep at all (disable when an external cron drives it)
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub level: String,
}

impl LoggingConfig {
    /// Build the tracing filter; `RUST_LOG` takes precedence over the configured level
    pub fn env_filter(&self) -> WaitlistResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        EnvFilter::try_new(&self.level).map_err(|e| {
            WaitlistError::Validation(format!("Invalid log level '{}': {}", self.level, e))
        })
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> WaitlistResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("COURTLINE_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("COURTLINE_PORT")
            .unwrap_or_else(|_| "3080".to_string())
            .parse()
            .map_err(|_| WaitlistError::Validation("Invalid port number".to_string()))?;
        let cron_token = env::var("COURTLINE_CRON_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let data_directory: PathBuf = env::var("COURTLINE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("COURTLINE_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("courtline.sqlite"));

        let email = if let Ok(smtp_url) = env::var("COURTLINE_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("COURTLINE_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let sweep_enabled = env::var("COURTLINE_SWEEP_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let sweep_interval_secs = env::var("COURTLINE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| WaitlistError::Validation("Invalid sweep interval".to_string()))?;

        let log_level =
            env::var("COURTLINE_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                cron_token,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            email,
            jobs: JobsConfig {
                sweep_enabled,
                sweep_interval_secs,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> WaitlistResult<()> {
        if self.service.hostname.is_empty() {
            return Err(WaitlistError::Validation("Hostname cannot be empty".to_string()));
        }

        if EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(WaitlistError::Validation(format!(
                "Invalid log level '{}'",
                self.logging.level
            )));
        }

        if self.jobs.sweep_interval_secs == 0 {
            return Err(WaitlistError::Validation(
                "Sweep interval must be positive".to_string(),
            ));
        }

        if self.jobs.sweep_interval_secs >= MAX_SWEEP_INTERVAL_SECS {
            return Err(WaitlistError::Validation(
                "Sweep interval must be shorter than the 24 hour offer window".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for tests and local tooling
    pub fn for_database(database: PathBuf) -> Self {
        let data_directory = database
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3080,
                cron_token: None,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            email: None,
            jobs: JobsConfig {
                sweep_enabled: false,
                sweep_interval_secs: 3600,
            },
            logging: LoggingConfig {
                level: DEFAULT_LOG_LEVEL.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::for_database(PathBuf::from("./data/test.sqlite"));
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.data_directory, PathBuf::from("./data"));
    }

    #[test]
    fn test_sweep_interval_must_beat_offer_window() {
        let mut config = ServerConfig::for_database(PathBuf::from("test.sqlite"));
        config.jobs.sweep_interval_secs = 24 * 3600;
        assert!(config.validate().is_err());

        config.jobs.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_must_parse() {
        let mut config = ServerConfig::for_database(PathBuf::from("test.sqlite"));
        config.logging.level = "courtline=chatty".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "courtline=info,sqlx=warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_hostname_rejected() {
        let mut config = ServerConfig::for_database(PathBuf::from("test.sqlite"));
        config.service.hostname = String::new();
        assert!(config.validate().is_err());
    }
}
