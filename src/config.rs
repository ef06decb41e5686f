use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string. Without one the service keeps records
    /// in memory.
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_port")]
    pub port: u16,
    pub jwt_secret: String,
    /// Recipient of new-investment approval requests.
    pub admin_email: String,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// HTTP mail relay endpoint. Emails are only logged when unset.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    #[serde(default = "default_queue_capacity")]
    pub notification_queue_capacity: usize,
    /// Runs the maturity sweep for all users on this interval. Sweeps only
    /// happen on user activity when unset.
    pub maturity_sweep_interval_secs: Option<u64>,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_max_connections() -> u32 {
    5
}

fn default_port() -> u16 {
    9009
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_mail_from() -> String {
    "noreply@wealtybuilders.com".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_builder(
            config::Config::builder().add_source(Environment::default().try_parsing(true)),
        )
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET must not be empty".into()));
        }

        let email = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for (key, value) in [("ADMIN_EMAIL", &self.admin_email), ("MAIL_FROM", &self.mail_from)] {
            if !email.is_match(value) {
                return Err(ConfigError::Invalid(format!(
                    "{key} is not a valid email address: {value}"
                )));
            }
        }

        if self.maturity_sweep_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "MATURITY_SWEEP_INTERVAL_SECS must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ConfigBuilder<DefaultState> {
        config::Config::builder()
            .set_override("jwt_secret", "test-secret")
            .unwrap()
            .set_override("admin_email", "admin@example.com")
            .unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let config = AppConfig::from_builder(base()).unwrap();
        assert_eq!(config.port, 9009);
        assert_eq!(config.notification_queue_capacity, 256);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.database_url.is_none());
        assert!(config.maturity_sweep_interval_secs.is_none());
    }

    #[test]
    fn test_overrides_are_read() {
        let builder = base()
            .set_override("port", 8080)
            .unwrap()
            .set_override("log_format", "pretty")
            .unwrap()
            .set_override("maturity_sweep_interval_secs", 60)
            .unwrap();
        let config = AppConfig::from_builder(builder).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.maturity_sweep_interval_secs, Some(60));
    }

    #[test]
    fn test_rejects_malformed_admin_email() {
        let builder = base().set_override("admin_email", "not-an-email").unwrap();
        assert!(matches!(
            AppConfig::from_builder(builder),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_jwt_secret_fails() {
        let builder = config::Config::builder()
            .set_override("admin_email", "admin@example.com")
            .unwrap();
        assert!(matches!(
            AppConfig::from_builder(builder),
            Err(ConfigError::Load(_))
        ));
    }
}
