//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Postal code lookup data sources.
    #[serde(default)]
    pub geo: GeoConfig,
    /// Email verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Outgoing mail. Absent means messages are only logged.
    #[serde(default)]
    pub email: Option<EmailSettings>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Postal code data sources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoConfig {
    /// National postal code CSV (`Plz`, `Bundesland` columns), consulted when
    /// the district table has no match.
    #[serde(default)]
    pub national_dataset_path: Option<PathBuf>,
    /// District CSV (`postal_code`, `bezirk_name`) imported at startup.
    #[serde(default)]
    pub district_csv_path: Option<PathBuf>,
    /// Import the built-in district sample at startup when no CSV is given.
    #[serde(default)]
    pub seed_sample_districts: bool,
}

/// Email verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Minutes a verification code stays valid.
    #[serde(default = "default_code_ttl_minutes")]
    pub code_ttl_minutes: i64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: default_code_ttl_minutes(),
        }
    }
}

/// Mail transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    /// SMTP relay with STARTTLS.
    Smtp,
    /// `SendGrid` HTTP API.
    Sendgrid,
    /// Log messages instead of sending them.
    Log,
}

/// Outgoing mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// Which transport to use.
    pub provider: EmailProviderKind,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Instance name used in subjects.
    #[serde(default = "default_from_name")]
    pub instance_name: String,
    /// SMTP relay host.
    #[serde(default)]
    pub smtp_host: Option<String>,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// `SendGrid` API key.
    #[serde(default)]
    pub sendgrid_api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_code_ttl_minutes() -> i64 {
    15
}

fn default_from_name() -> String {
    "kiezpoll".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `KIEZPOLL_ENV`)
    /// 4. Environment variables with `KIEZPOLL__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("KIEZPOLL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("KIEZPOLL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("KIEZPOLL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let raw = r#"
            [server]
            url = "https://polls.example"

            [database]
            url = "postgres://localhost/kiezpoll"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 100);
        assert_eq!(config.verification.code_ttl_minutes, 15);
        assert!(config.geo.national_dataset_path.is_none());
        assert!(!config.geo.seed_sample_districts);
        assert!(config.email.is_none());
    }

    #[test]
    fn test_email_provider_parses_lowercase() {
        let raw = r#"
            [server]
            url = "https://polls.example"

            [database]
            url = "postgres://localhost/kiezpoll"

            [email]
            provider = "smtp"
            from_address = "noreply@polls.example"
            smtp_host = "mail.polls.example"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.provider, EmailProviderKind::Smtp);
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.from_name, "kiezpoll");
    }
}
