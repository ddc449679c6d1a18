//! Server configuration
//!
//! Built-in defaults merged with `TIMESHEET_*` environment variables, so
//! `TIMESHEET_PORT=9000` overrides `port` and `TIMESHEET_EMAIL_ENABLED=true`
//! switches on the email step.

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "TIMESHEET_";

/// Free-text settings taken verbatim from the environment, so a value such as
/// `007` stays a string instead of being read as a number
const TEXT_FIELDS: &[&str] = &[
    "sheet_name",
    "smtp_host",
    "smtp_username",
    "smtp_password",
    "email_from_name",
    "email_from_email",
    "email_recipients",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Workbook the generated timesheets are based on
    pub template_path: PathBuf,
    /// Attendance sheet tried first on every upload
    pub sheet_name: String,
    /// Largest accepted upload in bytes
    pub max_upload_size: usize,
    pub token_expiry_secs: u64,
    pub sweep_interval_secs: u64,

    pub email_enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from_name: String,
    pub email_from_email: String,
    /// Comma separated list of addresses receiving every timesheet
    pub email_recipients: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            template_path: PathBuf::from("gorily_timesheet_template_2024.xlsx"),
            sheet_name: "docházka správců týmu".to_string(),
            max_upload_size: 16 << 20,
            token_expiry_secs: 24 * 60 * 60,
            sweep_interval_secs: 10 * 60,
            email_enabled: false,
            smtp_host: String::new(),
            smtp_port: 465,
            smtp_username: String::new(),
            smtp_password: String::new(),
            email_from_name: "Timesheet Filler".to_string(),
            email_from_email: String::new(),
            email_recipients: String::new(),
        }
    }
}

impl Config {
    /// Load and validate the configuration from defaults and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Provider chain, exposed so tests can layer extra values on top
    pub fn figment() -> Figment {
        let figment =
            Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX));

        Env::prefixed(ENV_PREFIX)
            .only(TEXT_FIELDS)
            .iter()
            .fold(figment, |figment, (key, value)| {
                figment.merge(Serialized::default(key.as_str(), value))
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_expiry_secs == 0 {
            return Err(invalid("token_expiry_secs", "must be greater than zero"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(invalid("sweep_interval_secs", "must be greater than zero"));
        }
        if self.max_upload_size == 0 {
            return Err(invalid("max_upload_size", "must be greater than zero"));
        }
        if self.sheet_name.is_empty() {
            return Err(invalid("sheet_name", "must not be empty"));
        }
        if self.host.parse::<IpAddr>().is_err() {
            return Err(invalid("host", "must be an IP address"));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| invalid("host", "must be an IP address"))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn recipients(&self) -> Vec<String> {
        self.email_recipients
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(String::from)
            .collect()
    }

    /// Whether email is switched on and has everything it needs to send
    pub fn email_configured(&self) -> bool {
        self.email_enabled
            && !self.smtp_host.is_empty()
            && !self.email_from_email.is_empty()
            && !self.recipients().is_empty()
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
