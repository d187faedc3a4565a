//! Run configuration, loaded once from the environment before anything starts

use crate::utils::errors::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_ASSET_NAME: &str = "Bitcoin";
const DEFAULT_LOG_DIR: &str = "temp/test_runs";

/// SMTP and recipient settings, present only when email reporting is enabled
#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
}

/// Immutable settings for one collection run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub api_url: String,
    pub asset_name: String,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub duration: Duration,
    pub samples_path: PathBuf,
    pub chart_path: PathBuf,
    pub email: Option<EmailConfig>,
}

impl RunConfig {
    /// Load from the process environment (call `dotenv` first)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source. Every missing required key is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            let value = get(key);
            if value.is_none() {
                missing.push(key);
            }
            value
        };

        let api_url = required("API_URL");
        let duration_minutes = required("TRACKING_DURATION");
        let samples_path = required("JSON_FILEPATH");
        let chart_path = required("GRAPH_FILEPATH");

        // A malformed toggle counts as enabled until missing keys are reported
        let email_toggle = get("EMAIL_ENABLED").map(|v| parse_bool("EMAIL_ENABLED", &v));
        let email_enabled = !matches!(email_toggle, Some(Ok(false)));

        let email_fields = if email_enabled {
            Some((
                required("SMTP_SERVER"),
                required("SENDER_EMAIL"),
                required("SENDER_PASSWORD"),
                required("RECIPIENT_EMAIL"),
            ))
        } else {
            None
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if let Some(Err(e)) = email_toggle {
            return Err(e);
        }

        let api_url = api_url.unwrap_or_default();
        reqwest::Url::parse(&api_url).map_err(|e| ConfigError::Invalid {
            key: "API_URL",
            value: api_url.clone(),
            reason: e.to_string(),
        })?;

        let duration_minutes = duration_minutes.unwrap_or_default();
        let duration_secs = parse_positive("TRACKING_DURATION", &duration_minutes)?
            .checked_mul(60)
            .ok_or_else(|| ConfigError::Invalid {
                key: "TRACKING_DURATION",
                value: duration_minutes.clone(),
                reason: "too large".to_string(),
            })?;

        let tick_interval_secs = match get("TICK_INTERVAL") {
            Some(v) => parse_positive("TICK_INTERVAL", &v)?,
            None => DEFAULT_TICK_INTERVAL_SECS,
        };

        let request_timeout_secs = match get("REQUEST_TIMEOUT") {
            Some(v) => parse_positive("REQUEST_TIMEOUT", &v)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let email = match email_fields {
            Some((smtp_server, sender_email, sender_password, recipient_email)) => {
                let smtp_port = match get("SMTP_PORT") {
                    Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                        key: "SMTP_PORT",
                        value: v.clone(),
                        reason: e.to_string(),
                    })?,
                    None => DEFAULT_SMTP_PORT,
                };
                let sender_email = sender_email.unwrap_or_default();
                let recipient_email = recipient_email.unwrap_or_default();
                validate_address("SENDER_EMAIL", &sender_email)?;
                validate_address("RECIPIENT_EMAIL", &recipient_email)?;

                Some(EmailConfig {
                    smtp_server: smtp_server.unwrap_or_default(),
                    smtp_port,
                    sender_email,
                    sender_password: sender_password.unwrap_or_default(),
                    recipient_email,
                })
            }
            None => None,
        };

        Ok(Self {
            api_url,
            asset_name: get("ASSET_NAME").unwrap_or_else(|| DEFAULT_ASSET_NAME.to_string()),
            tick_interval: Duration::from_secs(tick_interval_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            duration: Duration::from_secs(duration_secs),
            samples_path: PathBuf::from(samples_path.unwrap_or_default()),
            chart_path: PathBuf::from(chart_path.unwrap_or_default()),
            email,
        })
    }

    /// Directory for the per-run log file. Read before the rest of the
    /// configuration so startup errors land in the log too.
    pub fn log_dir_from_env() -> PathBuf {
        std::env::var("LOG_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
    }

    /// Number of ticks a run performs when every fetch returns instantly
    pub fn planned_ticks(&self) -> u64 {
        let interval = self.tick_interval.as_millis().max(1);
        self.duration.as_millis().div_ceil(interval) as u64
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn validate_address(key: &'static str, value: &str) -> Result<(), ConfigError> {
    value
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
