use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Directory name used under the platform config directory.
pub const APP_DIR_NAME: &str = "gcal-automate";

/// Environment variable overriding `calendar.calendar_id`.
pub const CALENDAR_ID_ENV: &str = "GCAL_CALENDAR_ID";

/// Environment variable overriding `calendar.time_zone`.
pub const TIME_ZONE_ENV: &str = "GCAL_TIME_ZONE";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which calendar to operate on and how to interpret local dates
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// OAuth client secrets and token cache locations
    #[serde(default)]
    pub auth: AuthConfig,

    /// Input and output text files
    #[serde(default)]
    pub files: FilesConfig,

    /// HTTP retry behaviour for Calendar API calls
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Calendar ID (`primary` is the authenticated user's main calendar)
    pub calendar_id: String,

    /// IANA time zone used for day boundaries and date-only bounds
    pub time_zone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            time_zone: "America/Chicago".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Google OAuth client secrets (`credentials.json` from the Cloud console)
    pub credentials_path: PathBuf,

    /// Cached access/refresh token
    pub token_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let dir = default_app_dir();
        Self {
            credentials_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Lines of `<start> - <end> - <summary>` to delete
    pub delete_events_path: PathBuf,

    /// Where the daily schedule export is written
    pub schedule_output_path: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            delete_events_path: PathBuf::from("delete_events.txt"),
            schedule_output_path: PathBuf::from("daily_schedule.txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Maximum number of retry attempts (0 disables retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// Maximum delay between retries
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    100
}

fn default_max_retry_delay_ms() -> u64 {
    5000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

fn default_app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration (explicit path or default), apply environment
    /// overrides and then the explicit `calendar_id`/`time_zone` overrides,
    /// and validate the result.
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(
        path: Option<&Path>,
        calendar_id: Option<String>,
        time_zone: Option<String>,
    ) -> Result<(Self, ValidationResult)> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        config.apply_overrides(calendar_id, time_zone);

        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Apply `GCAL_CALENDAR_ID` / `GCAL_TIME_ZONE` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(CALENDAR_ID_ENV).ok(),
            std::env::var(TIME_ZONE_ENV).ok(),
        );
    }

    /// Replace calendar settings with explicit values (env or CLI flags)
    pub fn apply_overrides(&mut self, calendar_id: Option<String>, time_zone: Option<String>) {
        if let Some(id) = calendar_id.filter(|s| !s.trim().is_empty()) {
            self.calendar.calendar_id = id;
        }
        if let Some(tz) = time_zone.filter(|s| !s.trim().is_empty()) {
            self.calendar.time_zone = tz;
        }
    }

    /// Parsed configured time zone
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.calendar.time_zone.parse::<Tz>().map_err(|_| {
            ConfigError::Invalid(format!("unknown time zone '{}'", self.calendar.time_zone))
        })
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.calendar.calendar_id.trim().is_empty() {
            result.add_error("calendar.calendar_id", "Calendar ID must not be empty");
        }

        if self.time_zone().is_err() {
            result.add_error(
                "calendar.time_zone",
                format!("Unknown IANA time zone: {}", self.calendar.time_zone),
            );
        }

        if !self.auth.credentials_path.exists() && !self.auth.token_path.exists() {
            result.add_warning(
                "auth.credentials_path",
                format!(
                    "Client secrets not found at {} - authentication will fail",
                    self.auth.credentials_path.display()
                ),
            );
        }

        if self.api.max_retries > 0 && self.api.initial_retry_delay_ms == 0 {
            result.add_error(
                "api.initial_retry_delay_ms",
                "Retry delay must be greater than 0 when retries are enabled",
            );
        }

        if self.api.max_retries > 10 {
            result.add_warning("api.max_retries", "Retry count is unusually large (>10)");
        }

        if self.api.max_retry_delay_ms < self.api.initial_retry_delay_ms {
            result.add_warning(
                "api.max_retry_delay_ms",
                "Maximum retry delay is below the initial delay; every retry will use the maximum",
            );
        }

        result
    }

    /// Save configuration to the given file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir.join("config.toml"))
    }
}
