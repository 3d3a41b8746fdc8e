use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    session: SessionSettings,
    drafts: DraftSettings,
    telemetry: TelemetrySettings,
}

/// Timing knobs for a running test session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub tick_interval_ms: u64,
    pub autosave_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct DraftSettings {
    /// Directory the file-backed draft store writes into.
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let tick_interval_ms = parse_u64(
            "EXAMROOM_TICK_INTERVAL_MS",
            env_or_default("EXAMROOM_TICK_INTERVAL_MS", "1000"),
        )?;
        let autosave_interval_seconds = parse_u64(
            "EXAMROOM_AUTOSAVE_INTERVAL_SECONDS",
            env_or_default("EXAMROOM_AUTOSAVE_INTERVAL_SECONDS", "5"),
        )?;

        let draft_dir = PathBuf::from(env_or_default("EXAMROOM_DRAFT_DIR", ".examroom/drafts"));

        let log_level = env_or_default("EXAMROOM_LOG_LEVEL", "info");
        let json = env_optional("EXAMROOM_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            session: SessionSettings { tick_interval_ms, autosave_interval_seconds },
            drafts: DraftSettings { dir: draft_dir },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub fn session(&self) -> SessionSettings {
        self.session
    }

    pub fn drafts(&self) -> &DraftSettings {
        &self.drafts
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMROOM_TICK_INTERVAL_MS",
                value: "0".to_string(),
            });
        }
        if self.session.autosave_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMROOM_AUTOSAVE_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

impl SessionSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_seconds)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { tick_interval_ms: 1000, autosave_interval_seconds: 5 }
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults_match_observed_intervals() {
        let session = SessionSettings::default();
        assert_eq!(session.tick_interval(), Duration::from_millis(1000));
        assert_eq!(session.autosave_interval(), Duration::from_secs(5));
    }

    #[test]
    fn parse_u64_rejects_garbage() {
        let err = parse_u64("EXAMROOM_TICK_INTERVAL_MS", "soon".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "EXAMROOM_TICK_INTERVAL_MS", .. }));
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let settings = Settings {
            session: SessionSettings { tick_interval_ms: 0, autosave_interval_seconds: 5 },
            drafts: DraftSettings { dir: PathBuf::from("drafts") },
            telemetry: TelemetrySettings { log_level: "info".to_string(), json: false },
        };
        assert!(settings.validate().is_err());
    }
}
