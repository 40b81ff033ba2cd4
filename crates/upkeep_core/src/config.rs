//! Scheduler configuration.
//!
//! # Responsibility
//! - Hold defaults the scheduler applies when callers omit input.
//! - Load and validate JSON configuration files.
//!
//! # Invariants
//! - `default_lookahead_months >= 1`.
//! - `max_lookahead_months >= default_lookahead_months`.

use crate::logging::{default_log_level, normalize_level};
use crate::schedule::projector::LookaheadMonths;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_LOOKAHEAD_MONTHS: u32 = 1;
const DEFAULT_MAX_LOOKAHEAD_MONTHS: u32 = 120;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Applied when a caller omits lookahead or passes an invalid one.
    pub default_lookahead_months: u32,
    /// Upper bound applied to caller-provided lookahead.
    pub max_lookahead_months: u32,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_lookahead_months: DEFAULT_LOOKAHEAD_MONTHS,
            max_lookahead_months: DEFAULT_MAX_LOOKAHEAD_MONTHS,
            log_level: default_log_level().to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Reads and validates a JSON config file. Missing keys use defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_lookahead_months == 0 {
            return Err(ConfigError::Invalid(
                "default_lookahead_months must be at least 1".to_string(),
            ));
        }
        if self.max_lookahead_months < self.default_lookahead_months {
            return Err(ConfigError::Invalid(format!(
                "max_lookahead_months {} is below default_lookahead_months {}",
                self.max_lookahead_months, self.default_lookahead_months
            )));
        }
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(())
    }

    pub fn default_lookahead(&self) -> LookaheadMonths {
        LookaheadMonths::new(self.default_lookahead_months).unwrap_or(LookaheadMonths::ONE)
    }

    /// Caps `lookahead` at `max_lookahead_months`.
    pub fn clamp_lookahead(&self, lookahead: LookaheadMonths) -> LookaheadMonths {
        match LookaheadMonths::new(self.max_lookahead_months) {
            Some(max) if lookahead > max => max,
            _ => lookahead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SchedulerConfig};
    use crate::schedule::projector::LookaheadMonths;

    #[test]
    fn missing_keys_use_defaults() {
        let config = SchedulerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.default_lookahead(), LookaheadMonths::ONE);
    }

    #[test]
    fn zero_default_lookahead_is_rejected() {
        let err = SchedulerConfig::from_json_str(r#"{"default_lookahead_months": 0}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_and_levels_are_rejected() {
        assert!(matches!(
            SchedulerConfig::from_json_str(r#"{"lookahead": 3}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SchedulerConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn lookahead_is_clamped_to_max() {
        let config = SchedulerConfig {
            max_lookahead_months: 24,
            ..SchedulerConfig::default()
        };
        let huge = LookaheadMonths::new(500).unwrap();
        assert_eq!(config.clamp_lookahead(huge).get(), 24);
        let small = LookaheadMonths::new(3).unwrap();
        assert_eq!(config.clamp_lookahead(small), small);
    }
}
