//! Configuration loading and representation.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Leading segment of generated batch numbers.
    pub batch_prefix: String,
    /// How many product-reference characters go into a batch number.
    pub batch_ref_chars: usize,
    /// Batch number allocations tried before giving up with `DuplicateBatchNumber`.
    pub batch_number_attempts: u32,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_prefix: "LOT".to_string(),
            batch_ref_chars: 4,
            batch_number_attempts: 16,
            default_page_size: 20,
            max_page_size: 200,
        }
    }
}

impl EngineConfig {
    pub const BATCH_PREFIX: &'static str = "STOCKFIFO_BATCH_PREFIX";
    pub const BATCH_REF_CHARS: &'static str = "STOCKFIFO_BATCH_REF_CHARS";
    pub const BATCH_NUMBER_ATTEMPTS: &'static str = "STOCKFIFO_BATCH_NUMBER_ATTEMPTS";
    pub const DEFAULT_PAGE_SIZE: &'static str = "STOCKFIFO_DEFAULT_PAGE_SIZE";
    pub const MAX_PAGE_SIZE: &'static str = "STOCKFIFO_MAX_PAGE_SIZE";

    /// Load from process environment, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let batch_prefix = match lookup(Self::BATCH_PREFIX) {
            Some(v) if v.trim().is_empty() || v.contains(char::is_whitespace) => {
                return Err(ConfigError::Invalid {
                    key: Self::BATCH_PREFIX,
                    value: v,
                    reason: "must be a non-empty token without whitespace".to_string(),
                });
            }
            Some(v) => v,
            None => defaults.batch_prefix,
        };

        let config = Self {
            batch_prefix,
            batch_ref_chars: parse_positive(&lookup, Self::BATCH_REF_CHARS, defaults.batch_ref_chars)?,
            batch_number_attempts: parse_positive(
                &lookup,
                Self::BATCH_NUMBER_ATTEMPTS,
                defaults.batch_number_attempts,
            )?,
            default_page_size: parse_positive(&lookup, Self::DEFAULT_PAGE_SIZE, defaults.default_page_size)?,
            max_page_size: parse_positive(&lookup, Self::MAX_PAGE_SIZE, defaults.max_page_size)?,
        };

        if config.default_page_size > config.max_page_size {
            return Err(ConfigError::Invalid {
                key: Self::DEFAULT_PAGE_SIZE,
                value: config.default_page_size.to_string(),
                reason: format!("exceeds {} ({})", Self::MAX_PAGE_SIZE, config.max_page_size),
            });
        }

        Ok(config)
    }
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: core::str::FromStr + PartialOrd + Default,
    T::Err: core::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
