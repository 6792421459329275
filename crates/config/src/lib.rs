//! # Config - store geometry and placement
//!
//! Every timestamp store is shaped by two sizes:
//!
//! ```text
//! slot  = SLOT_SIZE  records   (unit of disk paging)
//! block = BLOCK_SIZE records   (unit of coarse search)
//! ```
//!
//! A slot must hold a whole number of blocks so that block summaries can live
//! next to the slot that owns their records.
//!
//! ## Environment
//!
//! ```text
//! TSTORE_SLOT_SIZE    records per slot              (default: 1048576)
//! TSTORE_BLOCK_SIZE   records per block             (default: 1024)
//! TSTORE_MAX_SAMPLES  largest sample count stored   (default: 2147483647)
//! TSTORE_CACHE_DIR    directory for overflow files  (default: "cache")
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Default number of records held by one slot (1M).
pub const DEFAULT_SLOT_SIZE: usize = 1024 * 1024;

/// Default number of records summarized by one block (1K).
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default upper bound on the number of samples a store accepts.
pub const DEFAULT_MAX_SAMPLE_COUNT: u64 = i32::MAX as u64;

/// Default directory for overflow files, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Errors produced while loading or validating a [`StoreConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held something that is not a number.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// A size was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The slot size is not a whole number of blocks.
    #[error("slot size {slot_size} is not a multiple of block size {block_size}")]
    Misaligned { slot_size: usize, block_size: usize },
}

/// Geometry and placement of a timestamp store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Records per slot.
    pub slot_size: usize,
    /// Records per block. Must divide `slot_size`.
    pub block_size: usize,
    /// Largest sample count the store accepts; sizes the slot directory.
    pub max_sample_count: u64,
    /// Directory that receives overflow files.
    pub cache_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            max_sample_count: DEFAULT_MAX_SAMPLE_COUNT,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl StoreConfig {
    /// Builds a config with the given geometry and default placement.
    pub fn with_geometry(slot_size: usize, block_size: usize) -> Self {
        Self {
            slot_size,
            block_size,
            ..Self::default()
        }
    }

    /// Reads the `TSTORE_*` environment variables, falling back to defaults
    /// for anything unset, then validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`] but with an injectable lookup, so the
    /// parsing rules can be exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            slot_size: parse_or(&lookup, "TSTORE_SLOT_SIZE", defaults.slot_size)?,
            block_size: parse_or(&lookup, "TSTORE_BLOCK_SIZE", defaults.block_size)?,
            max_sample_count: parse_or(&lookup, "TSTORE_MAX_SAMPLES", defaults.max_sample_count)?,
            cache_dir: lookup("TSTORE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the store relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_size == 0 {
            return Err(ConfigError::Zero("slot size"));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Zero("block size"));
        }
        if self.max_sample_count == 0 {
            return Err(ConfigError::Zero("max sample count"));
        }
        if self.slot_size % self.block_size != 0 {
            return Err(ConfigError::Misaligned {
                slot_size: self.slot_size,
                block_size: self.block_size,
            });
        }
        Ok(())
    }

    /// Number of blocks summarized inside one slot.
    #[must_use]
    pub fn blocks_per_slot(&self) -> usize {
        self.slot_size / self.block_size
    }

    /// Number of slot indices the store must be able to address.
    ///
    /// Every record holds at least one sample, so the record count never
    /// exceeds the sample count. The extra slot rounds up.
    #[must_use]
    pub fn max_slot_count(&self) -> usize {
        (self.max_sample_count / self.slot_size as u64) as usize + 1
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}
