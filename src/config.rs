//! Server configuration
//!
//! Built from defaults, the first command-line argument (listen address)
//! and the `RELAY_DUPLICATE_NAMES` environment variable.

use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:1234";

/// Default per-connection outbound queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default maximum inbound line length in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Environment variable selecting the duplicate-name policy
pub const DUPLICATE_NAMES_ENV: &str = "RELAY_DUPLICATE_NAMES";

/// What to do when a peer registers a name that is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateNames {
    /// Register as `name (2)`, `name (3)`, ...
    #[default]
    Suffix,
    /// Replace the existing entry; the displaced connection is orphaned
    Overwrite,
}

impl FromStr for DuplicateNames {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suffix" => Ok(DuplicateNames::Suffix),
            "overwrite" => Ok(DuplicateNames::Overwrite),
            other => Err(AppError::InvalidConfig(format!(
                "{DUPLICATE_NAMES_ENV} must be 'suffix' or 'overwrite', got '{other}'"
            ))),
        }
    }
}

/// Relay server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub listen_addr: String,
    /// Outbound queue capacity per connection
    pub queue_capacity: usize,
    /// Longest accepted inbound line, in bytes
    pub max_line_length: usize,
    /// Duplicate-name policy
    pub duplicate_names: DuplicateNames,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_ADDR.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            duplicate_names: DuplicateNames::default(),
        }
    }
}

impl ServerConfig {
    /// Load from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(addr) = env::args().nth(1) {
            config.listen_addr = addr;
        }
        if let Ok(policy) = env::var(DUPLICATE_NAMES_ENV) {
            config.duplicate_names = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.queue_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(AppError::InvalidConfig(
                "max line length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
