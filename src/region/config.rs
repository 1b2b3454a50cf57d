//! Region configuration.

use crate::entry::DEFAULT_SHARDS;

/// Retries against cemented tombstones before a put logs a starvation warning.
pub const DEFAULT_RETRY_WARN_THRESHOLD: u32 = 64;

/// Maximum size for a single value (512 MB)
pub const DEFAULT_MAX_VALUE_SIZE: usize = 512 * 1024 * 1024;

/// Configuration for a [`LocalRegion`](crate::region::LocalRegion).
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Region name, used in logs
    pub name: String,

    /// Number of table shards (default: 64)
    pub shards: usize,

    /// Tombstone retries within one put before a warning is logged (default: 64)
    pub retry_warn_threshold: u32,

    /// Largest value the codec accepts (default: 512 MB)
    pub max_value_size: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            shards: DEFAULT_SHARDS,
            retry_warn_threshold: DEFAULT_RETRY_WARN_THRESHOLD,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }
}

impl RegionConfig {
    /// Default configuration with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
