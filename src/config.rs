//! Global configuration options.
//!
//! Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
//!
//! ## Validate Checksums
//! > default: `true`
//!
//! If enabled, every brick read from a volume file is checked against the CRC32 stored in the
//! brick table, and a mismatch fails the read.
//!
//! ## Default Brick Size
//! > default: `32`
//!
//! The brick edge length used by [`VolumeLayout::new`](crate::layout::VolumeLayout::new) for every
//! dimension of a newly described volume.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::OnceLock;

/// Global configuration options for the crate.
#[derive(Debug, Clone)]
pub struct Config {
    validate_checksums: bool,
    default_brick_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            validate_checksums: true,
            default_brick_size: 32,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) {
        self.validate_checksums = validate_checksums;
    }

    /// Get the [default brick size](#default-brick-size) configuration.
    #[must_use]
    pub fn default_brick_size(&self) -> usize {
        self.default_brick_size
    }

    /// Set the [default brick size](#default-brick-size) configuration. Zero is clamped to one.
    pub fn set_default_brick_size(&mut self, default_brick_size: usize) {
        self.default_brick_size = default_brick_size.max(1);
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global configuration.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}
