use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Packing configuration for an atlas package.
///
/// Key notes:
///   - `atlas_size` / `icon_atlas_size` are fixed canvas dimensions; pages are
///     always square.
///   - `icon_size` is the grid slot size of icon atlases and the threshold
///     below which a trimmed sprite is icon-class.
///   - `max_parallel_loads` bounds simultaneous in-flight sheet decodes during
///     the trim phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Width/height of normal atlases in pixels.
    pub atlas_size: u32,
    /// Width/height of icon atlases in pixels.
    pub icon_atlas_size: u32,
    /// Grid slot size of icon atlases; sprites with both trimmed dimensions
    /// at or below this are placed on the icon grid.
    pub icon_size: u32,
    /// Cap on simultaneous sheet decodes.
    #[serde(default = "default_max_parallel_loads")]
    pub max_parallel_loads: usize,
    /// Decoded-sheet cache capacity (entries).
    #[serde(default)]
    pub sheet_cache_capacity: Option<usize>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            atlas_size: 4096,
            icon_atlas_size: 2048,
            icon_size: 64,
            max_parallel_loads: default_max_parallel_loads(),
            sheet_cache_capacity: None,
        }
    }
}

fn default_max_parallel_loads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        * 2
}

impl PackageConfig {
    /// Create a fluent builder for `PackageConfig`.
    pub fn builder() -> PackageConfigBuilder {
        PackageConfigBuilder::new()
    }

    /// Effective sheet cache capacity.
    pub fn cache_capacity(&self) -> usize {
        self.sheet_cache_capacity
            .unwrap_or(self.max_parallel_loads * 100)
            .max(1)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.atlas_size == 0 || self.icon_atlas_size == 0 || self.icon_size == 0 {
            return Err(AtlasError::InvalidConfig(format!(
                "atlas sizes must be non-zero (atlas {}, icons {}, slot {})",
                self.atlas_size, self.icon_atlas_size, self.icon_size
            )));
        }
        if self.icon_size > self.icon_atlas_size {
            return Err(AtlasError::InvalidConfig(format!(
                "icon_size ({}) exceeds icon_atlas_size ({})",
                self.icon_size, self.icon_atlas_size
            )));
        }
        if self.max_parallel_loads == 0 {
            return Err(AtlasError::InvalidConfig(
                "max_parallel_loads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for `PackageConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackageConfigBuilder {
    cfg: PackageConfig,
}

impl PackageConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackageConfig::default(),
        }
    }
    pub fn atlas_size(mut self, v: u32) -> Self {
        self.cfg.atlas_size = v;
        self
    }
    pub fn icon_atlas_size(mut self, v: u32) -> Self {
        self.cfg.icon_atlas_size = v;
        self
    }
    pub fn icon_size(mut self, v: u32) -> Self {
        self.cfg.icon_size = v;
        self
    }
    pub fn max_parallel_loads(mut self, v: usize) -> Self {
        self.cfg.max_parallel_loads = v;
        self
    }
    pub fn sheet_cache_capacity(mut self, v: Option<usize>) -> Self {
        self.cfg.sheet_cache_capacity = v;
        self
    }
    pub fn build(self) -> PackageConfig {
        self.cfg
    }
}
