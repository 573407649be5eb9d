//! Core library for consolidating sprite fragments into packed texture atlases.
//!
//! - Pipeline: register [`ImageDef`]s with an [`AtlasPackage`], then
//!   `initialize` to load a valid persisted atlas set or regenerate it
//!   (parallel trim, content-aware dedup, scan-line bin-packing, icon grid).
//! - Persistence: one PNG per atlas plus a validated manifest archive; a
//!   manifest whose key set no longer matches the definition list is rebuilt.
//!
//! Quick example:
//! ```ignore
//! use sprite_atlas_core::prelude::*;
//! # fn main() -> sprite_atlas_core::Result<()> {
//! let loader = std::sync::Arc::new(MySheetLoader::new());
//! let mut package = AtlasPackage::new("cache/base", PackageConfig::default());
//! let id = package.register(ImageDef::new(
//!     "sheets/entities.png",
//!     Rect::new(0, 0, 128, 128),
//!     true,
//!     loader,
//! ));
//! package.initialize()?;
//! let placement = package.placement(id);
//! # Ok(()) }
//! ```

pub mod atlas;
pub mod config;
pub mod error;
pub mod manifest;
pub mod model;
pub mod package;
pub mod quadtree;
pub mod trim;

mod packer;
mod sheet;

pub use atlas::Atlas;
pub use config::{PackageConfig, PackageConfigBuilder};
pub use error::{AtlasError, Result};
pub use manifest::ManifestEntry;
pub use model::{DefId, ImageDef, Placement, Rect, SheetLoader, TrimOffset};
pub use package::{AtlasPackage, PackageId};

/// Convenience prelude for common types.
/// Importing `sprite_atlas_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::atlas::Atlas;
    pub use crate::config::{PackageConfig, PackageConfigBuilder};
    pub use crate::error::{AtlasError, Result};
    pub use crate::model::{DefId, ImageDef, Placement, Rect, SheetLoader, TrimOffset};
    pub use crate::package::AtlasPackage;
    pub use crate::quadtree::Quadtree;
    pub use crate::trim::{fingerprint, trim_opaque};
}
