use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges).
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    pub fn intersects(&self, other: &Rect) -> bool {
        let ax2 = self.x + self.w;
        let ay2 = self.y + self.h;
        let bx2 = other.x + other.w;
        let by2 = other.y + other.h;
        !(self.x >= bx2 || other.x >= ax2 || self.y >= by2 || other.y >= ay2)
    }
}

/// Offset of the trimmed rectangle within its source rectangle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrimOffset {
    pub x: u32,
    pub y: u32,
}

/// Resolved placement of one sprite fragment: which atlas, where, and how far
/// the content was trimmed in from the source rectangle's origin.
///
/// Placements are small `Copy` values. Deduplicated definitions receive the
/// same triple by assignment, never by sharing a reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub atlas: usize,
    pub rect: Rect,
    pub trim: TrimOffset,
}

/// Decodes a sprite sheet's pixel buffer given its path/id.
///
/// Invoked lazily, possibly from multiple worker threads, and memoized by the
/// sheet cache. A decode failure aborts the whole packing pass.
pub trait SheetLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<RgbaImage>;
}

/// Handle to a registered [`ImageDef`], stable for the package's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub(crate) usize);

/// One sprite fragment to pack: a source rectangle within a sheet, plus the
/// capability to decode that sheet on demand.
pub struct ImageDef {
    pub(crate) path: String,
    pub(crate) source: Rect,
    pub(crate) trimmable: bool,
    pub(crate) loader: Arc<dyn SheetLoader>,
    /// Set once per generate-or-load pass.
    pub(crate) trimmed: Option<Rect>,
    /// Set once per generate-or-load pass.
    pub(crate) placement: Option<Placement>,
}

impl ImageDef {
    pub fn new(
        path: impl Into<String>,
        source: Rect,
        trimmable: bool,
        loader: Arc<dyn SheetLoader>,
    ) -> Self {
        Self {
            path: path.into(),
            source,
            trimmable,
            loader,
            trimmed: None,
            placement: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn source(&self) -> Rect {
        self.source
    }
    pub fn trimmable(&self) -> bool {
        self.trimmable
    }
    /// Trimmed rectangle in sheet coordinates; `None` before a pass resolves it.
    pub fn trimmed(&self) -> Option<Rect> {
        self.trimmed
    }
    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    pub(crate) fn reset(&mut self) {
        self.trimmed = None;
        self.placement = None;
    }

    pub(crate) fn location_key(&self) -> String {
        location_key(&self.path, &self.source)
    }
}

impl fmt::Debug for ImageDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDef")
            .field("path", &self.path)
            .field("source", &self.source)
            .field("trimmable", &self.trimmable)
            .field("trimmed", &self.trimmed)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

/// Identity of a source fragment, used for exact-match dedup and manifest
/// validity checking.
pub(crate) fn location_key(path: &str, source: &Rect) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        path, source.x, source.y, source.w, source.h
    )
}
