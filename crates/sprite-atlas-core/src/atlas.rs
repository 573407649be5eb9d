use image::RgbaImage;

use crate::model::Rect;
use crate::package::PackageId;
use crate::quadtree::Quadtree;

/// A packed canvas. Either a normal atlas tracked by an occupancy quadtree,
/// an icon atlas filled by a fixed-size grid cursor, or a canvas rehydrated
/// from disk on the load path.
pub struct Atlas {
    id: usize,
    owner: PackageId,
    canvas: RgbaImage,
    kind: AtlasKind,
}

pub(crate) enum AtlasKind {
    Normal {
        occupied: Quadtree,
        /// Sizes that failed to pack here. A candidate at least as large in
        /// both dimensions as any recorded failure is rejected without a scan.
        failed_sizes: Vec<(u32, u32)>,
    },
    Icon {
        slot: u32,
        count: u32,
        max: u32,
        columns: u32,
    },
    Loaded,
}

impl Atlas {
    pub(crate) fn new(owner: PackageId, id: usize, size: u32) -> Self {
        Self {
            id,
            owner,
            canvas: RgbaImage::new(size, size),
            kind: AtlasKind::Normal {
                occupied: Quadtree::new(size, size),
                failed_sizes: Vec::new(),
            },
        }
    }

    pub(crate) fn new_icons(owner: PackageId, id: usize, size: u32, slot: u32) -> Self {
        let columns = size / slot;
        Self {
            id,
            owner,
            canvas: RgbaImage::new(size, size),
            kind: AtlasKind::Icon {
                slot,
                count: 0,
                max: columns * columns,
                columns,
            },
        }
    }

    pub(crate) fn from_image(owner: PackageId, id: usize, canvas: RgbaImage) -> Self {
        Self {
            id,
            owner,
            canvas,
            kind: AtlasKind::Loaded,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn owner(&self) -> PackageId {
        self.owner
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn is_icon_mode(&self) -> bool {
        matches!(self.kind, AtlasKind::Icon { .. })
    }

    /// Placed rectangles of a normal atlas, replayed from the occupancy
    /// structure. `None` for icon and loaded atlases.
    pub fn placed_rects(&self) -> Option<Vec<Rect>> {
        match &self.kind {
            AtlasKind::Normal { occupied, .. } => Some(occupied.rects()),
            _ => None,
        }
    }

    pub(crate) fn occupied_mut(&mut self) -> Option<&mut Quadtree> {
        match &mut self.kind {
            AtlasKind::Normal { occupied, .. } => Some(occupied),
            _ => None,
        }
    }

    pub(crate) fn rejects(&self, w: u32, h: u32) -> bool {
        match &self.kind {
            AtlasKind::Normal { failed_sizes, .. } => failed_sizes
                .iter()
                .any(|&(fw, fh)| w >= fw && h >= fh),
            _ => false,
        }
    }

    /// Records a size that exhausted this atlas. A recorded failure already
    /// dominated by the new one shrinks in place; otherwise the size is
    /// appended.
    pub(crate) fn record_failure(&mut self, w: u32, h: u32) {
        if let AtlasKind::Normal { failed_sizes, .. } = &mut self.kind {
            for size in failed_sizes.iter_mut() {
                if w <= size.0 && h <= size.1 {
                    *size = (w, h);
                    return;
                }
            }
            failed_sizes.push((w, h));
        }
    }

    pub(crate) fn icon_full(&self) -> bool {
        match &self.kind {
            AtlasKind::Icon { count, max, .. } => count >= max,
            _ => true,
        }
    }

    /// Claims the next icon grid slot and returns its top-left corner.
    pub(crate) fn take_icon_slot(&mut self) -> Option<(u32, u32)> {
        match &mut self.kind {
            AtlasKind::Icon {
                slot,
                count,
                max,
                columns,
            } if *count < *max => {
                let x = (*count % *columns) * *slot;
                let y = (*count / *columns) * *slot;
                *count += 1;
                Some((x, y))
            }
            _ => None,
        }
    }

    /// Copies the `src` rectangle of `sheet` onto this canvas at `(dx, dy)`.
    pub(crate) fn blit(&mut self, sheet: &RgbaImage, src: &Rect, dx: u32, dy: u32) {
        let (sw, sh) = sheet.dimensions();
        let (cw, ch) = self.canvas.dimensions();
        for yy in 0..src.h {
            for xx in 0..src.w {
                let sx = src.x + xx;
                let sy = src.y + yy;
                if sx < sw && sy < sh && dx + xx < cw && dy + yy < ch {
                    let px = *sheet.get_pixel(sx, sy);
                    self.canvas.put_pixel(dx + xx, dy + yy, px);
                }
            }
        }
    }
}
