use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, instrument};

use crate::atlas::Atlas;
use crate::config::PackageConfig;
use crate::error::{AtlasError, Result};
use crate::model::{ImageDef, Placement, Rect, SheetLoader, TrimOffset, location_key};
use crate::package::PackageId;
use crate::quadtree::Quadtree;
use crate::sheet::{LoadPermits, SheetCache};
use crate::trim::{fingerprint, trim_opaque};

const PROGRESS_INTERVAL: usize = 1000;

/// Runs one full packing pass: parallel trim, largest-first sort, dedup by
/// location then by content, and sequential placement into icon/normal
/// atlases. On success every definition carries exactly one resolved
/// placement and the returned atlases hold the composited pixels.
#[instrument(skip_all)]
pub(crate) fn pack(
    defs: &mut [ImageDef],
    cfg: &PackageConfig,
    owner: PackageId,
) -> Result<Vec<Atlas>> {
    if defs.is_empty() {
        return Err(AtlasError::Empty);
    }
    for def in defs.iter_mut() {
        def.reset();
    }

    // Last registered loader wins for a shared sheet path.
    let mut loaders: HashMap<String, Arc<dyn SheetLoader>> = HashMap::new();
    for def in defs.iter() {
        loaders.insert(def.path().to_string(), Arc::clone(&def.loader));
    }
    let cache = SheetCache::new(loaders, cfg.cache_capacity());
    let permits = LoadPermits::new(cfg.max_parallel_loads);

    info!("trimming {} images", defs.len());
    trim_all(defs, &cache, &permits)?;

    info!("packing {} images", defs.len());
    let mut order: Vec<usize> = (0..defs.len()).collect();
    // Largest trimmed area first; stable sort keeps input order on ties.
    order.sort_by_key(|&i| Reverse(defs[i].trimmed.map(|r| r.area()).unwrap_or(0)));

    let total = defs.len();
    let total_pixels: u64 = defs
        .iter()
        .map(|d| d.trimmed.map(|r| r.area()).unwrap_or(0))
        .sum::<u64>()
        .max(1);
    let mut progress_pixels = 0u64;

    let mut atlases: Vec<Atlas> = vec![Atlas::new(owner, 0, cfg.atlas_size)];
    let mut icon_atlas: Option<usize> = None;
    let mut location_map: HashMap<String, Placement> = HashMap::new();
    let mut content_map: HashMap<[u8; 32], Placement> = HashMap::new();

    for (count, &idx) in order.iter().enumerate() {
        let (path, source, trimmed) = {
            let def = &defs[idx];
            let trimmed = def.trimmed.unwrap_or(def.source);
            (def.path().to_string(), def.source, trimmed)
        };
        progress_pixels += trimmed.area();
        if (count + 1) % PROGRESS_INTERVAL == 0 {
            info!(
                "packing images... {}/{} ({}%)",
                count + 1,
                total,
                (100 * progress_pixels) / total_pixels
            );
        }

        let key = location_key(&path, &source);
        if let Some(shared) = location_map.get(&key) {
            // Identical source region reused verbatim.
            defs[idx].placement = Some(*shared);
            continue;
        }

        let sheet = cache.get(&path)?;
        let print = fingerprint(&sheet, &trimmed);
        if let Some(shared) = content_map.get(&print) {
            // Identical pixel content from a different location shares the
            // packed slot; record the new location key so future lookups
            // short-circuit without rehashing.
            let shared = *shared;
            defs[idx].placement = Some(shared);
            location_map.insert(key, shared);
            continue;
        }

        let (w, h) = (trimmed.w, trimmed.h);
        let icon = w <= cfg.icon_size && h <= cfg.icon_size;
        let (atlas_idx, rect) = if icon {
            place_icon(&mut atlases, &mut icon_atlas, cfg, owner, w, h)
        } else {
            place_normal(&mut atlases, cfg, owner, &path, w, h)?
        };
        atlases[atlas_idx].blit(&sheet, &trimmed, rect.x, rect.y);

        let placement = Placement {
            atlas: atlases[atlas_idx].id(),
            rect,
            trim: TrimOffset {
                x: trimmed.x - source.x,
                y: trimmed.y - source.y,
            },
        };
        defs[idx].placement = Some(placement);
        location_map.insert(key, placement);
        content_map.insert(print, placement);
    }

    info!("atlas packing complete: {} atlases", atlases.len());
    Ok(atlases)
}

/// Trims every definition in parallel. Workers hold a decode permit across
/// the load+trim of one definition; the first failure aborts the pass.
fn trim_all(defs: &mut [ImageDef], cache: &SheetCache, permits: &LoadPermits) -> Result<()> {
    let total = defs.len();
    let processed = AtomicUsize::new(0);
    defs.par_iter_mut().try_for_each(|def| -> Result<()> {
        if def.trimmable {
            let _permit = permits.acquire();
            let sheet = cache.get(def.path())?;
            def.trimmed = Some(trim_opaque(&sheet, &def.source));
        } else {
            def.trimmed = Some(def.source);
        }
        let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % PROGRESS_INTERVAL == 0 {
            info!("trimming images... {}/{}", done, total);
        }
        Ok(())
    })
}

/// Places an icon-class sprite on the current icon atlas's grid cursor,
/// opening a fresh icon atlas when the slot count hits its maximum.
fn place_icon(
    atlases: &mut Vec<Atlas>,
    icon_atlas: &mut Option<usize>,
    cfg: &PackageConfig,
    owner: PackageId,
    w: u32,
    h: u32,
) -> (usize, Rect) {
    let idx = match *icon_atlas {
        Some(idx) if !atlases[idx].icon_full() => idx,
        _ => {
            let id = atlases.len();
            info!("opened icon atlas {id}");
            atlases.push(Atlas::new_icons(owner, id, cfg.icon_atlas_size, cfg.icon_size));
            *icon_atlas = Some(id);
            id
        }
    };
    // A fresh or non-full icon atlas always yields a slot.
    let (x, y) = atlases[idx].take_icon_slot().unwrap_or((0, 0));
    (idx, Rect::new(x, y, w, h))
}

/// Places a sprite into the newest normal atlas that fits, opening a new one
/// when all existing atlases are exhausted.
fn place_normal(
    atlases: &mut Vec<Atlas>,
    cfg: &PackageConfig,
    owner: PackageId,
    path: &str,
    w: u32,
    h: u32,
) -> Result<(usize, Rect)> {
    let size = cfg.atlas_size;
    if w > size || h > size {
        return Err(AtlasError::SpriteTooLarge {
            path: path.to_string(),
            w,
            h,
            max: size,
        });
    }
    loop {
        for idx in (0..atlases.len()).rev() {
            if atlases[idx].rejects(w, h) {
                continue;
            }
            let Some(occupied) = atlases[idx].occupied_mut() else {
                continue;
            };
            if let Some(rect) = scan_place(occupied, size, w, h) {
                return Ok((idx, rect));
            }
            atlases[idx].record_failure(w, h);
        }
        let id = atlases.len();
        info!("opened atlas {id}");
        atlases.push(Atlas::new(owner, id, size));
    }
}

/// Row scan over the atlas canvas. On collision the x cursor jumps past the
/// collider's right edge, and the next row starts at the lowest collider
/// bottom seen on this row, so the search never probes pixel by pixel.
fn scan_place(occupied: &mut Quadtree, size: u32, w: u32, h: u32) -> Option<Rect> {
    let mut y = 0;
    while y + h <= size {
        let mut next_y = size;
        let mut x = 0;
        while x + w <= size {
            let candidate = Rect::new(x, y, w, h);
            match occupied.insert_if_no_collision(candidate) {
                None => return Some(candidate),
                Some(hit) => {
                    x = hit.x + hit.w;
                    next_y = next_y.min(hit.y + hit.h);
                }
            }
        }
        y = next_y;
    }
    None
}
