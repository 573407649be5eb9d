use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::{error, info, instrument, warn};

use crate::atlas::Atlas;
use crate::config::PackageConfig;
use crate::error::{AtlasError, Result};
use crate::manifest::{self, ManifestEntry};
use crate::model::{DefId, ImageDef, Placement, Rect};
use crate::packer;

static NEXT_PACKAGE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one [`AtlasPackage`]. Atlases carry their owner's id; a foreign
/// atlas surfacing at manifest-write time is an invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageId(u64);

impl PackageId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PACKAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

const ATLAS_SUBDIR: &str = "atlas";

/// Owns the definition list and the packed atlases, and orchestrates
/// generate-or-load.
///
/// Register every [`ImageDef`] first, then call [`initialize`]. If a persisted
/// manifest matching the current definition set exists it is loaded; otherwise
/// the atlases are regenerated and persisted. After `initialize` every
/// registered definition has a resolved placement (or was logged as
/// unresolved).
///
/// [`initialize`]: AtlasPackage::initialize
pub struct AtlasPackage {
    id: PackageId,
    dir: PathBuf,
    cfg: PackageConfig,
    defs: Vec<ImageDef>,
    atlases: Vec<Atlas>,
}

impl AtlasPackage {
    pub fn new(dir: impl Into<PathBuf>, cfg: PackageConfig) -> Self {
        Self {
            id: PackageId::next(),
            dir: dir.into(),
            cfg,
            defs: Vec::new(),
            atlases: Vec::new(),
        }
    }

    /// Registers a definition and returns its stable handle.
    pub fn register(&mut self, def: ImageDef) -> DefId {
        self.defs.push(def);
        DefId(self.defs.len() - 1)
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    pub fn def(&self, id: DefId) -> Option<&ImageDef> {
        self.defs.get(id.0)
    }

    pub fn placement(&self, id: DefId) -> Option<Placement> {
        self.defs.get(id.0).and_then(|d| d.placement)
    }

    /// Trimmed rectangle (sheet coordinates) resolved for a definition.
    pub fn trimmed(&self, id: DefId) -> Option<Rect> {
        self.defs.get(id.0).and_then(|d| d.trimmed)
    }

    pub fn atlases(&self) -> &[Atlas] {
        &self.atlases
    }

    pub fn atlas(&self, id: usize) -> Option<&Atlas> {
        self.atlases.iter().find(|a| a.id() == id)
    }

    /// Loads the persisted atlases when the manifest matches the current
    /// definition set, regenerating everything otherwise.
    #[instrument(skip_all)]
    pub fn initialize(&mut self) -> Result<()> {
        self.cfg.validate()?;
        let folder = self.dir.join(ATLAS_SUBDIR);
        let manifest_path = folder.join(manifest::MANIFEST_FILE);

        let entries = match manifest::read(&manifest_path) {
            Ok(entries) if manifest::is_valid(&self.defs, &entries) => entries,
            Ok(_) => {
                info!("manifest is out of date, regenerating atlases");
                self.generate(&folder, &manifest_path)?
            }
            Err(err) => {
                warn!("no usable manifest ({err}), regenerating atlases");
                self.generate(&folder, &manifest_path)?
            }
        };
        self.load(&folder, &entries)
    }

    /// Runs a full packing pass, then persists the atlas images and the
    /// manifest archive. Nothing is persisted on error.
    fn generate(&mut self, folder: &Path, manifest_path: &Path) -> Result<Vec<ManifestEntry>> {
        let atlases = packer::pack(&mut self.defs, &self.cfg, self.id)?;

        let mut entries = Vec::with_capacity(self.defs.len());
        for def in &self.defs {
            let Some(placement) = def.placement() else {
                error!("unresolved placement for {}", def.path());
                continue;
            };
            let Some(atlas) = atlases.iter().find(|a| a.id() == placement.atlas) else {
                error!("placement for {} references unknown atlas", def.path());
                continue;
            };
            if atlas.owner() != self.id {
                return Err(AtlasError::ForeignAtlas { id: atlas.id() });
            }
            entries.push(ManifestEntry {
                path: def.path().to_string(),
                source: def.source(),
                atlas: placement.atlas,
                rect: placement.rect,
                trim: placement.trim,
            });
        }

        fs::create_dir_all(folder)?;
        for dir_entry in fs::read_dir(folder)? {
            let dir_entry = dir_entry?;
            if dir_entry.file_type()?.is_file() {
                fs::remove_file(dir_entry.path())?;
            }
        }

        atlases.par_iter().try_for_each(|atlas| -> Result<()> {
            let file = folder.join(format!("atlas-{}.png", atlas.id()));
            atlas.canvas().save_with_format(&file, image::ImageFormat::Png)?;
            info!("write atlas {}", file.display());
            Ok(())
        })?;

        manifest::write(manifest_path, &entries)?;
        Ok(entries)
    }

    /// Rehydrates atlas canvases from disk and every definition's placement
    /// and trimmed rectangle from its manifest entry.
    fn load(&mut self, folder: &Path, entries: &[ManifestEntry]) -> Result<()> {
        for def in &mut self.defs {
            def.reset();
        }

        let mut ids: Vec<usize> = entries.iter().map(|e| e.atlas).collect();
        ids.sort_unstable();
        ids.dedup();
        info!("read atlases {:?} from {}", ids, folder.display());

        let owner = self.id;
        let mut atlases = ids
            .par_iter()
            .map(|&id| -> Result<Atlas> {
                let png = folder.join(format!("atlas-{id}.png"));
                let webp = folder.join(format!("atlas-{id}.webp"));
                let file = if png.is_file() {
                    png
                } else if webp.is_file() {
                    info!("using legacy webp atlas file: {}", webp.display());
                    webp
                } else {
                    return Err(AtlasError::MissingAtlasFile { id });
                };
                let canvas = image::open(&file)?.to_rgba8();
                Ok(Atlas::from_image(owner, id, canvas))
            })
            .collect::<Result<Vec<Atlas>>>()?;
        atlases.sort_by_key(|a| a.id());
        self.atlases = atlases;

        let by_key: HashMap<String, &ManifestEntry> = entries
            .iter()
            .map(|e| (crate::model::location_key(&e.path, &e.source), e))
            .collect();

        for def in &mut self.defs {
            let key = def.location_key();
            match by_key.get(&key) {
                None => error!("missing atlas entry for {key}"),
                Some(entry) => {
                    def.placement = Some(Placement {
                        atlas: entry.atlas,
                        rect: entry.rect,
                        trim: entry.trim,
                    });
                    def.trimmed = Some(Rect::new(
                        def.source.x + entry.trim.x,
                        def.source.y + entry.trim.y,
                        entry.rect.w,
                        entry.rect.h,
                    ));
                }
            }
        }
        Ok(())
    }
}
