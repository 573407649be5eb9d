use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;
use crate::model::{ImageDef, Rect, TrimOffset, location_key};

pub(crate) const MANIFEST_FILE: &str = "atlas-manifest.zip";
const MANIFEST_DOCUMENT: &str = "atlas-manifest.json";

/// Persisted record mapping one source fragment to its atlas placement.
/// Keyed logically by `(path, source)` for validity checking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub source: Rect,
    pub atlas: usize,
    pub rect: Rect,
    pub trim: TrimOffset,
}

/// Writes the manifest document, deflated, into an archive at `path`.
pub(crate) fn write(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut archive = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    archive.start_file(MANIFEST_DOCUMENT, options)?;
    serde_json::to_writer(&mut archive, entries)?;
    archive.finish()?;
    info!(
        "write manifest {} ({} entries)",
        path.display(),
        entries.len()
    );
    Ok(())
}

/// Reads the manifest document back out of the archive. Any failure here
/// (missing file, bad archive, bad JSON) means "no usable manifest" to the
/// caller, which then regenerates.
pub(crate) fn read(path: &Path) -> Result<Vec<ManifestEntry>> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let document = archive.by_name(MANIFEST_DOCUMENT)?;
    let entries: Vec<ManifestEntry> = serde_json::from_reader(document)?;
    info!(
        "read manifest {} ({} entries)",
        path.display(),
        entries.len()
    );
    Ok(entries)
}

/// A manifest is only accepted when its location-key set exactly equals the
/// set derived from the live definition list. Any added, removed, or resized
/// source fragment forces full regeneration.
pub(crate) fn is_valid(defs: &[ImageDef], entries: &[ManifestEntry]) -> bool {
    let current: HashSet<String> = defs.iter().map(|d| d.location_key()).collect();
    let persisted: HashSet<String> = entries
        .iter()
        .map(|e| location_key(&e.path, &e.source))
        .collect();
    let mismatched = current.symmetric_difference(&persisted).count();
    if mismatched != 0 {
        error!("atlas manifest mismatch detected: {mismatched} keys are different");
    }
    mismatched == 0
}
