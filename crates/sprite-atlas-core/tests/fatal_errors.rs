use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use sprite_atlas_core::prelude::*;

struct MemLoader {
    sheets: HashMap<String, RgbaImage>,
}

impl SheetLoader for MemLoader {
    fn load(&self, path: &str) -> Result<RgbaImage> {
        self.sheets.get(path).cloned().ok_or_else(|| {
            AtlasError::SheetDecode {
                path: path.into(),
                message: "unknown sheet".into(),
            }
        })
    }
}

#[test]
fn sheet_decode_failure_aborts_the_pass() {
    let loader = Arc::new(MemLoader {
        sheets: HashMap::new(),
    });
    let tmp = tempfile::tempdir().unwrap();
    let mut package = AtlasPackage::new(tmp.path(), PackageConfig::default());
    package.register(ImageDef::new("gone", Rect::new(0, 0, 8, 8), true, loader));

    let err = package.initialize().unwrap_err();
    assert!(matches!(err, AtlasError::SheetDecode { .. }));
    // no partial artifacts
    assert!(!tmp.path().join("atlas").join("atlas-manifest.zip").exists());
}

#[test]
fn oversized_sprite_is_a_fatal_input_error() {
    let sheet = RgbaImage::from_pixel(320, 320, Rgba([1, 2, 3, 255]));
    let loader = Arc::new(MemLoader {
        sheets: HashMap::from([("big".to_string(), sheet)]),
    });
    let cfg = PackageConfig::builder()
        .atlas_size(256)
        .icon_atlas_size(64)
        .icon_size(16)
        .build();
    let tmp = tempfile::tempdir().unwrap();
    let mut package = AtlasPackage::new(tmp.path(), cfg);
    package.register(ImageDef::new("big", Rect::new(0, 0, 300, 300), true, loader));

    let err = package.initialize().unwrap_err();
    assert!(matches!(err, AtlasError::SpriteTooLarge { .. }));
    assert!(!tmp.path().join("atlas").join("atlas-manifest.zip").exists());
}

#[test]
fn empty_definition_list_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut package = AtlasPackage::new(tmp.path(), PackageConfig::default());
    let err = package.initialize().unwrap_err();
    assert!(matches!(err, AtlasError::Empty));
}
