use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rand::prelude::*;
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
fn icon_class_items_never_mix_with_normal_atlases() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut sheet = RgbaImage::new(512, 512);
    for px in sheet.pixels_mut() {
        *px = Rgba([rng.r#gen(), rng.r#gen(), rng.r#gen(), 255]);
    }
    let loader = Arc::new(MemLoader {
        sheets: HashMap::from([("noise".to_string(), sheet)]),
    });

    // icon grid: 64x64 canvas, 16px slots -> 16 slots per icon atlas
    let cfg = PackageConfig::builder()
        .atlas_size(256)
        .icon_atlas_size(64)
        .icon_size(16)
        .build();
    let tmp = tempfile::tempdir().unwrap();
    let mut package = AtlasPackage::new(tmp.path(), cfg);

    let mut small = Vec::new();
    for i in 0..20u32 {
        small.push(package.register(ImageDef::new(
            "noise",
            Rect::new((i % 16) * 20, (i / 16) * 20, 8, 8),
            false,
            loader.clone(),
        )));
    }
    let mut big = Vec::new();
    for i in 0..3u32 {
        big.push(package.register(ImageDef::new(
            "noise",
            Rect::new(i * 60, 300, 40, 40),
            false,
            loader.clone(),
        )));
    }
    package.initialize().unwrap();

    let small_atlases: HashSet<usize> = small
        .iter()
        .map(|&id| package.placement(id).unwrap().atlas)
        .collect();
    let big_atlases: HashSet<usize> = big
        .iter()
        .map(|&id| package.placement(id).unwrap().atlas)
        .collect();
    assert!(small_atlases.is_disjoint(&big_atlases));

    // 20 icons overflow one 16-slot icon atlas
    assert!(small_atlases.len() >= 2);

    // icon placements sit on the fixed grid and keep their trimmed size
    for &id in &small {
        let p = package.placement(id).unwrap();
        assert_eq!(p.rect.x % 16, 0);
        assert_eq!(p.rect.y % 16, 0);
        assert_eq!((p.rect.w, p.rect.h), (8, 8));
    }
}
