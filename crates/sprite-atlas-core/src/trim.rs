use image::RgbaImage;

use crate::model::Rect;

/// Computes the tight bounding rectangle of non-transparent pixels within
/// `source`, in sheet coordinates.
///
/// A fully transparent region still occupies a minimal placement: the result
/// degenerates to 1x1 anchored at the source origin rather than vanishing.
/// Pure function over the supplied pixel buffer.
pub fn trim_opaque(sheet: &RgbaImage, source: &Rect) -> Rect {
    let (sw, sh) = sheet.dimensions();
    let x0 = source.x.min(sw);
    let y0 = source.y.min(sh);
    let x_end = (source.x + source.w).min(sw);
    let y_end = (source.y + source.h).min(sh);
    if x0 >= x_end || y0 >= y_end {
        return Rect::new(source.x, source.y, 1, 1);
    }

    let mut x1 = x0;
    let mut y1 = y0;
    let mut x2 = x_end - 1;
    let mut y2 = y_end - 1;

    let opaque_in_row = |y: u32, xa: u32, xb: u32| {
        (xa..=xb).any(|x| sheet.get_pixel(x, y)[3] > 0)
    };
    let opaque_in_col = |x: u32, ya: u32, yb: u32| {
        (ya..=yb).any(|y| sheet.get_pixel(x, y)[3] > 0)
    };

    // top
    while y1 <= y2 && !opaque_in_row(y1, x1, x2) {
        if y1 == y2 {
            // whole region transparent
            return Rect::new(source.x, source.y, 1, 1);
        }
        y1 += 1;
    }
    // bottom
    while y2 > y1 && !opaque_in_row(y2, x1, x2) {
        y2 -= 1;
    }
    // left
    while x1 < x2 && !opaque_in_col(x1, y1, y2) {
        x1 += 1;
    }
    // right
    while x2 > x1 && !opaque_in_col(x2, y1, y2) {
        x2 -= 1;
    }

    Rect::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1)
}

/// Content fingerprint of exactly the pixels inside `rect`, independent of
/// the rectangle's position within the sheet.
///
/// Hashes alpha-premultiplied RGBA bytes in row-major order. Equality-only
/// use: identical fingerprints are collapsed to one packed slot.
pub fn fingerprint(sheet: &RgbaImage, rect: &Rect) -> [u8; 32] {
    let (sw, sh) = sheet.dimensions();
    let mut hasher = blake3::Hasher::new();
    let mut row: Vec<u8> = Vec::with_capacity(rect.w as usize * 4);
    for y in rect.y..rect.y + rect.h {
        row.clear();
        for x in rect.x..rect.x + rect.w {
            let px = if x < sw && y < sh {
                *sheet.get_pixel(x, y)
            } else {
                image::Rgba([0, 0, 0, 0])
            };
            let a = px[3] as u32;
            row.push(((px[0] as u32 * a) / 255) as u8);
            row.push(((px[1] as u32 * a) / 255) as u8);
            row.push(((px[2] as u32 * a) / 255) as u8);
            row.push(px[3]);
        }
        hasher.update(&row);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sheet(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]))
    }

    #[test]
    fn transparent_region_degenerates_to_unit_rect() {
        let img = sheet(32, 32);
        let r = trim_opaque(&img, &Rect::new(4, 6, 10, 10));
        assert_eq!(r, Rect::new(4, 6, 1, 1));
    }

    #[test]
    fn single_opaque_pixel_trims_to_it() {
        let mut img = sheet(32, 32);
        img.put_pixel(7, 9, Rgba([255, 0, 0, 255]));
        let r = trim_opaque(&img, &Rect::new(4, 6, 10, 10));
        assert_eq!(r, Rect::new(7, 9, 1, 1));
    }

    #[test]
    fn opaque_block_keeps_tight_bounds() {
        let mut img = sheet(32, 32);
        for y in 10..14 {
            for x in 5..8 {
                img.put_pixel(x, y, Rgba([1, 2, 3, 200]));
            }
        }
        let r = trim_opaque(&img, &Rect::new(0, 0, 32, 32));
        assert_eq!(r, Rect::new(5, 10, 3, 4));
    }

    #[test]
    fn fingerprint_is_position_independent() {
        let mut img = sheet(32, 32);
        img.put_pixel(2, 2, Rgba([9, 9, 9, 255]));
        img.put_pixel(20, 20, Rgba([9, 9, 9, 255]));
        let a = fingerprint(&img, &Rect::new(2, 2, 1, 1));
        let b = fingerprint(&img, &Rect::new(20, 20, 1, 1));
        assert_eq!(a, b);
        let c = fingerprint(&img, &Rect::new(3, 3, 1, 1));
        assert_ne!(a, c);
    }
}
