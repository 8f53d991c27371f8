//! Raster to ASCII text conversion: integer luma, a density ramp, and the
//! aspect-fit math that sizes a frame for the viewport.

use image::imageops::FilterType;
use image::DynamicImage;

/// Density ramp ordered darkest to brightest, tuned for dark terminal themes.
pub const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

/// BT.709 luma from 8-bit RGB, computed in integer space.
pub fn bt709_luma_u8(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 2126 * u32::from(r) + 7152 * u32::from(g) + 722 * u32::from(b);
    (weighted / 10_000).min(255) as u8
}

/// Maps an 8-bit luma onto a ramp index with round-to-nearest quantization.
pub fn quantize_luma_to_index(y8: u8, ramp_len: usize) -> usize {
    debug_assert!(ramp_len > 0);
    let last = (ramp_len - 1) as u32;
    ((u32::from(y8) * last + 127) / 255) as usize
}

/// Largest size that fits inside `(max_w, max_h)` while keeping the source
/// aspect ratio. A nonzero source never maps to a zero dimension unless the
/// box itself is zero.
pub fn fit_within(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 || max_w == 0 || max_h == 0 {
        return (0, 0);
    }

    let scale_w = f64::from(max_w) / f64::from(src_w);
    let scale_h = f64::from(max_h) / f64::from(src_h);
    let scale = scale_w.min(scale_h);

    let w = (f64::from(src_w) * scale).round().max(1.0) as u32;
    let h = (f64::from(src_h) * scale).round().max(1.0) as u32;
    (w.min(max_w), h.min(max_h))
}

/// Resizes the raster to exactly `width` x `height` and emits one text row
/// per pixel row, one ramp character per pixel.
pub fn image_to_ascii_lines(raster: &DynamicImage, width: u32, height: u32) -> Vec<String> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let rgba = raster
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgba8();

    let mut lines = Vec::with_capacity(height as usize);
    for row in rgba.rows() {
        let mut line = String::with_capacity(width as usize);
        for pixel in row {
            let [r, g, b, _] = pixel.0;
            let index = quantize_luma_to_index(bt709_luma_u8(r, g, b), ASCII_RAMP.len());
            line.push(ASCII_RAMP[index] as char);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn luma_tracks_green_most() {
        assert_eq!(bt709_luma_u8(0, 0, 0), 0);
        assert_eq!(bt709_luma_u8(255, 255, 255), 255);
        assert!(bt709_luma_u8(0, 255, 0) > bt709_luma_u8(255, 0, 0));
        assert!(bt709_luma_u8(255, 0, 0) > bt709_luma_u8(0, 0, 255));
    }

    #[test]
    fn quantize_spans_full_ramp() {
        let cases = [
            (0u8, 0usize),
            (127, 4),
            (128, 5),
            (255, ASCII_RAMP.len() - 1),
        ];
        for (y8, want) in cases {
            assert_eq!(quantize_luma_to_index(y8, ASCII_RAMP.len()), want, "luma {y8}");
        }
    }

    #[test]
    fn fit_within_preserves_aspect() {
        let cases = [
            // (src_w, src_h, max_w, max_h, want_w, want_h)
            (1920u32, 1080u32, 96u32, 96u32, 96u32, 54u32),
            (1080, 1920, 96, 96, 54, 96),
            (100, 100, 50, 25, 25, 25),
            (10, 10, 40, 40, 40, 40),
            (640, 480, 0, 40, 0, 0),
        ];
        for (sw, sh, mw, mh, ww, wh) in cases {
            assert_eq!(fit_within(sw, sh, mw, mh), (ww, wh), "{sw}x{sh} into {mw}x{mh}");
        }
    }

    #[test]
    fn fit_within_never_collapses_thin_sources() {
        let (w, h) = fit_within(2000, 10, 80, 40);
        assert_eq!(w, 80);
        assert!(h >= 1);
    }

    #[test]
    fn ascii_lines_have_requested_shape() {
        let raster = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])));
        let lines = image_to_ascii_lines(&raster, 6, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.chars().count() == 6));
        assert!(lines.iter().all(|line| line.chars().all(|c| c == '@')));
    }

    #[test]
    fn ascii_lines_map_black_to_blank() {
        let raster = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let lines = image_to_ascii_lines(&raster, 4, 4);
        assert!(lines.iter().all(|line| line == "    "));
    }
}
