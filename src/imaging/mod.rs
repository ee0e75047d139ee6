//! Crop enhancement and the pixel-level heuristics that find handwriting
//! on a binarised band.

use image::{
    imageops::{self, FilterType},
    DynamicImage, GenericImageView, GrayImage, Luma,
};
use imageproc::contrast::{otsu_level, threshold};

use crate::geometry::Roi;

pub const SHARPEN: [f32; 9] = [-1., -1., -1., -1., 12., -1., -1., -1., -1.];
pub const STRONG_SHARPEN: [f32; 9] = [-1., -1., -1., -1., 16., -1., -1., -1., -1.];

/// Luma below which a pixel counts as ink when locating the band.
const INK_LUMA: u8 = 30;
/// Luma below which a pixel counts as part of a printed rule line.
const RULE_LUMA: u8 = 32;
const INK_ROW_RATIO: f32 = 0.12;
const MIN_BAND_ROWS: u32 = 16;
const RULE_FILL_RATIO: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enhancement {
    pub scale_x: f32,
    pub scale_y: f32,
    pub contrast: f32,
    pub sharpen: Option<[f32; 9]>,
    pub binarize: bool,
}

impl Enhancement {
    /// Handwriting crop around a single value.
    pub fn crop(upscale: f32, contrast: f32) -> Enhancement {
        Enhancement {
            scale_x: upscale,
            scale_y: upscale,
            contrast,
            sharpen: Some(SHARPEN),
            binarize: true,
        }
    }

    /// Surname block letters, stretched vertically to open up strokes.
    pub fn surname(upscale: f32, contrast: f32) -> Enhancement {
        Enhancement {
            scale_x: upscale,
            scale_y: upscale * 1.2,
            contrast,
            sharpen: Some(STRONG_SHARPEN),
            binarize: true,
        }
    }

    /// Whole top band, before band detection.
    pub fn band(contrast: f32) -> Enhancement {
        Enhancement {
            scale_x: 1.6,
            scale_y: 1.6,
            contrast,
            sharpen: None,
            binarize: true,
        }
    }
}

/// `roi` cut out of `image`, clamped to its dimensions.
pub fn crop(image: &DynamicImage, roi: &Roi) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    let x = roi.x.max(0) as u32;
    let y = roi.y.max(0) as u32;
    if x >= width || y >= height || roi.is_empty() {
        return None;
    }
    let w = (roi.width as u32).min(width - x);
    let h = (roi.height as u32).min(height - y);
    Some(image.crop_imm(x, y, w, h))
}

pub fn enhance(image: &DynamicImage, enhancement: &Enhancement) -> GrayImage {
    let (width, height) = image.dimensions();
    let w = ((width as f32 * enhancement.scale_x).round() as u32).max(1);
    let h = ((height as f32 * enhancement.scale_y).round() as u32).max(1);
    let gray = image.resize_exact(w, h, FilterType::Triangle).to_luma8();
    let gray = imageops::contrast(&gray, enhancement.contrast);
    let gray = match enhancement.sharpen {
        Some(kernel) => sharpen(&gray, &kernel),
        None => gray,
    };
    if enhancement.binarize {
        binarize(&gray)
    } else {
        gray
    }
}

/// 3x3 convolution normalised by the kernel sum; the one pixel border the
/// kernel cannot reach keeps its original value.
pub fn sharpen(gray: &GrayImage, kernel: &[f32; 9]) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return gray.clone();
    }
    let mut out: GrayImage = imageops::filter3x3(gray, kernel);
    for x in 0..w {
        out.put_pixel(x, 0, *gray.get_pixel(x, 0));
        out.put_pixel(x, h - 1, *gray.get_pixel(x, h - 1));
    }
    for y in 0..h {
        out.put_pixel(0, y, *gray.get_pixel(0, y));
        out.put_pixel(w - 1, y, *gray.get_pixel(w - 1, y));
    }
    out
}

/// Otsu binarisation computed on this image alone: pixels at or below the
/// level turn black, the rest white.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    threshold(gray, otsu_level(gray))
}

fn row_dark_ratio(gray: &GrayImage, y: u32, x0: u32, x1: u32, below: u8) -> f32 {
    if x1 <= x0 {
        return 0.;
    }
    let dark = (x0..x1).filter(|&x| gray.get_pixel(x, y)[0] < below).count();
    dark as f32 / (x1 - x0) as f32
}

/// Rows `[top, bottom)` of a band of writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkBand {
    pub top: u32,
    pub bottom: u32,
}

/// Densest run of inky rows within the central part of `gray`: among runs
/// of at least 16 rows, the one with the highest mean dark ratio. A longer
/// run does not win over a darker one.
pub fn find_ink_band(gray: &GrayImage) -> Option<InkBand> {
    let (w, h) = gray.dimensions();
    let x0 = (w as f32 * 0.03) as u32;
    let x1 = (w as f32 * 0.97) as u32;
    let y0 = (h as f32 * 0.20) as u32;
    let y1 = (h as f32 * 0.80) as u32;

    let mut best: Option<(InkBand, f32)> = None;
    let mut run: Option<(u32, f32)> = None;
    for y in y0..=y1 {
        let ratio = if y < y1 {
            row_dark_ratio(gray, y, x0, x1, INK_LUMA)
        } else {
            0.
        };
        match (ratio >= INK_ROW_RATIO, run) {
            (true, Some((start, sum))) => run = Some((start, sum + ratio)),
            (true, None) => run = Some((y, ratio)),
            (false, Some((start, sum))) => {
                let rows = y - start;
                let mean = sum / rows as f32;
                if rows >= MIN_BAND_ROWS && best.map_or(true, |(_, m)| mean > m) {
                    best = Some((InkBand { top: start, bottom: y }, mean));
                }
                run = None;
            }
            (false, None) => {}
        }
    }
    best.map(|(band, _)| band)
}

/// Pads a detected band and keeps its height within what a handwritten
/// line can occupy on a band of `height` rows, re-centred on its middle.
pub fn fit_band(band: InkBand, height: u32) -> InkBand {
    let top = band.top.saturating_sub(3);
    let bottom = (band.bottom + 6).min(height);
    let current = (bottom - top).max(20);

    let min_h = ((height as f32 * 0.20) as u32).max(55).min(160);
    let cap_h = ((height as f32 * 0.25) as u32).max(30).min(160);
    let target = current.clamp(min_h.min(cap_h), min_h.max(cap_h)).min(height);

    let middle = (top + bottom) / 2;
    let top = middle.saturating_sub(target / 2).min(height - target);
    InkBand {
        top,
        bottom: top + target,
    }
}

/// Whitens rows that are almost entirely dark: printed box borders, not
/// pen strokes.
pub fn whiten_rule_lines(gray: &mut GrayImage) {
    let (w, h) = gray.dimensions();
    for y in 0..h {
        if row_dark_ratio(gray, y, 0, w, RULE_LUMA) > RULE_FILL_RATIO {
            for x in 0..w {
                gray.put_pixel(x, y, Luma([255]));
            }
        }
    }
}

/// The band as scanned and turned a quarter either way.
pub fn rotations(gray: &GrayImage) -> [(u16, GrayImage); 3] {
    [
        (0, gray.clone()),
        (90, imageops::rotate90(gray)),
        (270, imageops::rotate270(gray)),
    ]
}

/// Vertical strip `[from, to)` of `gray` as fractions of its width, grown
/// by `max(2, 3%)` on each side.
pub fn column(gray: &GrayImage, from: f32, to: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let pad = ((w as f32 * 0.03) as u32).max(2);
    let x0 = ((w as f32 * from).round() as u32).saturating_sub(pad);
    let x1 = ((w as f32 * to).round() as u32 + pad).min(w);
    imageops::crop_imm(gray, x0, 0, x1.saturating_sub(x0), h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn white(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255]))
    }

    #[test]
    fn crop_is_clamped() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let roi = Roi {
            x: 80,
            y: 40,
            width: 60,
            height: 30,
        };
        let cropped = crop(&image, &roi).unwrap();
        assert_eq!(cropped.dimensions(), (20, 10));
        let outside = Roi {
            x: 120,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(crop(&image, &outside).is_none());
    }

    #[test]
    fn enhance_upscales_and_binarizes() {
        let mut gray = white(40, 20);
        for x in 10..30 {
            for y in 8..12 {
                gray.put_pixel(x, y, Luma([40]));
            }
        }
        let out = enhance(&DynamicImage::ImageLuma8(gray), &Enhancement::crop(2., 30.));
        assert_eq!(out.dimensions(), (80, 40));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(out.get_pixel(40, 20)[0], 0);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn sharpen_keeps_flat_areas_and_borders() {
        let gray = GrayImage::from_pixel(5, 5, Luma([120]));
        let out = sharpen(&gray, &SHARPEN);
        assert!(out.pixels().all(|p| p[0] == 120));
    }

    #[test]
    fn finds_the_inky_band() {
        let mut gray = white(200, 200);
        for y in 90..120 {
            for x in 20..180 {
                if x % 3 != 0 {
                    gray.put_pixel(x, y, Luma([0]));
                }
            }
        }
        // a short streak is not a band
        for y in 50..55 {
            for x in 0..200 {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        assert_eq!(find_ink_band(&gray), Some(InkBand { top: 90, bottom: 120 }));
        assert_eq!(find_ink_band(&white(200, 200)), None);
    }

    #[test]
    fn darker_band_beats_a_longer_faint_one() {
        let mut gray = white(200, 200);
        for y in 60..100 {
            for x in (0..200).step_by(5) {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 120..140 {
            for x in 20..180 {
                if x % 3 != 0 {
                    gray.put_pixel(x, y, Luma([0]));
                }
            }
        }
        assert_eq!(find_ink_band(&gray), Some(InkBand { top: 120, bottom: 140 }));
    }

    #[test]
    fn fitted_band_stays_inside() {
        let fitted = fit_band(InkBand { top: 90, bottom: 120 }, 200);
        assert!(fitted.bottom <= 200);
        assert_eq!(fitted.bottom - fitted.top, 50);
        assert!(fitted.top <= 87 && fitted.bottom >= 120);
    }

    #[test]
    fn rule_lines_are_whitened() {
        let mut gray = white(50, 10);
        for x in 0..50 {
            gray.put_pixel(x, 3, Luma([0]));
        }
        for x in 0..10 {
            gray.put_pixel(x, 6, Luma([0]));
        }
        whiten_rule_lines(&mut gray);
        assert_eq!(gray.get_pixel(25, 3)[0], 255);
        assert_eq!(gray.get_pixel(5, 6)[0], 0);
    }

    #[test]
    fn rotation_candidates() {
        let gray = white(30, 10);
        let rotated = rotations(&gray);
        assert_eq!(rotated[0].1.dimensions(), (30, 10));
        assert_eq!(rotated[1].0, 90);
        assert_eq!(rotated[1].1.dimensions(), (10, 30));
        assert_eq!(rotated[2].1.dimensions(), (10, 30));
    }

    #[test]
    fn columns_are_padded() {
        let gray = white(100, 10);
        assert_eq!(column(&gray, 0., 0.33).dimensions(), (36, 10));
        assert_eq!(column(&gray, 0.66, 0.88).dimensions(), (28, 10));
    }
}
