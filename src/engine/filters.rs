//! Per-image filter lists and the raster pipeline that applies them.
//!
//! A filter list only ever holds non-default entries: applying a filter at
//! its default value removes it.

use super::CanvasEngine;
use crate::model::{Filter, FilterKind, ObjectKind};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EPSILON: f32 = 1e-6;

impl FilterKind {
    pub const ALL: [FilterKind; 10] = [
        FilterKind::Brightness,
        FilterKind::Contrast,
        FilterKind::Saturation,
        FilterKind::HueRotation,
        FilterKind::Blur,
        FilterKind::Noise,
        FilterKind::Pixelate,
        FilterKind::Grayscale,
        FilterKind::Sepia,
        FilterKind::Invert,
    ];

    /// Presence toggles carry no parameter.
    pub fn is_toggle(self) -> bool {
        matches!(
            self,
            FilterKind::Grayscale | FilterKind::Sepia | FilterKind::Invert
        )
    }

    pub fn default_value(self) -> f32 {
        match self {
            FilterKind::Pixelate => 1.0,
            _ => 0.0,
        }
    }

    pub fn range(self) -> (f32, f32) {
        match self {
            FilterKind::Brightness
            | FilterKind::Contrast
            | FilterKind::Saturation
            | FilterKind::HueRotation => (-1.0, 1.0),
            FilterKind::Blur => (0.0, 1.0),
            FilterKind::Noise => (0.0, 255.0),
            FilterKind::Pixelate => (1.0, 64.0),
            FilterKind::Grayscale | FilterKind::Sepia | FilterKind::Invert => (0.0, 1.0),
        }
    }

    pub fn from_name(name: &str) -> Option<FilterKind> {
        let name = name.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let kind = match name.as_str() {
            "brightness" => FilterKind::Brightness,
            "contrast" => FilterKind::Contrast,
            "saturation" => FilterKind::Saturation,
            "hue-rotation" | "hue" => FilterKind::HueRotation,
            "blur" => FilterKind::Blur,
            "noise" => FilterKind::Noise,
            "pixelate" => FilterKind::Pixelate,
            "grayscale" | "greyscale" => FilterKind::Grayscale,
            "sepia" => FilterKind::Sepia,
            "invert" => FilterKind::Invert,
            _ => return None,
        };
        Some(kind)
    }
}

/// Inserts, replaces or removes the `kind` entry. Returns whether the list
/// changed.
pub fn apply_filter(filters: &mut Vec<Filter>, kind: FilterKind, value: f32) -> bool {
    let existing = filters.iter().position(|f| f.kind == kind);
    if kind.is_toggle() {
        let present = value.abs() > EPSILON;
        return match (present, existing) {
            (true, None) => {
                filters.push(Filter { kind, value: 1.0 });
                true
            }
            (false, Some(i)) => {
                filters.remove(i);
                true
            }
            _ => false,
        };
    }

    let (lo, hi) = kind.range();
    let value = if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        kind.default_value()
    };
    let is_default = (value - kind.default_value()).abs() <= EPSILON;
    match existing {
        Some(i) if is_default => {
            filters.remove(i);
            true
        }
        Some(i) => {
            if (filters[i].value - value).abs() <= EPSILON {
                return false;
            }
            filters[i].value = value;
            true
        }
        None if is_default => false,
        None => {
            filters.push(Filter { kind, value });
            true
        }
    }
}

pub fn remove_all(filters: &mut Vec<Filter>) -> bool {
    let changed = !filters.is_empty();
    filters.clear();
    changed
}

/// Re-applies every filter in list order to a fresh copy of `source`.
pub fn run_pipeline(source: &RgbaImage, filters: &[Filter]) -> RgbaImage {
    let mut img = source.clone();
    for filter in filters {
        img = apply_one(img, *filter);
    }
    img
}

fn apply_one(mut img: RgbaImage, filter: Filter) -> RgbaImage {
    let v = filter.value;
    match filter.kind {
        FilterKind::Brightness => image::imageops::brighten(&img, (v * 255.0).round() as i32),
        FilterKind::Contrast => image::imageops::contrast(&img, v * 100.0),
        FilterKind::HueRotation => image::imageops::huerotate(&img, (v * 180.0).round() as i32),
        FilterKind::Blur => {
            let sigma = v * 20.0;
            if sigma > EPSILON {
                image::imageops::blur(&img, sigma)
            } else {
                img
            }
        }
        FilterKind::Invert => {
            image::imageops::invert(&mut img);
            img
        }
        FilterKind::Saturation => {
            map_rgb(&mut img, |[r, g, b]| {
                let gray = luma(r, g, b);
                let k = 1.0 + v;
                [gray + (r - gray) * k, gray + (g - gray) * k, gray + (b - gray) * k]
            });
            img
        }
        FilterKind::Grayscale => {
            map_rgb(&mut img, |[r, g, b]| {
                let gray = luma(r, g, b);
                [gray, gray, gray]
            });
            img
        }
        FilterKind::Sepia => {
            map_rgb(&mut img, |[r, g, b]| {
                [
                    0.393 * r + 0.769 * g + 0.189 * b,
                    0.349 * r + 0.686 * g + 0.168 * b,
                    0.272 * r + 0.534 * g + 0.131 * b,
                ]
            });
            img
        }
        FilterKind::Noise => {
            add_noise(&mut img, v);
            img
        }
        FilterKind::Pixelate => pixelate(img, v.round().max(1.0) as u32),
    }
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn map_rgb(img: &mut RgbaImage, f: impl Fn([f32; 3]) -> [f32; 3]) {
    for px in img.pixels_mut() {
        let [r, g, b, a] = px.0;
        let out = f([r as f32, g as f32, b as f32]);
        *px = Rgba([
            out[0].round().clamp(0.0, 255.0) as u8,
            out[1].round().clamp(0.0, 255.0) as u8,
            out[2].round().clamp(0.0, 255.0) as u8,
            a,
        ]);
    }
}

/// Seeded from the amount so equal inputs give equal output.
fn add_noise(img: &mut RgbaImage, amount: f32) {
    let mut rng = StdRng::seed_from_u64(u64::from(amount.to_bits()));
    for px in img.pixels_mut() {
        let delta = (rng.gen_range(0.0..1.0_f32) - 0.5) * amount;
        for c in &mut px.0[..3] {
            *c = (*c as f32 + delta).round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn pixelate(img: RgbaImage, block: u32) -> RgbaImage {
    if block <= 1 {
        return img;
    }
    let (w, h) = img.dimensions();
    let mut out = RgbaImage::new(w, h);
    for by in (0..h).step_by(block as usize) {
        for bx in (0..w).step_by(block as usize) {
            let x_end = (bx + block).min(w);
            let y_end = (by + block).min(h);
            let mut sum = [0u64; 4];
            let mut count = 0u64;
            for y in by..y_end {
                for x in bx..x_end {
                    let p = img.get_pixel(x, y).0;
                    for (s, c) in sum.iter_mut().zip(p) {
                        *s += u64::from(c);
                    }
                    count += 1;
                }
            }
            let avg = Rgba(sum.map(|s| (s / count.max(1)) as u8));
            for y in by..y_end {
                for x in bx..x_end {
                    out.put_pixel(x, y, avg);
                }
            }
        }
    }
    out
}

impl CanvasEngine {
    /// Applies `kind` to every selected image. Records one snapshot if any
    /// list changed.
    pub fn apply_image_filter(&mut self, kind: FilterKind, value: f32) -> bool {
        let changed = self.edit_selected_images(|filters| apply_filter(filters, kind, value));
        if changed {
            tracing::debug!(?kind, value, "Applied image filter");
            self.commit();
        } else {
            tracing::debug!(?kind, value, "Image filter left lists unchanged");
        }
        changed
    }

    pub fn remove_image_filters(&mut self) -> bool {
        let changed = self.edit_selected_images(remove_all);
        if changed {
            self.commit();
        }
        changed
    }

    fn edit_selected_images(&mut self, mut f: impl FnMut(&mut Vec<Filter>) -> bool) -> bool {
        let ids = self.selected_ids();
        let mut changed = false;
        for id in ids {
            let Some(object) = self.doc.find_mut(id) else {
                continue;
            };
            if let ObjectKind::Image { image } = &mut object.kind {
                changed |= f(&mut image.filters);
            }
        }
        changed
    }
}
