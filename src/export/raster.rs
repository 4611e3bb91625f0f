use crate::error::{ExportError, ExportResult};
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Largest edge we agree to allocate, in device pixels.
const MAX_EDGE: u32 = 16_384;

/// Rasterizes an SVG document, scaling its intrinsic size by `scale`.
pub fn rasterize(svg: &str, scale: f32) -> ExportResult<RgbaImage> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ExportError::InvalidRequest(format!(
            "size multiplier must be positive, got {scale}"
        )));
    }
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options)?;

    let size = tree.size();
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;
    if width == 0 || height == 0 || width > MAX_EDGE || height > MAX_EDGE {
        return Err(ExportError::Pixmap { width, height });
    }
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or(ExportError::Pixmap { width, height })?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let mut img = RgbaImage::new(width, height);
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(img)
}

/// Composites onto opaque white; JPEG has no alpha channel.
pub fn flatten_on_white(img: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    for (dst, src) in out.pixels_mut().zip(img.pixels()) {
        let [r, g, b, a] = src.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgb([blend(r), blend(g), blend(b)]);
    }
    out
}

pub fn encode_png(img: &RgbaImage) -> ExportResult<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub fn encode_jpeg(img: &RgbaImage, quality: u8) -> ExportResult<Vec<u8>> {
    let flat = flatten_on_white(img);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&flat)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="20" viewBox="0 0 10 20"><rect x="0" y="0" width="10" height="20" fill="rgb(255,0,0)"/></svg>"#;

    #[test]
    fn scale_multiplies_pixel_size() {
        let img = rasterize(SQUARE, 2.0).unwrap();
        assert_eq!(img.dimensions(), (20, 40));
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn rejects_bad_multiplier() {
        assert!(matches!(
            rasterize(SQUARE, 0.0),
            Err(ExportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let flat = flatten_on_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn encoders_emit_their_signatures() {
        let img = rasterize(SQUARE, 1.0).unwrap();
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        let jpeg = encode_jpeg(&img, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
