//! Multi-format export.
//!
//! Every export renders a serialized copy of the document inside its own
//! off-screen engine, so the live session (selection, viewport, history) is
//! never touched and a failed export leaves nothing behind.

use crate::engine::CanvasEngine;
use crate::engine::actions::BackgroundSource;
use crate::error::{ExportError, ExportResult};
use crate::model::{Background, Document, Rgba};

pub mod pdf;
pub mod raster;
pub mod svg;

pub use pdf::PageSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterEncoding {
    Png,
    /// Quality 1..=100.
    Jpeg { quality: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExportFormat {
    Raster(RasterEncoding),
    Vector,
    /// A one-page PDF embedding a JPEG raster of the page.
    PagedDocument { page: PageSize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum BackgroundOverride {
    #[default]
    Keep,
    Color(Rgba),
    Transparent,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    /// Pixel density for raster output; vector output ignores it.
    pub size_multiplier: f32,
    /// Replaces the document's width and height for this export only.
    pub size: Option<(f32, f32)>,
    pub background: BackgroundOverride,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            format: ExportFormat::Raster(RasterEncoding::Png),
            size_multiplier: 1.0,
            size: None,
            background: BackgroundOverride::Keep,
        }
    }
}

impl ExportRequest {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, size_multiplier: f32) -> Self {
        self.size_multiplier = size_multiplier;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn with_background(mut self, background: BackgroundOverride) -> Self {
        self.background = background;
        self
    }

    fn is_jpeg_based(&self) -> bool {
        matches!(
            self.format,
            ExportFormat::Raster(RasterEncoding::Jpeg { .. }) | ExportFormat::PagedDocument { .. }
        )
    }
}

/// Loads a serialized copy of `snapshot` into an isolated engine and applies
/// the request's size and background overrides to it.
fn prepare(snapshot: &Document, request: &ExportRequest) -> ExportResult<CanvasEngine> {
    let json = serde_json::to_string(snapshot)?;
    let copy: Document = serde_json::from_str(&json)?;
    let mut engine = CanvasEngine::offscreen(copy);

    if let Some((width, height)) = request.size {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(ExportError::InvalidRequest(format!(
                "invalid export size {width}x{height}"
            )));
        }
        engine.resize_document(width, height);
    }
    let background = match request.background {
        BackgroundOverride::Keep => None,
        BackgroundOverride::Color(color) => Some(BackgroundSource::Color(color)),
        BackgroundOverride::Transparent => Some(BackgroundSource::Transparent),
    };
    if let Some(background) = background {
        engine
            .set_background(background)
            .map_err(|e| ExportError::InvalidRequest(e.to_string()))?;
    }
    if request.is_jpeg_based() && engine.document().background == Background::Transparent {
        engine
            .set_background(BackgroundSource::Color(Rgba::WHITE))
            .map_err(|e| ExportError::InvalidRequest(e.to_string()))?;
    }
    Ok(engine)
}

/// Renders `snapshot` according to `request`. Owns nothing but its input,
/// so hosts may call it from a worker thread.
pub fn export_snapshot(snapshot: &Document, request: &ExportRequest) -> ExportResult<Vec<u8>> {
    let engine = prepare(snapshot, request)?;
    let doc = engine.document();
    let svg = svg::document_to_svg(doc)?;
    let bytes = match request.format {
        ExportFormat::Vector => svg.into_bytes(),
        ExportFormat::Raster(RasterEncoding::Png) => {
            raster::encode_png(&raster::rasterize(&svg, request.size_multiplier)?)?
        }
        ExportFormat::Raster(RasterEncoding::Jpeg { quality }) => {
            raster::encode_jpeg(&raster::rasterize(&svg, request.size_multiplier)?, quality)?
        }
        ExportFormat::PagedDocument { page } => {
            let img = raster::rasterize(&svg, request.size_multiplier)?;
            let jpeg = raster::encode_jpeg(&img, 92)?;
            pdf::single_page_pdf(jpeg, img.width(), img.height(), doc.width, doc.height, page)?
        }
    };
    Ok(bytes)
}

impl CanvasEngine {
    /// Exports the current document. Borrows the engine immutably; the live
    /// session is never modified, even on failure.
    pub fn export(&self, request: &ExportRequest) -> ExportResult<Vec<u8>> {
        match export_snapshot(self.document(), request) {
            Ok(bytes) => {
                tracing::info!(format = ?request.format, bytes = bytes.len(), "Exported document");
                Ok(bytes)
            }
            Err(e) => {
                tracing::error!("Export failed: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actions::ShapeKind;

    #[test]
    fn jpeg_forces_white_background() {
        let mut doc = Document::new(100.0, 100.0);
        doc.background = Background::Transparent;
        let request = ExportRequest::new(ExportFormat::Raster(RasterEncoding::Jpeg { quality: 90 }));
        let engine = prepare(&doc, &request).unwrap();
        assert_eq!(
            engine.document().background,
            Background::Color { color: Rgba::WHITE }
        );

        let png = ExportRequest::default().with_background(BackgroundOverride::Transparent);
        let engine = prepare(&Document::new(100.0, 100.0), &png).unwrap();
        assert_eq!(engine.document().background, Background::Transparent);
    }

    #[test]
    fn size_override_applies_to_the_copy_only() {
        let mut live = CanvasEngine::new();
        live.add_shape(ShapeKind::Rectangle);
        let before = live.to_json().unwrap();
        let request = ExportRequest::new(ExportFormat::Vector).with_size(300.0, 200.0);
        let svg = String::from_utf8(live.export(&request).unwrap()).unwrap();
        assert!(svg.contains(r#"viewBox="0 0 300.000 200.000""#));
        assert_eq!(live.to_json().unwrap(), before);
    }

    #[test]
    fn invalid_size_is_rejected() {
        let request = ExportRequest::new(ExportFormat::Vector).with_size(-1.0, 10.0);
        assert!(matches!(
            export_snapshot(&Document::new(10.0, 10.0), &request),
            Err(ExportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn png_respects_multiplier() {
        let request = ExportRequest::default().with_multiplier(2.0);
        let bytes = export_snapshot(&Document::new(50.0, 40.0), &request).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (100, 80));
    }
}
