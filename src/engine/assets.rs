//! Image loading. Sources are decoded completely before anything is inserted
//! into a document, so a failed load never leaves a partial object behind.

use crate::error::{CanvasError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    DataUri(String),
    Bytes(Vec<u8>),
}

impl ImageSource {
    fn describe(&self) -> String {
        match self {
            ImageSource::Path(p) => p.display().to_string(),
            ImageSource::DataUri(uri) => uri.chars().take(32).collect(),
            ImageSource::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

/// A decoded image ready to embed: the original bytes re-wrapped as a data
/// URI, plus pixel dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedImage {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

pub trait AssetLoader: Send + Sync {
    fn load(&self, source: &ImageSource) -> Result<LoadedImage>;
}

/// Reads files from disk and decodes inline data. No network access.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsLoader;

impl AssetLoader for FsLoader {
    fn load(&self, source: &ImageSource) -> Result<LoadedImage> {
        let fail = |reason: String| CanvasError::Asset {
            source_name: source.describe(),
            reason,
        };
        let bytes = match source {
            ImageSource::Path(path) => std::fs::read(path).map_err(|e| fail(e.to_string()))?,
            ImageSource::DataUri(uri) => decode_data_uri(uri).map_err(fail)?,
            ImageSource::Bytes(bytes) => bytes.clone(),
        };
        encode_loaded(&bytes).map_err(fail)
    }
}

pub fn decode_data_uri(uri: &str) -> std::result::Result<Vec<u8>, String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no payload".to_string())?;
    if !meta.ends_with(";base64") {
        return Err("only base64 data URIs are supported".to_string());
    }
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| e.to_string())
}

fn encode_loaded(bytes: &[u8]) -> std::result::Result<LoadedImage, String> {
    let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())?;
    let mime = format.to_mime_type();
    Ok(LoadedImage {
        data_uri: format!("data:{mime};base64,{}", BASE64_STANDARD.encode(bytes)),
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// Decodes an embedded `data:` URI into RGBA pixels.
pub fn decode_rgba(uri: &str) -> std::result::Result<image::RgbaImage, String> {
    let bytes = decode_data_uri(uri)?;
    image::load_from_memory(&bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| e.to_string())
}

pub fn png_data_uri(img: &image::RgbaImage) -> std::result::Result<String, image::ImageError> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(out.into_inner())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn bytes_become_data_uri() {
        let loaded = FsLoader.load(&ImageSource::Bytes(tiny_png())).unwrap();
        assert!(loaded.data_uri.starts_with("data:image/png;base64,"));
        assert_eq!((loaded.width, loaded.height), (3, 2));
        let again = FsLoader
            .load(&ImageSource::DataUri(loaded.data_uri.clone()))
            .unwrap();
        assert_eq!(again, loaded);
    }

    #[test]
    fn garbage_is_an_asset_error() {
        let err = FsLoader
            .load(&ImageSource::Bytes(b"not an image".to_vec()))
            .unwrap_err();
        assert!(matches!(err, CanvasError::Asset { .. }));
    }

    #[test]
    fn missing_file_is_an_asset_error() {
        let err = FsLoader
            .load(&ImageSource::Path("/definitely/not/here.png".into()))
            .unwrap_err();
        assert!(matches!(err, CanvasError::Asset { .. }));
    }
}
