use crate::engine::CanvasEngine;
use crate::engine::settings::{EngineSettings, load_settings};
use crate::export::{BackgroundOverride, ExportFormat, ExportRequest, PageSize, RasterEncoding};
use crate::model::Rgba;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "sansuyu-canvas", version, about = "Render canvas documents to SVG, PNG, JPEG or PDF")]
pub struct Args {
    /// Input document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "format", value_enum, default_value = "png")]
    pub format: OutputFormat,

    /// Pixel density multiplier for raster formats
    #[arg(long = "scale", default_value_t = 1.0)]
    pub scale: f32,

    /// JPEG quality (1-100)
    #[arg(long = "quality", default_value_t = 90)]
    pub quality: u8,

    /// Background override: 'keep', 'transparent' or a hex colour
    #[arg(long = "background", default_value = "keep")]
    pub background: String,

    /// Override page size as WIDTHxHEIGHT
    #[arg(long = "size")]
    pub size: Option<String>,

    /// Engine settings (.toml or .json)
    #[arg(long = "settings")]
    pub settings: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Jpeg,
    Pdf,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Pdf => "pdf",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let settings = match args.settings.as_deref() {
        Some(path) => load_settings(path)?,
        None => EngineSettings::default(),
    };

    let json = read_input(args.input.as_deref())?;
    let mut engine = CanvasEngine::with_settings(settings);
    engine.load_json(&json).context("Failed to load document")?;

    let request = build_request(&args)?;
    let bytes = engine.export(&request)?;
    write_output(&bytes, args.output.as_deref(), args.format)
}

pub fn build_request(args: &Args) -> Result<ExportRequest> {
    let format = match args.format {
        OutputFormat::Svg => ExportFormat::Vector,
        OutputFormat::Png => ExportFormat::Raster(RasterEncoding::Png),
        OutputFormat::Jpeg => ExportFormat::Raster(RasterEncoding::Jpeg {
            quality: args.quality,
        }),
        OutputFormat::Pdf => ExportFormat::PagedDocument { page: PageSize::A4 },
    };
    let mut request = ExportRequest::new(format)
        .with_multiplier(args.scale)
        .with_background(parse_background(&args.background)?);
    if let Some(size) = args.size.as_deref() {
        let (w, h) = parse_size(size)?;
        request = request.with_size(w, h);
    }
    Ok(request)
}

fn parse_background(value: &str) -> Result<BackgroundOverride> {
    match value.trim().to_ascii_lowercase().as_str() {
        "keep" => Ok(BackgroundOverride::Keep),
        "transparent" | "none" => Ok(BackgroundOverride::Transparent),
        other => Rgba::from_hex(other)
            .map(BackgroundOverride::Color)
            .ok_or_else(|| anyhow::anyhow!("Invalid background '{value}'")),
    }
}

fn parse_size(value: &str) -> Result<(f32, f32)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("Size must look like WIDTHxHEIGHT, got '{value}'"))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(bytes: &[u8], output: Option<&Path>, format: OutputFormat) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None if format == OutputFormat::Svg => {
            io::stdout().write_all(bytes)?;
        }
        None => {
            return Err(anyhow::anyhow!(
                "Output path required for {} output",
                format.extension()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_background_and_size() {
        assert_eq!(parse_background("keep").unwrap(), BackgroundOverride::Keep);
        assert_eq!(
            parse_background("Transparent").unwrap(),
            BackgroundOverride::Transparent
        );
        assert_eq!(
            parse_background("#ff0000").unwrap(),
            BackgroundOverride::Color(Rgba::rgb(255, 0, 0))
        );
        assert!(parse_background("nope").is_err());
        assert!(parse_background("€€").is_err());
        assert_eq!(parse_size("800x600").unwrap(), (800.0, 600.0));
        assert!(parse_size("800").is_err());
    }

    #[test]
    fn jpeg_args_carry_quality() {
        let args = Args::parse_from(["sansuyu-canvas", "-e", "jpeg", "--quality", "70", "--scale", "2"]);
        let request = build_request(&args).unwrap();
        assert_eq!(
            request.format,
            ExportFormat::Raster(RasterEncoding::Jpeg { quality: 70 })
        );
        assert_eq!(request.size_multiplier, 2.0);
    }
}
