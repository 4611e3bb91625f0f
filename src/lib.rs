//! A vector design canvas engine: scene model, transform and grouping
//! algebra, flowchart connectors, snapshot undo/redo, clipboard, viewport,
//! per-image filters and SVG/PNG/JPEG/PDF export.

pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod text_format;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::command_palette::{Command, CommandPalette};
pub use engine::settings::EngineSettings;
pub use engine::{CanvasEngine, EngineEvent};
pub use error::{CanvasError, ExportError};
pub use export::{ExportFormat, ExportRequest, export_snapshot};
pub use model::Document;
