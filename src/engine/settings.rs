use crate::error::{CanvasError, Result};
use crate::model::{self, HeadStyle, LineStyle, Rgba};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Style applied to newly created connectors.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectorDefaults {
    pub color: Rgba,
    pub stroke_width: f32,
    pub line_style: LineStyle,
    pub head_style: HeadStyle,
    pub has_start_head: bool,
}

impl Default for ConnectorDefaults {
    fn default() -> Self {
        Self {
            color: Rgba::rgb(30, 30, 30),
            stroke_width: 2.0,
            line_style: LineStyle::Solid,
            head_style: HeadStyle::Filled,
            has_start_head: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub history_capacity: usize,
    pub paste_offset: f32,
    pub hover_radius: f32,
    pub port_snap_radius: f32,
    pub end_snap_radius: f32,
    pub min_connector_length: f32,
    pub head_pick_radius: f32,
    pub elbow_threshold: f32,
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub fit_padding: f32,
    pub fit_retry_attempts: u32,
    pub document_width: f32,
    pub document_height: f32,
    pub background: model::Background,
    pub connector: ConnectorDefaults,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            paste_offset: 20.0,
            hover_radius: 22.0,
            port_snap_radius: 22.0,
            end_snap_radius: 25.0,
            min_connector_length: 25.0,
            head_pick_radius: 18.0,
            elbow_threshold: 18.0,
            zoom_step: 1.2,
            min_zoom: 0.1,
            max_zoom: 8.0,
            fit_padding: 40.0,
            fit_retry_attempts: 5,
            document_width: 1080.0,
            document_height: 1080.0,
            background: model::Background::default(),
            connector: ConnectorDefaults::default(),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

/// Reads settings from TOML or JSON, trying the other format when the
/// extension guess fails.
pub fn load_settings(path: impl AsRef<Path>) -> Result<EngineSettings> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)?;
    let parsed = if is_toml(path) {
        toml::from_str::<EngineSettings>(&s)
            .ok()
            .or_else(|| serde_json::from_str::<EngineSettings>(&s).ok())
    } else {
        serde_json::from_str::<EngineSettings>(&s)
            .ok()
            .or_else(|| toml::from_str::<EngineSettings>(&s).ok())
    };
    let settings = parsed.ok_or_else(|| {
        CanvasError::Settings(format!("{} is neither valid TOML nor JSON", path.display()))
    })?;
    tracing::info!(path = %path.display(), "Loaded engine settings");
    Ok(settings)
}

pub fn save_settings(path: impl AsRef<Path>, settings: &EngineSettings) -> Result<()> {
    let path = path.as_ref();
    let text = if is_toml(path) {
        toml::to_string_pretty(settings).map_err(|e| CanvasError::Settings(e.to_string()))?
    } else {
        serde_json::to_string_pretty(settings)?
    };
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings: EngineSettings = toml::from_str("paste_offset = 8.0\n").unwrap();
        assert_eq!(settings.paste_offset, 8.0);
        assert_eq!(settings.history_capacity, 100);
        assert_eq!(settings.connector, ConnectorDefaults::default());
    }

    #[test]
    fn save_then_load_both_formats() {
        let dir = std::env::temp_dir().join(format!("sansuyu-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let settings = EngineSettings {
            zoom_step: 1.5,
            fit_retry_attempts: 3,
            ..EngineSettings::default()
        };
        for name in ["settings.toml", "settings.json"] {
            let path = dir.join(name);
            save_settings(&path, &settings).unwrap();
            assert_eq!(load_settings(&path).unwrap(), settings);
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn garbage_is_a_settings_error() {
        let path = std::env::temp_dir().join(format!("sansuyu-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{{ nope").unwrap();
        assert!(matches!(load_settings(&path), Err(CanvasError::Settings(_))));
        std::fs::remove_file(&path).ok();
    }
}
