use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PlacementError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelPlacement {
    /// Centroid of each geometry.
    #[default]
    Point,
    /// A point guaranteed to lie inside polygons.
    Interior,
    /// Every vertex of every geometry.
    Vertex,
    /// Text follows line and polygon outlines.
    Line,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub size: f64,
    /// Line advance as a multiple of `size`.
    pub line_height: f64,
    pub wrap_width: Option<f64>,
    pub character_spacing: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "DejaVu Sans, sans-serif".to_string(),
            size: 10.0,
            line_height: 1.2,
            wrap_width: None,
            character_spacing: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementConfig {
    pub placement: LabelPlacement,
    /// Candidate displacements in pixels, tried in order at every point.
    pub offsets: Vec<(f64, f64)>,
    /// When false, a geometry stops offering points after its first success.
    pub place_every_point: bool,
    pub clip: bool,
    pub allow_overlap: bool,
    pub avoid_edges: bool,
    pub largest_bbox_only: bool,
    pub minimum_path_length: f64,
    /// Distance between line positions; `None` uses the path vertices.
    pub line_spacing: Option<f64>,
    /// Degrees.
    pub max_char_angle_delta: f64,
    /// Degrees, point placement only.
    pub orientation: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            placement: LabelPlacement::Point,
            offsets: vec![(0.0, 0.0)],
            place_every_point: true,
            clip: true,
            allow_overlap: false,
            avoid_edges: false,
            largest_bbox_only: true,
            minimum_path_length: 0.0,
            line_spacing: None,
            max_char_angle_delta: 22.5,
            orientation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShieldConfig {
    pub marker: String,
    pub shield_displacement: (f64, f64),
    /// Center the marker on the reference point instead of on the text.
    pub unlock_image: bool,
    pub points_on_line: bool,
    pub marker_scale: f64,
    /// Degrees.
    pub marker_rotation: f64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            marker: String::new(),
            shield_displacement: (0.0, 0.0),
            unlock_image: false,
            points_on_line: true,
            marker_scale: 1.0,
            marker_rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            scale_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub text: TextStyle,
    pub placement: PlacementConfig,
    pub shield: Option<ShieldConfig>,
    pub render: RenderConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(self.text.size > 0.0) {
            return Err(PlacementError::InvalidConfig(format!(
                "text size must be positive, got {}",
                self.text.size
            )));
        }
        if !(self.render.scale_factor > 0.0) {
            return Err(PlacementError::InvalidConfig(format!(
                "scale factor must be positive, got {}",
                self.render.scale_factor
            )));
        }
        if self.placement.offsets.is_empty() {
            return Err(PlacementError::InvalidConfig(
                "offset list must not be empty".to_string(),
            ));
        }
        if let Some(spacing) = self.placement.line_spacing
            && !(spacing > 0.0)
        {
            return Err(PlacementError::InvalidConfig(format!(
                "line spacing must be positive, got {spacing}"
            )));
        }
        Ok(())
    }
}

/// Load a config file, or defaults when `path` is `None`.
///
/// Strict JSON is tried first; JSON5 (comments, trailing commas) is the
/// fallback.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config: Config = match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(json_err) => json5::from_str(&contents).map_err(|json5_err| {
            anyhow::anyhow!(
                "failed to parse {}: {json_err} (json5: {json5_err})",
                path.display()
            )
        })?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_offsets_rejected() {
        let mut config = Config::default();
        config.placement.offsets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"placement": {"placement": "line", "clip": false}}"#)
                .unwrap();
        assert_eq!(config.placement.placement, LabelPlacement::Line);
        assert!(!config.placement.clip);
        assert_eq!(config.placement.offsets, vec![(0.0, 0.0)]);
        assert_eq!(config.text.size, 10.0);
    }

    #[test]
    fn json5_fallback_accepts_comments() {
        let dir = std::env::temp_dir().join(format!("tile-labels-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("labels.json5");
        std::fs::write(
            &path,
            "{\n  // shield setup\n  shield: { marker: 'pin', pointsOnLine: false },\n}\n",
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        let shield = config.shield.unwrap();
        assert_eq!(shield.marker, "pin");
        assert!(!shield.points_on_line);
        assert_eq!(shield.marker_scale, 1.0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.shield.is_none());
    }
}
