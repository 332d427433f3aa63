use crate::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

const KEYS: [&str; 7] = [
    "image_size",
    "uv_size",
    "depth_offset",
    "tile_size",
    "pos_mask_threshold",
    "shape_color",
    "shape_light_intensity",
];

/// Render settings of a [`crate::UvRenderer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Edge length of the square image-space frames.
    pub image_size: usize,

    /// Edge length of the square UV-space maps.
    pub uv_size: usize,

    /// Added to transformed z before image-space rasterization, keeping depths positive.
    pub depth_offset: f32,

    /// Edge length of the tiles rasterized in parallel.
    pub tile_size: usize,

    /// Pixels whose transformed normal z lies below this count as front facing.
    pub pos_mask_threshold: f32,

    /// Albedo of shape renderings (RGB)
    pub shape_color: [f32; 3],

    /// Color of each default light of shape renderings
    pub shape_light_intensity: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            image_size: 224,
            uv_size: 256,
            depth_offset: 10.0,
            tile_size: 32,
            pos_mask_threshold: -0.05,
            shape_color: [180.0 / 255.0; 3], // #B4B4B4
            shape_light_intensity: 1.7,
        }
    }
}

impl RenderSettings {
    /// Parse render settings from a TOML string's [render] section.
    ///
    /// Only the keys present in the section are changed; unknown keys are rejected.
    pub fn read(&mut self, toml_content: &str) -> RenderResult<()> {
        let parsed: toml::Value =
            toml::from_str(toml_content).map_err(|err| RenderError::config(err.to_string()))?;

        let section = parsed
            .get("render")
            .and_then(|section| section.as_table())
            .ok_or_else(|| RenderError::config("missing [render] section"))?;

        if let Some(key) = section.keys().find(|key| !KEYS.contains(&key.as_str())) {
            return Err(RenderError::config(format!("unknown key `{key}` in [render]")));
        }

        // Applied only once every key has parsed
        let mut next = self.clone();

        if let Some(size) = section.get("image_size") {
            next.image_size = read_size(size, "image_size")?;
        }

        if let Some(size) = section.get("uv_size") {
            next.uv_size = read_size(size, "uv_size")?;
        }

        if let Some(offset) = section.get("depth_offset") {
            next.depth_offset = read_float(offset, "depth_offset")?;
        }

        if let Some(size) = section.get("tile_size") {
            next.tile_size = read_size(size, "tile_size")?;
        }

        if let Some(threshold) = section.get("pos_mask_threshold") {
            next.pos_mask_threshold = read_float(threshold, "pos_mask_threshold")?;
        }

        if let Some(color) = section.get("shape_color") {
            next.shape_color = match color {
                toml::Value::String(hex) => parse_hex_color(hex)?,
                gray => [read_float(gray, "shape_color")?; 3],
            };
        }

        if let Some(intensity) = section.get("shape_light_intensity") {
            next.shape_light_intensity = read_float(intensity, "shape_light_intensity")?;
        }

        *self = next;
        Ok(())
    }

    /// Default settings updated from the [render] section of a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::default();
        settings.read(&content)?;
        Ok(settings)
    }
}

fn read_float(value: &toml::Value, key: &str) -> RenderResult<f32> {
    match value {
        toml::Value::Float(v) => Ok(*v as f32),
        toml::Value::Integer(v) => Ok(*v as f32),
        _ => Err(RenderError::config(format!("{key} must be a number"))),
    }
}

fn read_size(value: &toml::Value, key: &str) -> RenderResult<usize> {
    value
        .as_integer()
        .filter(|v| *v > 0)
        .map(|v| v as usize)
        .ok_or_else(|| RenderError::config(format!("{key} must be a positive integer")))
}

/// Parse a hex color string like "#RRGGBB" or "RRGGBB" into RGB floats (0.0-1.0)
fn parse_hex_color(hex: &str) -> RenderResult<[f32; 3]> {
    let hex = hex.trim_start_matches('#');

    if hex.len() != 6 || !hex.is_ascii() {
        return Err(RenderError::config(format!(
            "invalid hex color `{hex}`: expected 6 hex digits"
        )));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|err| RenderError::config(format!("invalid hex color `{hex}`: {err}")))
    };

    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}
