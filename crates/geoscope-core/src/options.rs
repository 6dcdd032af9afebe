//! Configuration options for geoscope.

use glam::{Vec3, Vec4};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Session-wide configuration options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Name shown in window titles and log lines.
    pub program_name: String,

    /// Higher values produce more log output (0 = errors only).
    ///
    /// Applied when the session installs the logger; `RUST_LOG` overrides it.
    pub verbosity: u32,

    /// Whether to automatically compute scene extents.
    pub auto_compute_scene_extents: bool,

    /// Color framebuffers are cleared to before a scene draw.
    pub background_color: Vec3,

    /// Color map used by new scalar quantities.
    pub default_colormap: String,

    /// Wrap every scene draw in a backend error scope and fail on captured errors.
    pub enable_render_error_checks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            program_name: "geoscope".to_string(),
            verbosity: 2,
            auto_compute_scene_extents: true,
            background_color: Vec3::new(1.0, 1.0, 1.0),
            default_colormap: "viridis".to_string(),
            enable_render_error_checks: cfg!(debug_assertions),
        }
    }
}

impl Options {
    /// Log filter implied by [`Self::verbosity`].
    pub fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// [`Self::background_color`] as an opaque clear color.
    pub fn clear_color(&self) -> Vec4 {
        self.background_color.extend(1.0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses options, filling omitted fields with their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that options survive a JSON round trip.
    #[test]
    fn test_json_round_trip() {
        let options = Options {
            program_name: "demo".into(),
            verbosity: 4,
            background_color: Vec3::new(0.1, 0.2, 0.3),
            ..Options::default()
        };
        let parsed = Options::from_json(&options.to_json().unwrap()).unwrap();
        assert_eq!(parsed, options);
    }

    /// Test that missing fields take default values.
    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed = Options::from_json(r#"{ "verbosity": 0 }"#).unwrap();
        assert_eq!(parsed.verbosity, 0);
        assert_eq!(parsed.default_colormap, "viridis");
        assert!(Options::from_json("not json").is_err());
    }

    /// Test the verbosity to log level mapping and the clear color.
    #[test]
    fn test_log_level_and_clear_color() {
        let mut options = Options::default();
        assert_eq!(options.log_level(), LevelFilter::Info);
        options.verbosity = 0;
        assert_eq!(options.log_level(), LevelFilter::Error);
        options.verbosity = 9;
        assert_eq!(options.log_level(), LevelFilter::Trace);

        options.background_color = Vec3::new(0.1, 0.2, 0.3);
        assert_eq!(options.clear_color(), Vec4::new(0.1, 0.2, 0.3, 1.0));
    }
}
