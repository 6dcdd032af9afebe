//! Color maps for scalar visualization.

use std::collections::BTreeMap;

use glam::Vec3;

const VIRIDIS: &[[f32; 3]] = &[
    [0.267, 0.004, 0.329],
    [0.282, 0.140, 0.457],
    [0.253, 0.265, 0.529],
    [0.206, 0.371, 0.553],
    [0.163, 0.471, 0.558],
    [0.127, 0.566, 0.550],
    [0.134, 0.658, 0.517],
    [0.266, 0.749, 0.440],
    [0.477, 0.821, 0.318],
    [0.741, 0.873, 0.150],
    [0.993, 0.906, 0.144],
];

const COOLWARM: &[[f32; 3]] = &[
    [0.230, 0.299, 0.754],
    [0.552, 0.690, 0.996],
    [0.866, 0.866, 0.866],
    [0.956, 0.604, 0.486],
    [0.706, 0.016, 0.150],
];

const BLUES: &[[f32; 3]] = &[
    [0.969, 0.984, 1.000],
    [0.776, 0.859, 0.937],
    [0.419, 0.682, 0.839],
    [0.129, 0.443, 0.710],
    [0.031, 0.188, 0.420],
];

const REDS: &[[f32; 3]] = &[
    [1.000, 0.961, 0.941],
    [0.988, 0.733, 0.631],
    [0.984, 0.416, 0.290],
    [0.796, 0.094, 0.114],
    [0.404, 0.000, 0.051],
];

const RAINBOW: &[[f32; 3]] = &[
    [0.5, 0.0, 1.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
];

/// A piecewise-linear map from `[0, 1]` to RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    pub name: String,
    /// Evenly spaced control colors.
    pub colors: Vec<Vec3>,
}

impl ColorMap {
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    fn from_table(name: &str, table: &[[f32; 3]]) -> Self {
        Self::new(name, table.iter().copied().map(Vec3::from).collect())
    }

    /// Samples at `t`, clamped to `[0, 1]`.
    pub fn sample(&self, t: f32) -> Vec3 {
        match self.colors.as_slice() {
            [] => Vec3::ZERO,
            [only] => *only,
            colors => {
                let t = t.clamp(0.0, 1.0);
                let n = colors.len() - 1;
                let scaled = t * n as f32;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let idx = (scaled.floor() as usize).min(n - 1);
                colors[idx].lerp(colors[idx + 1], scaled - idx as f32)
            }
        }
    }
}

/// Named color maps available to a session.
#[derive(Debug, Clone)]
pub struct ColorMapRegistry {
    maps: BTreeMap<String, ColorMap>,
}

impl Default for ColorMapRegistry {
    fn default() -> Self {
        let mut registry = Self {
            maps: BTreeMap::new(),
        };
        for (name, table) in [
            ("viridis", VIRIDIS),
            ("coolwarm", COOLWARM),
            ("blues", BLUES),
            ("reds", REDS),
            ("rainbow", RAINBOW),
        ] {
            registry.register(ColorMap::from_table(name, table));
        }
        registry
    }
}

impl ColorMapRegistry {
    /// Creates a registry holding the built-in maps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a map, replacing any map with the same name.
    pub fn register(&mut self, color_map: ColorMap) {
        self.maps.insert(color_map.name.clone(), color_map);
    }

    pub fn get(&self, name: &str) -> Option<&ColorMap> {
        self.maps.get(name)
    }

    /// Map names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test sampling at the ends and the midpoint.
    #[test]
    fn test_sample_endpoints() {
        let map = ColorMap::new("bw", vec![Vec3::ZERO, Vec3::ONE]);
        assert_eq!(map.sample(0.0), Vec3::ZERO);
        assert_eq!(map.sample(1.0), Vec3::ONE);
        assert!((map.sample(0.5) - Vec3::splat(0.5)).length() < 1e-6);
        assert_eq!(map.sample(7.0), Vec3::ONE);
    }

    /// Test that the registry ships the built-in maps in sorted order.
    #[test]
    fn test_registry_defaults() {
        let registry = ColorMapRegistry::new();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["blues", "coolwarm", "rainbow", "reds", "viridis"]);
        assert!(registry.get("viridis").is_some());
    }
}
