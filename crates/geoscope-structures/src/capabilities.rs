//! Behavior shared by quantity types across structures.
//!
//! Each quantity type owns the pieces it needs: a [`ScalarColoring`] for
//! colormapped values, [`COLOR_RULES`] for per-element colors, a
//! [`VectorStyle`] for line glyphs. None of them know which structure the
//! quantity is attached to.

use geoscope_core::{DataType, GeoscopeError, Result, UiBuilder};
use geoscope_render::shaders::{
    LINES, PROPAGATE_COLOR, PROPAGATE_VALUE, SHADE_BASECOLOR, SHADE_COLOR, SHADE_COLORMAP_VALUE,
};
use geoscope_render::{
    ColorMapRegistry, RenderContext, ShaderProgram, ShaderReplacementDefaults,
};
use glam::{Mat4, Vec3};

/// Rules shading geometry with an interpolated per-vertex `a_value`.
pub const SCALAR_RULES: [&str; 2] = [PROPAGATE_VALUE, SHADE_COLORMAP_VALUE];

/// Rules shading geometry with an interpolated per-vertex `a_color`.
pub const COLOR_RULES: [&str; 2] = [PROPAGATE_COLOR, SHADE_COLOR];

/// Color maps offered in quantity panels.
pub const COLORMAP_CHOICES: [&str; 5] = ["viridis", "coolwarm", "blues", "reds", "rainbow"];

/// Sets the camera uniforms every built-in program declares.
pub fn set_view_uniforms(
    program: &mut ShaderProgram,
    ctx: &RenderContext<'_>,
    transform: Mat4,
) -> Result<()> {
    program.set_uniform("u_modelView", ctx.model_view(transform))?;
    program.set_uniform("u_projMatrix", ctx.projection)?;
    Ok(())
}

/// Returns the program in `slot`, building it first if the slot is empty.
pub fn cached_program(
    slot: &mut Option<ShaderProgram>,
    build: impl FnOnce() -> Result<ShaderProgram>,
) -> Result<&mut ShaderProgram> {
    let program = match slot.take() {
        Some(program) => program,
        None => build()?,
    };
    Ok(slot.insert(program))
}

fn finite_range(values: &[f32]) -> (f32, f32) {
    let (lo, hi) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (0.0, 1.0)
    } else {
        (lo, hi)
    }
}

/// Maps scalar values through a named color map over an adjustable range.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarColoring {
    data_type: DataType,
    colormap: String,
    data_range: (f32, f32),
    map_range: (f32, f32),
}

impl ScalarColoring {
    /// Starts with the map range chosen by `data_type` for `values`.
    pub fn new(values: &[f32], data_type: DataType, colormap: impl Into<String>) -> Self {
        let mut coloring = Self {
            data_type,
            colormap: colormap.into(),
            data_range: finite_range(values),
            map_range: (0.0, 1.0),
        };
        coloring.reset_map_range();
        coloring
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn colormap(&self) -> &str {
        &self.colormap
    }

    pub fn set_colormap(&mut self, name: impl Into<String>) {
        self.colormap = name.into();
    }

    /// Smallest and largest finite value of the data.
    pub fn data_range(&self) -> (f32, f32) {
        self.data_range
    }

    /// Values mapped to the two ends of the color map.
    pub fn map_range(&self) -> (f32, f32) {
        self.map_range
    }

    pub fn set_map_range(&mut self, low: f32, high: f32) {
        self.map_range = (low, high);
    }

    /// Restores the map range implied by the data type.
    pub fn reset_map_range(&mut self) {
        let (lo, hi) = self.data_range;
        self.map_range = match self.data_type {
            DataType::Standard => (lo, hi),
            DataType::Symmetric => {
                let m = lo.abs().max(hi.abs());
                (-m, m)
            }
            DataType::Magnitude => (0.0, hi.max(0.0)),
        };
    }

    /// Tracks new data without touching a user-chosen map range.
    pub fn update_data_range(&mut self, values: &[f32]) {
        self.data_range = finite_range(values);
    }

    /// Position of `value` along the color map, clamped to `[0, 1]`.
    pub fn normalized(&self, value: f32) -> f32 {
        let (lo, hi) = self.map_range;
        let span = (hi - lo).max(1e-12);
        ((value - lo) / span).clamp(0.0, 1.0)
    }

    /// Uploads the color map texture into a program composed with [`SCALAR_RULES`].
    pub fn bind_colormap(
        &self,
        program: &mut ShaderProgram,
        color_maps: &ColorMapRegistry,
    ) -> Result<()> {
        let map = color_maps
            .get(&self.colormap)
            .ok_or_else(|| GeoscopeError::ColorMapNotFound(self.colormap.clone()))?;
        program.set_texture_from_colormap("t_colormap", map)?;
        Ok(())
    }

    pub fn set_uniforms(&self, program: &mut ShaderProgram) -> Result<()> {
        program.set_uniform("u_rangeLow", self.map_range.0)?;
        program.set_uniform("u_rangeHigh", self.map_range.1)?;
        Ok(())
    }

    /// Colormap picker and range sliders. Returns whether the color map changed.
    pub fn build_ui(&mut self, ui: &mut dyn UiBuilder) -> bool {
        let mut selected = COLORMAP_CHOICES
            .iter()
            .position(|&c| c == self.colormap)
            .unwrap_or(0);
        let changed = ui.combo("Colormap", &mut selected, &COLORMAP_CHOICES);
        if changed {
            self.colormap = COLORMAP_CHOICES[selected].to_string();
        }

        let (lo, hi) = self.map_range;
        let min = lo.min(self.data_range.0);
        let max = hi.max(self.data_range.1);
        let (mut low, mut high) = self.map_range;
        ui.slider_f32("Range Low", &mut low, min, max);
        ui.slider_f32("Range High", &mut high, min, max);
        self.map_range = (low, high);
        if ui.button("Reset Range") {
            self.reset_map_range();
        }
        changed
    }
}

/// How vector lengths are turned into glyph lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorType {
    /// Rescaled so the longest vector spans a fraction of the structure size.
    #[default]
    Standard,
    /// Drawn at their true length in world units.
    Ambient,
}

/// Display settings for vector glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorStyle {
    pub vector_type: VectorType,
    /// Longest glyph as a fraction of the structure length scale.
    pub length_mult: f32,
    pub radius: f32,
    pub color: Vec3,
}

impl Default for VectorStyle {
    fn default() -> Self {
        Self {
            vector_type: VectorType::Standard,
            length_mult: 0.02,
            radius: 0.0025,
            color: Vec3::new(0.1, 0.1, 0.6),
        }
    }
}

impl VectorStyle {
    pub fn new(vector_type: VectorType) -> Self {
        Self {
            vector_type,
            ..Self::default()
        }
    }

    /// Segment endpoints, two per vector, starting at each root.
    pub fn segments(&self, roots: &[Vec3], vectors: &[Vec3], length_scale: f32) -> Vec<Vec3> {
        let scale = match self.vector_type {
            VectorType::Ambient => 1.0,
            VectorType::Standard => {
                let longest = vectors
                    .iter()
                    .map(|v| v.length())
                    .filter(|l| l.is_finite())
                    .fold(0.0f32, f32::max);
                if longest > 0.0 {
                    self.length_mult * length_scale / longest
                } else {
                    1.0
                }
            }
        };
        roots
            .iter()
            .zip(vectors)
            .flat_map(|(&root, &v)| [root, root + v * scale])
            .collect()
    }

    /// Draws `segments` as colored lines, compiling the program on first use.
    pub fn draw(
        &self,
        program: &mut Option<ShaderProgram>,
        ctx: &RenderContext<'_>,
        transform: Mat4,
        segments: &[Vec3],
    ) -> Result<()> {
        let program = cached_program(program, || {
            Ok(ctx.engine.request_shader(
                LINES,
                &[SHADE_BASECOLOR],
                ShaderReplacementDefaults::SceneObject,
            )?)
        })?;
        program.set_attribute("a_position", segments)?;
        program.set_uniform("u_baseColor", self.color)?;
        set_view_uniforms(program, ctx, transform)?;
        program.draw()?;
        Ok(())
    }

    pub fn build_ui(&mut self, ui: &mut dyn UiBuilder) {
        ui.slider_f32("Length", &mut self.length_mult, 0.0, 0.5);
        ui.slider_f32("Radius", &mut self.radius, 0.0, 0.1);
        ui.color_edit("Color", &mut self.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_core::RecordingUi;

    /// Test the initial map range for each data type.
    #[test]
    fn test_map_range_by_data_type() {
        let values = [-1.0, 3.0, f32::NAN];
        let standard = ScalarColoring::new(&values, DataType::Standard, "viridis");
        assert_eq!(standard.map_range(), (-1.0, 3.0));
        let symmetric = ScalarColoring::new(&values, DataType::Symmetric, "coolwarm");
        assert_eq!(symmetric.map_range(), (-3.0, 3.0));
        let magnitude = ScalarColoring::new(&values, DataType::Magnitude, "blues");
        assert_eq!(magnitude.map_range(), (0.0, 3.0));
        assert_eq!(ScalarColoring::new(&[], DataType::Standard, "viridis").map_range(), (0.0, 1.0));
    }

    /// Test that new data keeps a user-chosen range until reset.
    #[test]
    fn test_update_keeps_user_range() {
        let mut coloring = ScalarColoring::new(&[0.0, 1.0], DataType::Standard, "viridis");
        coloring.set_map_range(0.25, 0.75);
        coloring.update_data_range(&[0.0, 10.0]);
        assert_eq!(coloring.map_range(), (0.25, 0.75));
        assert_eq!(coloring.normalized(0.5), 0.5);
        coloring.reset_map_range();
        assert_eq!(coloring.map_range(), (0.0, 10.0));
    }

    /// Test the colormap picker and reset button.
    #[test]
    fn test_scalar_ui() {
        let mut coloring = ScalarColoring::new(&[2.0, 4.0], DataType::Standard, "viridis");
        coloring.set_map_range(3.0, 3.5);
        let mut ui = RecordingUi::new();
        ui.click("Reset Range");
        assert!(!coloring.build_ui(&mut ui));
        assert_eq!(coloring.map_range(), (2.0, 4.0));
        assert_eq!(ui.labels(), vec!["Reset Range"]);
    }

    /// Test standard vectors are rescaled and ambient vectors are not.
    #[test]
    fn test_vector_segments() {
        let roots = [Vec3::ZERO, Vec3::X];
        let vectors = [Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];

        let standard = VectorStyle {
            length_mult: 0.5,
            ..VectorStyle::default()
        };
        let segments = standard.segments(&roots, &vectors, 4.0);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[1], Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(segments[3], Vec3::new(1.0, 1.0, 0.0));

        let ambient = VectorStyle::new(VectorType::Ambient);
        assert_eq!(ambient.segments(&roots, &vectors, 4.0)[1], Vec3::new(0.0, 2.0, 0.0));
    }
}
