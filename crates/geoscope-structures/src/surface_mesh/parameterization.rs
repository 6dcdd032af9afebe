//! UV parameterizations, drawn as procedural patterns over the surface.

use std::any::Any;
use std::f32::consts::TAU;
use std::rc::Rc;

use geoscope_core::{
    check_size, ElementKind, ManagedBuffer, Quantity, QuantityBase, QuantityKind, Result,
    UiBuilder,
};
use geoscope_render::{AttributeBuffer, Engine, ShaderProgram};
use glam::{Vec2, Vec3};

use super::geometry::MeshGeometry;
use super::quantities::{quantity_header, MeshDraw, MeshQuantity};
use crate::capabilities::{cached_program, COLOR_RULES};

/// How coordinates relate to the pattern cell size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamCoordsType {
    /// Coordinates roughly span `[0, 1]`; cells are sized in coordinate units.
    #[default]
    Unit,
    /// Coordinates are world distances; cells scale with the mesh length scale.
    World,
}

/// Pattern drawn from the coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamVizStyle {
    #[default]
    Checker,
    Grid,
    /// Hue from the angle about the origin, dimmed on alternate checker cells.
    LocalCheck,
    /// Hue from the angle about the origin, dimmed on alternate rings.
    LocalRad,
}

const VIZ_STYLES: [ParamVizStyle; 4] = [
    ParamVizStyle::Checker,
    ParamVizStyle::Grid,
    ParamVizStyle::LocalCheck,
    ParamVizStyle::LocalRad,
];
const VIZ_STYLE_LABELS: [&str; 4] = ["checker", "grid", "local check", "local rad"];

#[allow(clippy::many_single_char_names)]
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let c = v * s;
    let x = c * (1.0 - ((h * 6.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h * 6.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Vec3::new(r + m, g + m, b + m)
}

fn angle_hue(uv: Vec2) -> f32 {
    (uv.y.atan2(uv.x) / TAU).rem_euclid(1.0)
}

/// Pattern settings of a parameterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamStyle {
    pub viz: ParamVizStyle,
    /// Side of one pattern cell.
    pub checker_size: f32,
    pub checker_colors: [Vec3; 2],
    /// Grid line thickness as a fraction of a cell.
    pub grid_line_width: f32,
}

impl Default for ParamStyle {
    fn default() -> Self {
        Self {
            viz: ParamVizStyle::Checker,
            checker_size: 0.1,
            checker_colors: [Vec3::new(1.0, 0.4, 0.4), Vec3::new(0.4, 0.4, 1.0)],
            grid_line_width: 0.02,
        }
    }
}

impl ParamStyle {
    /// Pattern color at `uv` for cells of side `cell`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn color_at(&self, uv: Vec2, cell: f32) -> Vec3 {
        let scaled = uv / cell;
        let even_cell = (scaled.x.floor() as i64 + scaled.y.floor() as i64).rem_euclid(2) == 0;
        let [first, second] = self.checker_colors;
        match self.viz {
            ParamVizStyle::Checker => {
                if even_cell {
                    first
                } else {
                    second
                }
            }
            ParamVizStyle::Grid => {
                let w = self.grid_line_width;
                let on_line = |t: f32| {
                    let f = t - t.floor();
                    f < w || f > 1.0 - w
                };
                if on_line(scaled.x) || on_line(scaled.y) {
                    second
                } else {
                    first
                }
            }
            ParamVizStyle::LocalCheck => {
                let base = hsv_to_rgb(angle_hue(uv), 0.7, 0.9);
                let dim = if even_cell { 1.0 } else { 0.6 };
                base * dim * (1.0 - (-uv.length() * 2.0).exp() * 0.5)
            }
            ParamVizStyle::LocalRad => {
                let even_ring = ((uv.length() / cell).floor() as i64).rem_euclid(2) == 0;
                let dim = if even_ring { 1.0 } else { 0.6 };
                hsv_to_rgb(angle_hue(uv), 0.7, 0.9) * dim
            }
        }
    }

    /// Returns whether anything changed.
    pub fn build_ui(&mut self, ui: &mut dyn UiBuilder) -> bool {
        let mut selected = VIZ_STYLES.iter().position(|&s| s == self.viz).unwrap_or(0);
        let mut changed = ui.combo("Style", &mut selected, &VIZ_STYLE_LABELS);
        self.viz = VIZ_STYLES[selected];
        changed |= ui.slider_f32("Checker Size", &mut self.checker_size, 0.001, 1.0);
        changed |= ui.color_edit("Color A", &mut self.checker_colors[0]);
        changed |= ui.color_edit("Color B", &mut self.checker_colors[1]);
        if self.viz == ParamVizStyle::Grid {
            changed |= ui.slider_f32("Line Width", &mut self.grid_line_width, 0.0, 0.5);
        }
        changed
    }
}

/// UV coordinates on corners or vertices.
///
/// Colors are computed per triangle corner on the host, so the surface is
/// always drawn through the expanded program.
pub struct MeshParameterizationQuantity {
    base: QuantityBase,
    element: ElementKind,
    expected_size: usize,
    coords: ManagedBuffer<Vec2>,
    coords_type: ParamCoordsType,
    style: ParamStyle,
    program: Option<ShaderProgram>,
    // Cell size the bound colors were computed with; `None` when stale.
    colored_cell: Option<f32>,
}

impl MeshParameterizationQuantity {
    pub(crate) fn new(
        name: impl Into<String>,
        element: ElementKind,
        coords: Vec<Vec2>,
        coords_type: ParamCoordsType,
        style: ParamStyle,
    ) -> Self {
        let name = name.into();
        Self {
            base: QuantityBase::new(name.clone(), true),
            element,
            expected_size: coords.len(),
            coords: ManagedBuffer::with_data(name, coords),
            coords_type,
            style,
            program: None,
            colored_cell: None,
        }
    }

    /// Coordinates in caller order, empty while they only live on the device.
    pub fn coords(&self) -> &[Vec2] {
        self.coords.host_data()
    }

    pub fn coord(&self, i: usize) -> Result<Vec2> {
        self.coords.get_value(i)
    }

    pub fn coords_type(&self) -> ParamCoordsType {
        self.coords_type
    }

    pub fn set_coords_type(&mut self, coords_type: ParamCoordsType) -> &mut Self {
        self.coords_type = coords_type;
        self.colored_cell = None;
        self
    }

    pub fn style(&self) -> &ParamStyle {
        &self.style
    }

    pub fn set_style(&mut self, viz: ParamVizStyle) -> &mut Self {
        self.style.viz = viz;
        self.colored_cell = None;
        self
    }

    pub fn set_checker_size(&mut self, size: f32) -> &mut Self {
        self.style.checker_size = size;
        self.colored_cell = None;
        self
    }

    pub fn set_checker_colors(&mut self, colors: [Vec3; 2]) -> &mut Self {
        self.style.checker_colors = colors;
        self.colored_cell = None;
        self
    }

    pub fn set_grid_line_width(&mut self, width: f32) -> &mut Self {
        self.style.grid_line_width = width;
        self.colored_cell = None;
        self
    }

    /// Pattern cell side in coordinate units for a mesh of `length_scale`.
    pub fn cell_size(&self, length_scale: f32) -> f32 {
        let cell = match self.coords_type {
            ParamCoordsType::Unit => self.style.checker_size,
            ParamCoordsType::World => self.style.checker_size * length_scale,
        };
        cell.max(f32::EPSILON)
    }

    /// Pattern colors, three per triangle.
    pub fn corner_colors(&self, geometry: &MeshGeometry, cell: f32) -> Result<Vec<Vec3>> {
        let coords = geometry.gather_corners(self.element, &self.coords.data()?);
        Ok(coords.iter().map(|&uv| self.style.color_at(uv, cell)).collect())
    }

    pub fn update_data(&mut self, coords: Vec<Vec2>) -> Result<()> {
        check_size(self.name(), self.expected_size, coords.len())?;
        self.coords.update_data(coords, self.expected_size)?;
        self.colored_cell = None;
        Ok(())
    }

    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.coords.render_buffer(engine)
    }

    /// Records that the render buffer was written directly; colors are recomputed from it.
    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.coords.mark_externally_updated()?;
        self.colored_cell = None;
        Ok(())
    }
}

impl Quantity for MeshParameterizationQuantity {
    fn base(&self) -> &QuantityBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut QuantityBase {
        &mut self.base
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn kind(&self) -> QuantityKind {
        QuantityKind::Parameterization
    }
    fn data_size(&self) -> Result<usize> {
        self.coords.size()
    }
    fn nice_name(&self) -> String {
        quantity_header(self.name(), self.element, "parameterization")
    }
    fn refresh(&mut self) {
        self.program = None;
    }
    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        if self.style.build_ui(ui) {
            self.colored_cell = None;
        }
    }
}

impl MeshQuantity for MeshParameterizationQuantity {
    fn element(&self) -> ElementKind {
        self.element
    }

    fn draw(&mut self, target: &mut MeshDraw<'_, '_>) -> Result<()> {
        let cell = self.cell_size(target.length_scale);
        let stale = self.program.is_none() || self.colored_cell != Some(cell);
        let colors = if stale {
            Some(self.corner_colors(target.geometry, cell)?)
        } else {
            None
        };
        let program = cached_program(&mut self.program, || {
            target.surface_program(&COLOR_RULES, false)
        })?;
        if let Some(colors) = colors {
            program.set_attribute("a_color", &colors)?;
            self.colored_cell = Some(cell);
        }
        target.submit(program)
    }

    fn describe(
        &self,
        geometry: &MeshGeometry,
        element: ElementKind,
        index: usize,
    ) -> Option<String> {
        if element != self.element {
            return None;
        }
        let uv = self.coords.get_value(geometry.data_index(element, index)).ok()?;
        Some(format!("{}: ({:.4}, {:.4})", self.name(), uv.x, uv.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test checker parity, including negative coordinates.
    #[test]
    fn test_checker_colors() {
        let style = ParamStyle::default();
        let [a, b] = style.checker_colors;
        assert_eq!(style.color_at(Vec2::new(0.05, 0.05), 0.1), a);
        assert_eq!(style.color_at(Vec2::new(0.15, 0.05), 0.1), b);
        assert_eq!(style.color_at(Vec2::new(-0.05, 0.05), 0.1), b);
        assert_eq!(style.color_at(Vec2::new(-0.05, -0.05), 0.1), a);
    }

    /// Test that grid lines sit at cell borders only.
    #[test]
    fn test_grid_lines() {
        let style = ParamStyle {
            viz: ParamVizStyle::Grid,
            grid_line_width: 0.1,
            ..ParamStyle::default()
        };
        let [background, line] = style.checker_colors;
        assert_eq!(style.color_at(Vec2::new(0.5, 0.5), 1.0), background);
        assert_eq!(style.color_at(Vec2::new(2.02, 0.5), 1.0), line);
        assert_eq!(style.color_at(Vec2::new(0.5, -0.03), 1.0), line);
    }

    /// Test that the local styles are hue-coded by angle.
    #[test]
    fn test_local_styles_follow_angle() {
        let style = ParamStyle {
            viz: ParamVizStyle::LocalRad,
            ..ParamStyle::default()
        };
        let east = style.color_at(Vec2::new(0.05, 0.0), 0.1);
        let west = style.color_at(Vec2::new(-0.05, 0.0), 0.1);
        assert_ne!(east, west);
        assert!(east.x > east.y && east.x > east.z, "angle zero is red");
        assert!(hsv_to_rgb(0.999, 0.7, 0.9).max_element() <= 1.0);
    }
}
