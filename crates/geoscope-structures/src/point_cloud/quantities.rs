//! Point cloud quantity implementations.

use std::any::Any;
use std::rc::Rc;

use geoscope_core::{
    check_size, DataType, ManagedBuffer, Quantity, QuantityBase, QuantityKind, Result, UiBuilder,
};
use geoscope_render::shaders::POINTS;
use geoscope_render::{
    AttributeBuffer, Engine, RenderContext, ShaderProgram, ShaderReplacementDefaults,
};
use glam::{Mat4, Vec3};

use crate::capabilities::{
    cached_program, set_view_uniforms, ScalarColoring, VectorStyle, COLOR_RULES, SCALAR_RULES,
};

/// Everything a quantity needs to draw itself on its point cloud.
pub struct PointDraw<'a, 'r> {
    pub positions: &'a mut ManagedBuffer<Vec3>,
    pub ctx: &'a RenderContext<'r>,
    pub transform: Mat4,
    pub length_scale: f32,
}

impl PointDraw<'_, '_> {
    /// Requests a point program with `rules` and binds the positions.
    pub fn point_program(&mut self, rules: &[&str]) -> Result<ShaderProgram> {
        let mut program = self.ctx.engine.request_shader(
            POINTS,
            rules,
            ShaderReplacementDefaults::SceneObject,
        )?;
        program.set_external_buffer("a_position", self.positions.render_buffer(self.ctx.engine)?)?;
        Ok(program)
    }

    pub fn submit(&self, program: &mut ShaderProgram) -> Result<()> {
        set_view_uniforms(program, self.ctx, self.transform)?;
        program.draw()?;
        Ok(())
    }
}

/// Interface of every quantity a [`PointCloud`](super::PointCloud) holds.
pub trait PointCloudQuantity: Quantity {
    fn draw(&mut self, target: &mut PointDraw<'_, '_>) -> Result<()>;

    /// Text describing this quantity's value at point `index`.
    fn describe(&self, _index: usize) -> Option<String> {
        None
    }
}

/// A scalar quantity on a point cloud.
pub struct PointCloudScalarQuantity {
    base: QuantityBase,
    values: ManagedBuffer<f32>,
    coloring: ScalarColoring,
    program: Option<ShaderProgram>,
}

impl PointCloudScalarQuantity {
    pub(crate) fn new(
        name: impl Into<String>,
        values: Vec<f32>,
        data_type: DataType,
        colormap: &str,
    ) -> Self {
        let name = name.into();
        Self {
            base: QuantityBase::new(name.clone(), true),
            coloring: ScalarColoring::new(&values, data_type, colormap),
            values: ManagedBuffer::with_data(name, values),
            program: None,
        }
    }

    pub fn values(&self) -> &[f32] {
        self.values.host_data()
    }

    pub fn coloring(&self) -> &ScalarColoring {
        &self.coloring
    }

    pub fn set_colormap(&mut self, name: impl Into<String>) -> &mut Self {
        self.coloring.set_colormap(name);
        self.program = None;
        self
    }

    pub fn set_map_range(&mut self, low: f32, high: f32) -> &mut Self {
        self.coloring.set_map_range(low, high);
        self
    }

    pub fn update_data(&mut self, values: Vec<f32>) -> Result<()> {
        let expected = self.values.size()?;
        check_size(self.name(), expected, values.len())?;
        self.coloring.update_data_range(&values);
        self.values.update_data(values, expected)
    }

    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.values.render_buffer(engine)
    }

    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.values.mark_externally_updated()
    }
}

impl Quantity for PointCloudScalarQuantity {
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
        QuantityKind::Scalar
    }
    fn data_size(&self) -> Result<usize> {
        self.values.size()
    }
    fn nice_name(&self) -> String {
        format!("{} (scalar)", self.name())
    }
    fn refresh(&mut self) {
        self.program = None;
    }
    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        if self.coloring.build_ui(ui) {
            self.program = None;
        }
    }
}

impl PointCloudQuantity for PointCloudScalarQuantity {
    fn draw(&mut self, target: &mut PointDraw<'_, '_>) -> Result<()> {
        let engine = target.ctx.engine;
        let (values, coloring) = (&mut self.values, &self.coloring);
        let program = cached_program(&mut self.program, || {
            let mut program = target.point_program(&SCALAR_RULES)?;
            program.set_external_buffer("a_value", values.render_buffer(engine)?)?;
            coloring.bind_colormap(&mut program, target.ctx.color_maps)?;
            Ok(program)
        })?;
        coloring.set_uniforms(program)?;
        target.submit(program)
    }

    fn describe(&self, index: usize) -> Option<String> {
        let value = self.values.get_value(index).ok()?;
        Some(format!("{}: {value}", self.name()))
    }
}

/// A color quantity on a point cloud.
pub struct PointCloudColorQuantity {
    base: QuantityBase,
    colors: ManagedBuffer<Vec3>,
    program: Option<ShaderProgram>,
}

impl PointCloudColorQuantity {
    pub(crate) fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        let name = name.into();
        Self {
            base: QuantityBase::new(name.clone(), true),
            colors: ManagedBuffer::with_data(name, colors),
            program: None,
        }
    }

    pub fn colors(&self) -> &[Vec3] {
        self.colors.host_data()
    }

    pub fn update_data(&mut self, colors: Vec<Vec3>) -> Result<()> {
        let expected = self.colors.size()?;
        self.colors.update_data(colors, expected)
    }

    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.colors.render_buffer(engine)
    }

    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.colors.mark_externally_updated()
    }
}

impl Quantity for PointCloudColorQuantity {
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
        QuantityKind::Color
    }
    fn data_size(&self) -> Result<usize> {
        self.colors.size()
    }
    fn nice_name(&self) -> String {
        format!("{} (color)", self.name())
    }
    fn refresh(&mut self) {
        self.program = None;
    }
}

impl PointCloudQuantity for PointCloudColorQuantity {
    fn draw(&mut self, target: &mut PointDraw<'_, '_>) -> Result<()> {
        let engine = target.ctx.engine;
        let colors = &mut self.colors;
        let program = cached_program(&mut self.program, || {
            let mut program = target.point_program(&COLOR_RULES)?;
            program.set_external_buffer("a_color", colors.render_buffer(engine)?)?;
            Ok(program)
        })?;
        target.submit(program)
    }

    fn describe(&self, index: usize) -> Option<String> {
        let c = self.colors.get_value(index).ok()?;
        Some(format!("{}: ({:.3}, {:.3}, {:.3})", self.name(), c.x, c.y, c.z))
    }
}

/// A vector quantity on a point cloud.
pub struct PointCloudVectorQuantity {
    base: QuantityBase,
    vectors: ManagedBuffer<Vec3>,
    style: VectorStyle,
    program: Option<ShaderProgram>,
}

impl PointCloudVectorQuantity {
    pub(crate) fn new(name: impl Into<String>, vectors: Vec<Vec3>, style: VectorStyle) -> Self {
        let name = name.into();
        Self {
            base: QuantityBase::new(name.clone(), false),
            vectors: ManagedBuffer::with_data(name, vectors),
            style,
            program: None,
        }
    }

    pub fn vectors(&self) -> &[Vec3] {
        self.vectors.host_data()
    }

    pub fn style(&self) -> &VectorStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut VectorStyle {
        &mut self.style
    }

    pub fn update_data(&mut self, vectors: Vec<Vec3>) -> Result<()> {
        let expected = self.vectors.size()?;
        self.vectors.update_data(vectors, expected)
    }

    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.vectors.render_buffer(engine)
    }

    /// Records that the render buffer was written directly; glyphs are read back from it.
    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.vectors.mark_externally_updated()
    }
}

impl Quantity for PointCloudVectorQuantity {
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
        QuantityKind::Vector
    }
    fn data_size(&self) -> Result<usize> {
        self.vectors.size()
    }
    fn nice_name(&self) -> String {
        format!("{} (vector)", self.name())
    }
    fn refresh(&mut self) {
        self.program = None;
    }
    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        self.style.build_ui(ui);
    }
}

impl PointCloudQuantity for PointCloudVectorQuantity {
    fn draw(&mut self, target: &mut PointDraw<'_, '_>) -> Result<()> {
        let roots = target.positions.data()?;
        let vectors = self.vectors.data()?;
        let segments = self.style.segments(&roots, &vectors, target.length_scale);
        self.style
            .draw(&mut self.program, target.ctx, target.transform, &segments)
    }

    fn describe(&self, index: usize) -> Option<String> {
        let v = self.vectors.get_value(index).ok()?;
        Some(format!("{}: ({:.3}, {:.3}, {:.3})", self.name(), v.x, v.y, v.z))
    }
}
