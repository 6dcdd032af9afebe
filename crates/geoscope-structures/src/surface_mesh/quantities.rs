//! Quantities attached to surface meshes.

use std::any::Any;
use std::rc::Rc;

use geoscope_core::{
    check_size, DataType, ElementKind, ManagedBuffer, Quantity, QuantityBase, QuantityKind,
    Result, UiBuilder,
};
use geoscope_render::shaders::{MESH, MESH_EXPANDED};
use geoscope_render::{
    AttributeBuffer, Engine, RenderContext, ShaderProgram, ShaderReplacementDefaults,
};
use glam::{Mat4, Vec3};

use super::geometry::MeshGeometry;
use super::MeshStyle;
use crate::capabilities::{
    cached_program, set_view_uniforms, ScalarColoring, VectorStyle, COLOR_RULES, SCALAR_RULES,
};

/// Everything a quantity needs to draw itself on its mesh.
pub struct MeshDraw<'a, 'r> {
    pub geometry: &'a mut MeshGeometry,
    pub ctx: &'a RenderContext<'r>,
    pub transform: Mat4,
    pub style: &'a MeshStyle,
    pub length_scale: f32,
}

impl MeshDraw<'_, '_> {
    /// Requests a surface program with the mesh style rules appended to `rules`
    /// and binds the mesh geometry to it.
    ///
    /// Indexed programs draw shared vertices; expanded programs take one
    /// attribute entry per triangle corner.
    pub fn surface_program(&mut self, rules: &[&str], indexed: bool) -> Result<ShaderProgram> {
        let mut all_rules = rules.to_vec();
        all_rules.extend(self.style.rules());
        let name = if indexed { MESH } else { MESH_EXPANDED };
        let mut program = self.ctx.engine.request_shader(
            name,
            &all_rules,
            ShaderReplacementDefaults::SceneObject,
        )?;
        bind_surface_geometry(self.geometry, self.ctx.engine, &mut program, indexed)?;
        Ok(program)
    }

    /// Sets camera and style uniforms, then draws.
    pub fn submit(&self, program: &mut ShaderProgram) -> Result<()> {
        set_view_uniforms(program, self.ctx, self.transform)?;
        self.style.set_uniforms(program)?;
        program.draw()?;
        Ok(())
    }
}

pub(crate) fn bind_surface_geometry(
    geometry: &mut MeshGeometry,
    engine: &dyn Engine,
    program: &mut ShaderProgram,
    indexed: bool,
) -> Result<()> {
    if indexed {
        geometry.ensure_vertex_normals()?;
        geometry.ensure_index_buffers()?;
        program.set_external_buffer(
            "a_vertexPositions",
            geometry.vertex_positions.render_buffer(engine)?,
        )?;
        program.set_external_buffer(
            "a_vertexNormals",
            geometry.vertex_normals.render_buffer(engine)?,
        )?;
        program.set_index_buffer(geometry.triangle_indices.render_buffer(engine)?)?;
    } else {
        geometry.ensure_corner_geometry()?;
        program.set_external_buffer(
            "a_vertexPositions",
            geometry.corner_positions.render_buffer(engine)?,
        )?;
        program.set_external_buffer(
            "a_vertexNormals",
            geometry.corner_normals.render_buffer(engine)?,
        )?;
    }
    Ok(())
}

/// Interface of every quantity a [`SurfaceMesh`](super::SurfaceMesh) holds.
pub trait MeshQuantity: Quantity {
    /// The element kind the data is defined on.
    fn element(&self) -> ElementKind;

    fn draw(&mut self, target: &mut MeshDraw<'_, '_>) -> Result<()>;

    /// Text describing this quantity's value at internal element `index`, if it
    /// is defined on `element`.
    fn describe(
        &self,
        _geometry: &MeshGeometry,
        _element: ElementKind,
        _index: usize,
    ) -> Option<String> {
        None
    }
}

/// Glyph roots in internal order: face centers for faces, else vertex positions.
pub(crate) fn element_roots(geometry: &mut MeshGeometry, element: ElementKind) -> Result<Vec<Vec3>> {
    if element == ElementKind::Face {
        geometry.ensure_face_centers()?;
        return Ok(geometry.face_centers.data()?.into_owned());
    }
    Ok(geometry.vertex_positions.data()?.into_owned())
}

/// Header label such as `"height (vertex scalar)"`.
pub(crate) fn quantity_header(name: &str, element: ElementKind, what: &str) -> String {
    format!("{name} ({element} {what})")
}

/// Colormapped scalar values on any mesh element.
pub struct MeshScalarQuantity {
    base: QuantityBase,
    element: ElementKind,
    label: &'static str,
    expected_size: usize,
    values: ManagedBuffer<f32>,
    coloring: ScalarColoring,
    program: Option<ShaderProgram>,
    program_gathered: bool,
}

impl MeshScalarQuantity {
    pub(crate) fn new(
        name: impl Into<String>,
        element: ElementKind,
        values: Vec<f32>,
        data_type: DataType,
        colormap: &str,
    ) -> Self {
        let name = name.into();
        let coloring = ScalarColoring::new(&values, data_type, colormap);
        Self {
            base: QuantityBase::new(name.clone(), true),
            element,
            label: "scalar",
            expected_size: values.len(),
            values: ManagedBuffer::with_data(name, values),
            coloring,
            program: None,
            program_gathered: false,
        }
    }

    /// Relabels the quantity, e.g. as a distance.
    pub(crate) fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.coloring.data_type()
    }

    /// Values in caller order, empty while they only live on the device.
    pub fn values(&self) -> &[f32] {
        self.values.host_data()
    }

    pub fn value(&self, i: usize) -> Result<f32> {
        self.values.get_value(i)
    }

    pub fn coloring(&self) -> &ScalarColoring {
        &self.coloring
    }

    pub fn colormap(&self) -> &str {
        self.coloring.colormap()
    }

    /// Switches color maps; the new map is bound on the next draw.
    pub fn set_colormap(&mut self, name: impl Into<String>) -> &mut Self {
        self.coloring.set_colormap(name);
        self.program = None;
        self
    }

    pub fn map_range(&self) -> (f32, f32) {
        self.coloring.map_range()
    }

    pub fn set_map_range(&mut self, low: f32, high: f32) -> &mut Self {
        self.coloring.set_map_range(low, high);
        self
    }

    pub fn reset_map_range(&mut self) -> &mut Self {
        self.coloring.reset_map_range();
        self
    }

    /// Replaces the values, keeping their length.
    pub fn update_data(&mut self, values: Vec<f32>) -> Result<()> {
        check_size(self.name(), self.expected_size, values.len())?;
        self.coloring.update_data_range(&values);
        self.values.update_data(values, self.expected_size)?;
        if self.program_gathered {
            self.program = None;
        }
        Ok(())
    }

    /// Render buffer holding the values in caller order.
    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.values.render_buffer(engine)
    }

    /// Records that the render buffer was written directly; host values are dropped.
    ///
    /// Gathered programs hold their own corner copy, so the program is rebuilt
    /// from a readback on the next draw.
    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.values.mark_externally_updated()?;
        self.program = None;
        Ok(())
    }
}

impl Quantity for MeshScalarQuantity {
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
        quantity_header(self.name(), self.element, self.label)
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

impl MeshQuantity for MeshScalarQuantity {
    fn element(&self) -> ElementKind {
        self.element
    }

    fn draw(&mut self, target: &mut MeshDraw<'_, '_>) -> Result<()> {
        let indexed = self.element == ElementKind::Vertex && target.geometry.shares_vertex_order();
        let engine = target.ctx.engine;
        let (values, coloring) = (&mut self.values, &self.coloring);
        let program = cached_program(&mut self.program, || {
            let mut program = target.surface_program(&SCALAR_RULES, indexed)?;
            if indexed {
                program.set_external_buffer("a_value", values.render_buffer(engine)?)?;
            } else {
                let corners = target
                    .geometry
                    .gather_corners(self.element, &values.data()?);
                program.set_attribute("a_value", &corners)?;
            }
            coloring.bind_colormap(&mut program, target.ctx.color_maps)?;
            Ok(program)
        })?;
        self.program_gathered = !indexed;
        coloring.set_uniforms(program)?;
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
        let value = self.values.get_value(geometry.data_index(element, index)).ok()?;
        Some(format!("{}: {value}", self.name()))
    }
}

/// Per-element RGB colors on vertices or faces.
pub struct MeshColorQuantity {
    base: QuantityBase,
    element: ElementKind,
    expected_size: usize,
    colors: ManagedBuffer<Vec3>,
    program: Option<ShaderProgram>,
    program_gathered: bool,
}

impl MeshColorQuantity {
    pub(crate) fn new(name: impl Into<String>, element: ElementKind, colors: Vec<Vec3>) -> Self {
        let name = name.into();
        Self {
            base: QuantityBase::new(name.clone(), true),
            element,
            expected_size: colors.len(),
            colors: ManagedBuffer::with_data(name, colors),
            program: None,
            program_gathered: false,
        }
    }

    pub fn colors(&self) -> &[Vec3] {
        self.colors.host_data()
    }

    pub fn update_data(&mut self, colors: Vec<Vec3>) -> Result<()> {
        self.colors.update_data(colors, self.expected_size)?;
        if self.program_gathered {
            self.program = None;
        }
        Ok(())
    }

    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.colors.render_buffer(engine)
    }

    /// Records that the render buffer was written directly; host colors are dropped.
    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.colors.mark_externally_updated()?;
        self.program = None;
        Ok(())
    }
}

impl Quantity for MeshColorQuantity {
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
        quantity_header(self.name(), self.element, "color")
    }
    fn refresh(&mut self) {
        self.program = None;
    }
}

impl MeshQuantity for MeshColorQuantity {
    fn element(&self) -> ElementKind {
        self.element
    }

    fn draw(&mut self, target: &mut MeshDraw<'_, '_>) -> Result<()> {
        let indexed = self.element == ElementKind::Vertex && target.geometry.shares_vertex_order();
        let engine = target.ctx.engine;
        let colors = &mut self.colors;
        let element = self.element;
        let program = cached_program(&mut self.program, || {
            let mut program = target.surface_program(&COLOR_RULES, indexed)?;
            if indexed {
                program.set_external_buffer("a_color", colors.render_buffer(engine)?)?;
            } else {
                let corners = target
                    .geometry
                    .gather_corners(element, &colors.data()?);
                program.set_attribute("a_color", &corners)?;
            }
            Ok(program)
        })?;
        self.program_gathered = !indexed;
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
        let c = self.colors.get_value(geometry.data_index(element, index)).ok()?;
        Some(format!("{}: ({:.3}, {:.3}, {:.3})", self.name(), c.x, c.y, c.z))
    }
}

/// Vectors rooted at vertices or face centers, drawn as line glyphs.
pub struct MeshVectorQuantity {
    base: QuantityBase,
    element: ElementKind,
    expected_size: usize,
    vectors: ManagedBuffer<Vec3>,
    style: VectorStyle,
    program: Option<ShaderProgram>,
}

impl MeshVectorQuantity {
    pub(crate) fn new(
        name: impl Into<String>,
        element: ElementKind,
        vectors: Vec<Vec3>,
        style: VectorStyle,
    ) -> Self {
        let name = name.into();
        Self {
            base: QuantityBase::new(name.clone(), false),
            element,
            expected_size: vectors.len(),
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
        self.vectors.update_data(vectors, self.expected_size)
    }

    /// Render buffer holding the vectors in caller order.
    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.vectors.render_buffer(engine)
    }

    /// Records that the render buffer was written directly; host vectors are dropped.
    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.vectors.mark_externally_updated()
    }

    /// Segment endpoints in internal element order.
    pub fn segments(&self, geometry: &mut MeshGeometry, length_scale: f32) -> Result<Vec<Vec3>> {
        let vectors = geometry.gather_elements(self.element, &self.vectors.data()?);
        let roots = element_roots(geometry, self.element)?;
        Ok(self.style.segments(&roots, &vectors, length_scale))
    }
}

impl Quantity for MeshVectorQuantity {
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
        quantity_header(self.name(), self.element, "vector")
    }
    fn refresh(&mut self) {
        self.program = None;
    }
    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        self.style.build_ui(ui);
    }
}

impl MeshQuantity for MeshVectorQuantity {
    fn element(&self) -> ElementKind {
        self.element
    }

    fn draw(&mut self, target: &mut MeshDraw<'_, '_>) -> Result<()> {
        let segments = self.segments(target.geometry, target.length_scale)?;
        self.style
            .draw(&mut self.program, target.ctx, target.transform, &segments)
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
        let v = self.vectors.get_value(geometry.data_index(element, index)).ok()?;
        Some(format!("{}: ({:.3}, {:.3}, {:.3})", self.name(), v.x, v.y, v.z))
    }
}
