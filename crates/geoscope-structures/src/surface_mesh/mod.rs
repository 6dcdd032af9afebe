//! Surface mesh structure.

mod geometry;
mod intrinsic_vectors;
mod parameterization;
mod quantities;
mod quantity_methods;

pub use geometry::{
    compute_edge_lengths, compute_face_areas, compute_face_centers, compute_face_normals,
    compute_face_tangent_basis, compute_vertex_areas, compute_vertex_normals,
    compute_vertex_tangent_basis, Connectivity, MeshGeometry,
};
pub use intrinsic_vectors::MeshIntrinsicVectorQuantity;
pub use parameterization::{
    MeshParameterizationQuantity, ParamCoordsType, ParamStyle, ParamVizStyle,
};
pub use quantities::{
    MeshColorQuantity, MeshDraw, MeshQuantity, MeshScalarQuantity, MeshVectorQuantity,
};

use std::any::Any;
use std::rc::Rc;

use geoscope_core::{
    bounds_of, ElementKind, GeoscopeError, Quantity, QuantityMap, Residency, Result, Structure,
    StructureBase, StructureKind, UiBuilder,
};
use geoscope_render::shaders::{
    LINES, MESH_BACKFACE_CULL, MESH_BACKFACE_DIFFERENT, MESH_BACKFACE_FLIP, MESH_EDGES,
    MESH_EXPANDED, MESH_FLAT_SHADE, POINTS, SHADE_BASECOLOR,
};
use geoscope_render::{
    index_to_color, AttributeBuffer, Engine, RenderContext, ShaderProgram,
    ShaderReplacementDefaults,
};
use glam::{Mat4, Vec3};

use crate::capabilities::{cached_program, set_view_uniforms, COLOR_RULES};
use quantities::bind_surface_geometry;

/// Shading style for surface mesh rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadeStyle {
    /// Smooth shading using interpolated vertex normals.
    #[default]
    Smooth,
    /// Flat shading using face normals.
    Flat,
}

/// Policy for rendering backfaces of the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackfacePolicy {
    /// Backfaces rendered identically to front faces.
    #[default]
    Identical,
    /// Backfaces rendered with a different (darker) shade.
    Different,
    /// Backfaces rendered with a custom color.
    Custom,
    /// Backfaces are culled (not rendered).
    Cull,
}

/// Materials offered in the mesh panel.
pub const MATERIAL_CHOICES: [&str; 4] = ["clay", "wax", "candy", "flat"];

/// Visual settings of a surface mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshStyle {
    pub surface_color: Vec3,
    pub edge_color: Vec3,
    pub edge_width: f32,
    pub show_edges: bool,
    pub material: String,
    pub backface_policy: BackfacePolicy,
    pub backface_color: Vec3,
    pub shade_style: ShadeStyle,
}

impl Default for MeshStyle {
    fn default() -> Self {
        Self {
            surface_color: Vec3::new(0.5, 0.5, 0.8),
            edge_color: Vec3::ZERO,
            edge_width: 1.0,
            show_edges: false,
            material: "clay".to_string(),
            backface_policy: BackfacePolicy::default(),
            backface_color: Vec3::new(0.3, 0.3, 0.3),
            shade_style: ShadeStyle::default(),
        }
    }
}

impl MeshStyle {
    /// Shader rules implied by the shade style and backface policy.
    pub fn rules(&self) -> Vec<&'static str> {
        let mut rules = Vec::new();
        if self.shade_style == ShadeStyle::Flat {
            rules.push(MESH_FLAT_SHADE);
        }
        rules.push(match self.backface_policy {
            BackfacePolicy::Identical => MESH_BACKFACE_FLIP,
            BackfacePolicy::Different | BackfacePolicy::Custom => MESH_BACKFACE_DIFFERENT,
            BackfacePolicy::Cull => MESH_BACKFACE_CULL,
        });
        rules
    }

    /// Color drawn on backfaces, if the policy gives them their own.
    pub fn effective_backface_color(&self) -> Option<Vec3> {
        match self.backface_policy {
            BackfacePolicy::Different => Some(self.surface_color * 0.5),
            BackfacePolicy::Custom => Some(self.backface_color),
            BackfacePolicy::Identical | BackfacePolicy::Cull => None,
        }
    }

    pub fn set_uniforms(&self, program: &mut ShaderProgram) -> Result<()> {
        if let Some(color) = self.effective_backface_color() {
            program.set_uniform("u_backfaceColor", color)?;
        }
        Ok(())
    }

    fn draws_edges(&self) -> bool {
        self.show_edges && self.edge_width > 0.0
    }
}

/// Pairs [`SurfaceMesh`] with [`MeshQuantity`].
pub struct SurfaceMeshKind;

impl StructureKind for SurfaceMeshKind {
    const TYPE_NAME: &'static str = "SurfaceMesh";
    type Quantity = dyn MeshQuantity;
}

/// A surface mesh structure (triangular or polygonal).
///
/// Element data handed in by the caller is in caller order; a permutation set
/// for an element kind maps internal elements to caller indices. Permutations
/// must be set before quantities are added on that element.
pub struct SurfaceMesh {
    base: StructureBase,
    geometry: MeshGeometry,
    quantities: QuantityMap<SurfaceMeshKind>,
    style: MeshStyle,
    default_colormap: String,
    surface_program: Option<ShaderProgram>,
    edge_program: Option<ShaderProgram>,
}

impl SurfaceMesh {
    /// Creates a new surface mesh from vertices and polygon faces.
    ///
    /// Each face is a list of at least three vertex indices.
    pub fn new<F: AsRef<[u32]>>(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        faces: &[F],
    ) -> Result<Self> {
        let connectivity = Connectivity::from_faces(vertices.len(), faces)?;
        Ok(Self::with_connectivity(name, vertices, connectivity))
    }

    /// Creates a mesh from triangles.
    pub fn from_triangles(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        triangles: &[[u32; 3]],
    ) -> Result<Self> {
        Self::new(name, vertices, triangles)
    }

    /// Creates a mesh from compressed face rows, see [`Connectivity::from_csr`].
    pub fn from_csr(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        corner_vertices: Vec<u32>,
        face_starts: Vec<usize>,
    ) -> Result<Self> {
        let connectivity = Connectivity::from_csr(vertices.len(), corner_vertices, face_starts)?;
        Ok(Self::with_connectivity(name, vertices, connectivity))
    }

    fn with_connectivity(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        connectivity: Connectivity,
    ) -> Self {
        let name = name.into();
        log::debug!(
            "surface mesh '{name}': {} vertices, {} faces, {} edges",
            connectivity.n_vertices(),
            connectivity.n_faces(),
            connectivity.n_edges()
        );
        let mut mesh = Self {
            base: StructureBase::new(name.clone()),
            geometry: MeshGeometry::new(vertices, connectivity),
            quantities: QuantityMap::new(name),
            style: MeshStyle::default(),
            default_colormap: "viridis".to_string(),
            surface_program: None,
            edge_program: None,
        };
        mesh.update_extents();
        mesh
    }

    // === Counts

    pub fn num_vertices(&self) -> usize {
        self.geometry.connectivity().n_vertices()
    }

    pub fn num_faces(&self) -> usize {
        self.geometry.connectivity().n_faces()
    }

    pub fn num_edges(&self) -> usize {
        self.geometry.connectivity().n_edges()
    }

    pub fn num_halfedges(&self) -> usize {
        self.geometry.connectivity().n_halfedges()
    }

    pub fn num_corners(&self) -> usize {
        self.geometry.connectivity().n_corners()
    }

    pub fn num_triangles(&self) -> usize {
        self.geometry.connectivity().n_triangles()
    }

    pub fn connectivity(&self) -> &Connectivity {
        self.geometry.connectivity()
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    // === Positions

    /// Vertex positions, empty while they only live in the render buffer.
    pub fn vertices(&self) -> &[Vec3] {
        self.geometry.vertex_positions.host_data()
    }

    /// Reads one position, from the render buffer if necessary.
    pub fn vertex_position(&self, i: usize) -> Result<Vec3> {
        self.geometry.vertex_positions.get_value(i)
    }

    /// Replaces vertex positions, refreshing derived geometry and extents.
    pub fn update_vertex_positions(&mut self, positions: Vec<Vec3>) -> Result<&mut Self> {
        self.geometry.update_vertex_positions(positions)?;
        self.update_extents();
        Ok(self)
    }

    pub fn vertex_positions_render_buffer(
        &mut self,
        engine: &dyn Engine,
    ) -> Result<Rc<dyn AttributeBuffer>> {
        self.geometry.vertex_positions.render_buffer(engine)
    }

    /// Records that the position render buffer was written directly.
    ///
    /// Host positions are dropped; derived data already computed is kept.
    pub fn mark_vertex_positions_updated(&mut self) -> Result<()> {
        self.geometry.vertex_positions.mark_externally_updated()
    }

    // === Derived geometry

    pub fn vertex_normals(&mut self) -> Result<&[Vec3]> {
        self.geometry.ensure_vertex_normals()?;
        self.geometry.vertex_normals.require_host_data()
    }

    pub fn face_normals(&mut self) -> Result<&[Vec3]> {
        self.geometry.ensure_face_normals()?;
        self.geometry.face_normals.require_host_data()
    }

    pub fn face_centers(&mut self) -> Result<&[Vec3]> {
        self.geometry.ensure_face_centers()?;
        self.geometry.face_centers.require_host_data()
    }

    pub fn face_areas(&mut self) -> Result<&[f32]> {
        self.geometry.ensure_face_areas()?;
        self.geometry.face_areas.require_host_data()
    }

    pub fn vertex_areas(&mut self) -> Result<&[f32]> {
        self.geometry.ensure_vertex_areas()?;
        self.geometry.vertex_areas.require_host_data()
    }

    pub fn edge_lengths(&mut self) -> Result<&[f32]> {
        self.geometry.ensure_edge_lengths()?;
        self.geometry.edge_lengths.require_host_data()
    }

    pub fn face_tangent_basis_x(&mut self) -> Result<&[Vec3]> {
        self.geometry.ensure_face_tangent_basis()?;
        self.geometry.face_tangent_basis_x.require_host_data()
    }

    pub fn vertex_tangent_basis_x(&mut self) -> Result<&[Vec3]> {
        self.geometry.ensure_vertex_tangent_basis()?;
        self.geometry.vertex_tangent_basis_x.require_host_data()
    }

    /// Sets the per-face tangent X axis, in caller face order.
    pub fn set_face_tangent_basis_x(&mut self, basis: Vec<Vec3>) -> Result<&mut Self> {
        self.geometry.set_face_tangent_basis_x(basis)?;
        Ok(self)
    }

    /// Sets the per-vertex tangent X axis, in caller vertex order.
    pub fn set_vertex_tangent_basis_x(&mut self, basis: Vec<Vec3>) -> Result<&mut Self> {
        self.geometry.set_vertex_tangent_basis_x(basis)?;
        Ok(self)
    }

    /// Render buffer of a derived per-element array, computing it if needed.
    ///
    /// Supported: vertex normals, face normals, face centers, face areas,
    /// vertex areas, edge lengths.
    pub fn derived_render_buffer(
        &mut self,
        array: DerivedArray,
        engine: &dyn Engine,
    ) -> Result<Rc<dyn AttributeBuffer>> {
        let g = &mut self.geometry;
        match array {
            DerivedArray::VertexNormals => {
                g.ensure_vertex_normals()?;
                g.vertex_normals.render_buffer(engine)
            }
            DerivedArray::FaceNormals => {
                g.ensure_face_normals()?;
                g.face_normals.render_buffer(engine)
            }
            DerivedArray::FaceCenters => {
                g.ensure_face_centers()?;
                g.face_centers.render_buffer(engine)
            }
            DerivedArray::FaceAreas => {
                g.ensure_face_areas()?;
                g.face_areas.render_buffer(engine)
            }
            DerivedArray::VertexAreas => {
                g.ensure_vertex_areas()?;
                g.vertex_areas.render_buffer(engine)
            }
            DerivedArray::EdgeLengths => {
                g.ensure_edge_lengths()?;
                g.edge_lengths.render_buffer(engine)
            }
        }
    }

    // === Connectivity queries

    /// The oppositely oriented halfedge on the same edge, or `h` on a boundary.
    pub fn twin_halfedge(&self, h: usize) -> usize {
        self.geometry.connectivity().twin_halfedge(h)
    }

    pub fn face_for_halfedge(&self, h: usize) -> usize {
        self.geometry.connectivity().face_for_halfedge(h)
    }

    // === Permutations

    /// Declares the caller's vertex ordering.
    ///
    /// `indices[i]` is the caller index of internal vertex `i`; caller arrays
    /// then hold `expected_size` entries, or `indices.len()` if `None`.
    pub fn set_vertex_permutation(
        &mut self,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<&mut Self> {
        self.set_permutation(ElementKind::Vertex, indices, expected_size)
    }

    pub fn set_face_permutation(
        &mut self,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<&mut Self> {
        self.set_permutation(ElementKind::Face, indices, expected_size)
    }

    pub fn set_edge_permutation(
        &mut self,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<&mut Self> {
        self.set_permutation(ElementKind::Edge, indices, expected_size)
    }

    pub fn set_halfedge_permutation(
        &mut self,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<&mut Self> {
        self.set_permutation(ElementKind::Halfedge, indices, expected_size)
    }

    pub fn set_corner_permutation(
        &mut self,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<&mut Self> {
        self.set_permutation(ElementKind::Corner, indices, expected_size)
    }

    /// Declares the caller's ordering for any element kind.
    ///
    /// Fails if quantities already hold data on that element.
    pub fn set_permutation(
        &mut self,
        element: ElementKind,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<&mut Self> {
        if let Some(q) = self.quantities.iter().find(|q| q.element() == element) {
            return Err(GeoscopeError::InvalidPermutation {
                element,
                reason: format!("quantity '{}' already uses the current ordering", q.name()),
            });
        }
        self.geometry.set_permutation(element, indices, expected_size)?;
        self.refresh();
        Ok(self)
    }

    /// Length caller arrays on `element` must have.
    pub fn expected_data_size(&self, element: ElementKind) -> usize {
        self.geometry.expected_data_size(element)
    }

    // === Quantities

    pub fn quantities(&self) -> &QuantityMap<SurfaceMeshKind> {
        &self.quantities
    }

    pub fn get_quantity(&self, name: &str) -> Option<&dyn MeshQuantity> {
        self.quantities.get(name)
    }

    pub fn get_quantity_mut(&mut self, name: &str) -> Option<&mut dyn MeshQuantity> {
        self.quantities.get_mut(name)
    }

    /// Gets a quantity as its concrete type.
    pub fn get_quantity_as<T: MeshQuantity>(&self, name: &str) -> Option<&T> {
        self.quantities.get_as(name)
    }

    pub fn get_quantity_mut_as<T: MeshQuantity>(&mut self, name: &str) -> Option<&mut T> {
        self.quantities.get_mut_as(name)
    }

    pub fn quantity_names(&self) -> Vec<&str> {
        self.quantities.names()
    }

    pub fn set_quantity_enabled(&mut self, name: &str, enabled: bool) -> Result<&mut Self> {
        self.quantities.set_enabled(name, enabled)?;
        Ok(self)
    }

    pub fn remove_quantity(&mut self, name: &str) -> Result<&mut Self> {
        self.quantities.remove(name)?;
        Ok(self)
    }

    pub fn remove_all_quantities(&mut self) -> &mut Self {
        self.quantities.clear();
        self
    }

    /// Color map given to scalar quantities added from now on.
    pub fn set_default_colormap(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_colormap = name.into();
        self
    }

    // === Style

    pub fn style(&self) -> &MeshStyle {
        &self.style
    }

    pub fn surface_color(&self) -> Vec3 {
        self.style.surface_color
    }

    pub fn set_surface_color(&mut self, color: Vec3) -> &mut Self {
        self.style.surface_color = color;
        self
    }

    pub fn edge_color(&self) -> Vec3 {
        self.style.edge_color
    }

    pub fn set_edge_color(&mut self, color: Vec3) -> &mut Self {
        self.style.edge_color = color;
        self
    }

    pub fn edge_width(&self) -> f32 {
        self.style.edge_width
    }

    /// Sets the edge width; a positive width also turns edges on.
    pub fn set_edge_width(&mut self, width: f32) -> &mut Self {
        self.style.edge_width = width;
        self.style.show_edges = width > 0.0;
        self
    }

    pub fn show_edges(&self) -> bool {
        self.style.show_edges
    }

    pub fn set_show_edges(&mut self, show: bool) -> &mut Self {
        self.style.show_edges = show;
        self
    }

    pub fn material(&self) -> &str {
        &self.style.material
    }

    pub fn set_material(&mut self, material: impl Into<String>) -> &mut Self {
        self.style.material = material.into();
        self
    }

    pub fn backface_policy(&self) -> BackfacePolicy {
        self.style.backface_policy
    }

    pub fn set_backface_policy(&mut self, policy: BackfacePolicy) -> &mut Self {
        if self.style.backface_policy != policy {
            self.style.backface_policy = policy;
            self.refresh();
        }
        self
    }

    pub fn backface_color(&self) -> Vec3 {
        self.style.backface_color
    }

    pub fn set_backface_color(&mut self, color: Vec3) -> &mut Self {
        self.style.backface_color = color;
        self
    }

    pub fn shade_style(&self) -> ShadeStyle {
        self.style.shade_style
    }

    pub fn set_shade_style(&mut self, style: ShadeStyle) -> &mut Self {
        if self.style.shade_style != style {
            self.style.shade_style = style;
            self.refresh();
        }
        self
    }

    // === Enable and transform

    // Chaining forms of the `Structure` methods of the same name.

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        Structure::set_enabled(self, enabled);
        self
    }

    pub fn set_transform(&mut self, transform: Mat4) -> &mut Self {
        Structure::set_transform(self, transform);
        self
    }

    pub fn reset_transform(&mut self) -> &mut Self {
        Structure::reset_transform(self);
        self
    }

    pub fn center_bounding_box(&mut self) -> &mut Self {
        Structure::center_bounding_box(self);
        self
    }

    // === Picking

    /// Splits a local pick index into an element kind and internal index.
    ///
    /// Pick indices cover vertices, then faces, then edges, then halfedges.
    pub fn decode_pick(&self, local_index: usize) -> Option<(ElementKind, usize)> {
        let conn = self.geometry.connectivity();
        let mut index = local_index;
        for (element, count) in [
            (ElementKind::Vertex, conn.n_vertices()),
            (ElementKind::Face, conn.n_faces()),
            (ElementKind::Edge, conn.n_edges()),
            (ElementKind::Halfedge, conn.n_halfedges()),
        ] {
            if index < count {
                return Some((element, index));
            }
            index -= count;
        }
        None
    }

    fn draw_pick_faces(&mut self, ctx: &RenderContext<'_>, start: u32) -> Result<()> {
        let mut program = ctx.engine.request_shader(
            MESH_EXPANDED,
            &COLOR_RULES,
            ShaderReplacementDefaults::Pick,
        )?;
        bind_surface_geometry(&mut self.geometry, ctx.engine, &mut program, false)?;
        let conn = self.geometry.connectivity();
        let colors: Vec<Vec3> = conn
            .triangle_corners()
            .iter()
            .flatten()
            .map(|&c| index_to_color(start + conn.face_for_halfedge(c) as u32))
            .collect();
        program.set_attribute("a_color", &colors)?;
        set_view_uniforms(&mut program, ctx, self.transform())?;
        program.draw()?;
        Ok(())
    }

    fn draw_pick_vertices(&mut self, ctx: &RenderContext<'_>, start: u32) -> Result<()> {
        let mut program =
            ctx.engine
                .request_shader(POINTS, &COLOR_RULES, ShaderReplacementDefaults::Pick)?;
        program.set_external_buffer(
            "a_position",
            self.geometry.vertex_positions.render_buffer(ctx.engine)?,
        )?;
        let colors: Vec<Vec3> = (0..self.num_vertices())
            .map(|v| index_to_color(start + v as u32))
            .collect();
        program.set_attribute("a_color", &colors)?;
        set_view_uniforms(&mut program, ctx, self.transform())?;
        program.draw()?;
        Ok(())
    }

    fn draw_pick_edges(&mut self, ctx: &RenderContext<'_>, start: u32) -> Result<()> {
        let conn = self.geometry.connectivity();
        if conn.n_edges() == 0 {
            return Ok(());
        }
        let positions = self.geometry.vertex_positions.require_host_data()?;
        let mut program =
            ctx.engine
                .request_shader(LINES, &COLOR_RULES, ShaderReplacementDefaults::Pick)?;
        let endpoints: Vec<Vec3> = conn
            .edges()
            .iter()
            .flatten()
            .map(|&v| positions[v as usize])
            .collect();
        let colors: Vec<Vec3> = (0..conn.n_edges())
            .flat_map(|e| {
                let color = index_to_color(start + e as u32);
                [color, color]
            })
            .collect();
        program.set_attribute("a_position", &endpoints)?;
        program.set_attribute("a_color", &colors)?;
        set_view_uniforms(&mut program, ctx, self.transform())?;
        program.draw()?;
        Ok(())
    }
}

/// Derived per-element arrays that can be bound as render buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedArray {
    VertexNormals,
    FaceNormals,
    FaceCenters,
    FaceAreas,
    VertexAreas,
    EdgeLengths,
}

impl Structure for SurfaceMesh {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn base(&self) -> &StructureBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StructureBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        SurfaceMeshKind::TYPE_NAME
    }

    fn object_space_bounds(&self) -> Option<(Vec3, Vec3)> {
        match self.geometry.vertex_positions.residency() {
            Residency::Device => self.base.object_bounds(),
            _ => bounds_of(self.vertices().iter().copied()),
        }
    }

    fn draw(&mut self, ctx: &RenderContext<'_>) -> Result<()> {
        let transform = self.transform();
        let length_scale = self.length_scale();
        let Self {
            geometry,
            quantities,
            style,
            surface_program,
            edge_program,
            ..
        } = self;
        let style = &*style;
        let mut target = MeshDraw {
            geometry,
            ctx,
            transform,
            style,
            length_scale,
        };

        if quantities.dominant().is_none() {
            let program = cached_program(surface_program, || {
                target.surface_program(&[SHADE_BASECOLOR], true)
            })?;
            program.set_uniform("u_baseColor", style.surface_color)?;
            target.submit(program)?;
        }

        for quantity in quantities.iter_mut().filter(|q| q.is_enabled()) {
            quantity.draw(&mut target)?;
        }

        if style.draws_edges() {
            let program = cached_program(edge_program, || {
                let engine = ctx.engine;
                let mut program = engine.request_shader(
                    MESH_EDGES,
                    &[SHADE_BASECOLOR],
                    ShaderReplacementDefaults::SceneObject,
                )?;
                let geometry = &mut *target.geometry;
                geometry.ensure_index_buffers()?;
                program.set_external_buffer(
                    "a_position",
                    geometry.vertex_positions.render_buffer(engine)?,
                )?;
                program.set_index_buffer(geometry.edge_indices.render_buffer(engine)?)?;
                Ok(program)
            })?;
            program.set_uniform("u_baseColor", style.edge_color)?;
            set_view_uniforms(program, ctx, transform)?;
            program.draw()?;
        }
        Ok(())
    }

    fn draw_pick(&mut self, ctx: &RenderContext<'_>, pick_start: u32) -> Result<()> {
        let n_vertices = self.num_vertices() as u32;
        let n_faces = self.num_faces() as u32;
        self.draw_pick_vertices(ctx, pick_start)?;
        self.draw_pick_faces(ctx, pick_start + n_vertices)?;
        self.draw_pick_edges(ctx, pick_start + n_vertices + n_faces)
    }

    fn pick_count(&self) -> usize {
        self.num_vertices() + self.num_faces() + self.num_edges() + self.num_halfedges()
    }

    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        let mut color = self.style.surface_color;
        if ui.color_edit("Color", &mut color) {
            self.set_surface_color(color);
        }

        let mut shade = usize::from(self.style.shade_style == ShadeStyle::Flat);
        if ui.combo("Shading", &mut shade, &["Smooth", "Flat"]) {
            self.set_shade_style(if shade == 1 {
                ShadeStyle::Flat
            } else {
                ShadeStyle::Smooth
            });
        }

        let policies = [
            BackfacePolicy::Identical,
            BackfacePolicy::Different,
            BackfacePolicy::Custom,
            BackfacePolicy::Cull,
        ];
        let mut policy = policies
            .iter()
            .position(|&p| p == self.style.backface_policy)
            .unwrap_or(0);
        if ui.combo(
            "Backface",
            &mut policy,
            &["Identical", "Different", "Custom", "Cull"],
        ) {
            self.set_backface_policy(policies[policy]);
        }
        if self.style.backface_policy == BackfacePolicy::Custom {
            ui.color_edit("Backface Color", &mut self.style.backface_color);
        }

        let mut show_edges = self.style.show_edges;
        if ui.checkbox("Show Edges", &mut show_edges) {
            self.set_show_edges(show_edges);
        }
        if self.style.show_edges {
            ui.slider_f32("Edge Width", &mut self.style.edge_width, 0.0, 5.0);
            ui.color_edit("Edge Color", &mut self.style.edge_color);
        }
    }

    fn build_custom_options_ui(&mut self, ui: &mut dyn UiBuilder) {
        ui.menu("Material", &mut |ui| {
            for material in MATERIAL_CHOICES {
                if ui.menu_item(material) {
                    self.style.material = material.to_string();
                }
            }
        });
    }

    fn build_quantities_ui(&mut self, ui: &mut dyn UiBuilder) {
        self.quantities.build_ui(ui);
    }

    fn build_pick_ui(&mut self, ui: &mut dyn UiBuilder, local_index: usize) {
        let Some((element, index)) = self.decode_pick(local_index) else {
            return;
        };
        let data_index = self.geometry.data_index(element, index);
        ui.label(&format!("{element} #{data_index}"));
        let conn = self.geometry.connectivity();
        match element {
            ElementKind::Vertex => {
                if let Ok(p) = self.vertex_position(index) {
                    ui.label(&format!("position ({:.4}, {:.4}, {:.4})", p.x, p.y, p.z));
                }
            }
            ElementKind::Face => {
                ui.label(&format!("degree {}", conn.face(index).len()));
            }
            ElementKind::Edge => {
                let [a, b] = conn.edges()[index];
                ui.label(&format!("vertices {a} - {b}"));
            }
            ElementKind::Halfedge => {
                ui.label(&format!(
                    "vertices {} -> {}, face {}",
                    conn.halfedge_tail(index),
                    conn.halfedge_tip(index),
                    conn.face_for_halfedge(index)
                ));
            }
            ElementKind::Corner => {}
        }
        ui.separator();
        for quantity in self.quantities.iter() {
            if let Some(text) = quantity.describe(&self.geometry, element, index) {
                ui.label(&text);
            }
        }
    }

    fn refresh(&mut self) {
        self.surface_program = None;
        self.edge_program = None;
        self.quantities.refresh_all();
    }
}
