//! Tangent-space vectors on vertices or faces.
//!
//! Each vector is given as `(x, y)` in the element's tangent frame: the
//! tangent basis X direction and `normal × X`. A symmetry order above one
//! draws that many copies evenly rotated about the normal (2 = line field,
//! 4 = cross field).

use std::any::Any;
use std::rc::Rc;

use geoscope_core::{
    ElementKind, ManagedBuffer, Quantity, QuantityBase, QuantityKind, Result, UiBuilder,
};
use geoscope_render::{AttributeBuffer, Engine, ShaderProgram};
use glam::{Vec2, Vec3};

use super::geometry::MeshGeometry;
use super::quantities::{element_roots, quantity_header, MeshDraw, MeshQuantity};
use crate::capabilities::VectorStyle;

/// Tangent-space vectors drawn as line glyphs.
pub struct MeshIntrinsicVectorQuantity {
    base: QuantityBase,
    element: ElementKind,
    expected_size: usize,
    vectors: ManagedBuffer<Vec2>,
    n_sym: u32,
    style: VectorStyle,
    program: Option<ShaderProgram>,
}

impl MeshIntrinsicVectorQuantity {
    pub(crate) fn new(
        name: impl Into<String>,
        element: ElementKind,
        vectors: Vec<Vec2>,
        n_sym: u32,
        mut style: VectorStyle,
    ) -> Self {
        let name = name.into();
        style.color = match element {
            ElementKind::Face => Vec3::new(0.2, 0.8, 0.8),
            _ => Vec3::new(0.8, 0.2, 0.8),
        };
        Self {
            base: QuantityBase::new(name.clone(), false),
            element,
            expected_size: vectors.len(),
            vectors: ManagedBuffer::with_data(name, vectors),
            n_sym: n_sym.max(1),
            style,
            program: None,
        }
    }

    /// Vectors in caller order, empty while they only live on the device.
    pub fn vectors(&self) -> &[Vec2] {
        self.vectors.host_data()
    }

    pub fn n_sym(&self) -> u32 {
        self.n_sym
    }

    /// Sets the symmetry order; zero is treated as one.
    pub fn set_n_sym(&mut self, n_sym: u32) -> &mut Self {
        self.n_sym = n_sym.max(1);
        self
    }

    pub fn style(&self) -> &VectorStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut VectorStyle {
        &mut self.style
    }

    pub fn update_data(&mut self, vectors: Vec<Vec2>) -> Result<()> {
        self.vectors.update_data(vectors, self.expected_size)
    }

    pub fn render_buffer(&mut self, engine: &dyn Engine) -> Result<Rc<dyn AttributeBuffer>> {
        self.vectors.render_buffer(engine)
    }

    pub fn mark_render_buffer_updated(&mut self) -> Result<()> {
        self.vectors.mark_externally_updated()
    }

    /// World-space vectors in internal element order, `n_sym` per element.
    pub fn world_vectors(&self, geometry: &mut MeshGeometry) -> Result<Vec<Vec3>> {
        let tangent = geometry.gather_elements(self.element, &self.vectors.data()?);
        let (basis_x, normals) = match self.element {
            ElementKind::Face => {
                geometry.ensure_face_tangent_basis()?;
                (
                    geometry.face_tangent_basis_x.data()?,
                    geometry.face_normals.data()?,
                )
            }
            _ => {
                geometry.ensure_vertex_tangent_basis()?;
                (
                    geometry.vertex_tangent_basis_x.data()?,
                    geometry.vertex_normals.data()?,
                )
            }
        };
        let step = std::f32::consts::TAU / self.n_sym as f32;
        let mut world = Vec::with_capacity(tangent.len() * self.n_sym as usize);
        for ((v, &x), &n) in tangent.iter().zip(basis_x.iter()).zip(normals.iter()) {
            let y = n.cross(x);
            for k in 0..self.n_sym {
                let r = Vec2::from_angle(step * k as f32).rotate(*v);
                world.push(x * r.x + y * r.y);
            }
        }
        Ok(world)
    }

    /// Segment endpoints, `n_sym` glyphs per element.
    pub fn segments(&self, geometry: &mut MeshGeometry, length_scale: f32) -> Result<Vec<Vec3>> {
        let world = self.world_vectors(geometry)?;
        let n = self.n_sym as usize;
        let roots: Vec<Vec3> = element_roots(geometry, self.element)?
            .into_iter()
            .flat_map(|root| std::iter::repeat(root).take(n))
            .collect();
        Ok(self.style.segments(&roots, &world, length_scale))
    }
}

impl Quantity for MeshIntrinsicVectorQuantity {
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
        quantity_header(self.name(), self.element, "intrinsic vector")
    }
    fn refresh(&mut self) {
        self.program = None;
    }
    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        self.style.build_ui(ui);
    }
}

impl MeshQuantity for MeshIntrinsicVectorQuantity {
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
        Some(format!("{}: ({:.3}, {:.3})", self.name(), v.x, v.y))
    }
}
