//! Quantity management methods for surface meshes.
//!
//! Every `add_*` method checks the data length against the element count,
//! or against the external size implied by a permutation set for that element.

use geoscope_core::{check_size, DataType, ElementKind, GeoscopeError, Result};
use glam::{Vec2, Vec3};

use super::{
    MeshColorQuantity, MeshIntrinsicVectorQuantity, MeshParameterizationQuantity, MeshQuantity,
    MeshScalarQuantity, MeshVectorQuantity, ParamCoordsType, ParamStyle, ParamVizStyle,
    SurfaceMesh,
};
use crate::capabilities::{VectorStyle, VectorType};

impl SurfaceMesh {
    fn insert_quantity<T: MeshQuantity>(&mut self, quantity: T) -> Result<&mut T> {
        log::debug!(
            "adding {} to surface mesh '{}'",
            quantity.nice_name(),
            self.base.name()
        );
        self.quantities.insert_as::<T>(Box::new(quantity))
    }

    fn check_element_data(&self, name: &str, element: ElementKind, len: usize) -> Result<()> {
        check_size(name, self.geometry.expected_data_size(element), len)
    }

    // === Scalars

    /// Adds a colormapped scalar quantity on any element kind.
    pub fn add_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        element: ElementKind,
        values: Vec<f32>,
        data_type: DataType,
    ) -> Result<&mut MeshScalarQuantity> {
        let name = name.into();
        self.check_element_data(&name, element, values.len())?;
        let quantity =
            MeshScalarQuantity::new(name, element, values, data_type, &self.default_colormap);
        self.insert_quantity(quantity)
    }

    /// Adds a vertex scalar quantity to this mesh.
    pub fn add_vertex_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut MeshScalarQuantity> {
        self.add_scalar_quantity(name, ElementKind::Vertex, values, DataType::Standard)
    }

    /// Adds a face scalar quantity to this mesh.
    pub fn add_face_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut MeshScalarQuantity> {
        self.add_scalar_quantity(name, ElementKind::Face, values, DataType::Standard)
    }

    /// Adds an edge scalar quantity, in edge order or the edge permutation's order.
    pub fn add_edge_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut MeshScalarQuantity> {
        self.add_scalar_quantity(name, ElementKind::Edge, values, DataType::Standard)
    }

    pub fn add_halfedge_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut MeshScalarQuantity> {
        self.add_scalar_quantity(name, ElementKind::Halfedge, values, DataType::Standard)
    }

    /// Adds a non-negative per-vertex distance.
    pub fn add_vertex_distance_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut MeshScalarQuantity> {
        let name = name.into();
        self.check_element_data(&name, ElementKind::Vertex, values.len())?;
        let quantity = MeshScalarQuantity::new(
            name,
            ElementKind::Vertex,
            values,
            DataType::Magnitude,
            &self.default_colormap,
        )
        .with_label("distance");
        self.insert_quantity(quantity)
    }

    /// Adds a per-vertex signed distance, colormapped symmetrically about zero.
    pub fn add_vertex_signed_distance_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut MeshScalarQuantity> {
        let name = name.into();
        self.check_element_data(&name, ElementKind::Vertex, values.len())?;
        let quantity = MeshScalarQuantity::new(
            name,
            ElementKind::Vertex,
            values,
            DataType::Symmetric,
            "coolwarm",
        )
        .with_label("signed distance");
        self.insert_quantity(quantity)
    }

    // === Colors

    /// Adds a vertex color quantity to this mesh.
    pub fn add_vertex_color_quantity(
        &mut self,
        name: impl Into<String>,
        colors: Vec<Vec3>,
    ) -> Result<&mut MeshColorQuantity> {
        let name = name.into();
        self.check_element_data(&name, ElementKind::Vertex, colors.len())?;
        self.insert_quantity(MeshColorQuantity::new(name, ElementKind::Vertex, colors))
    }

    /// Adds a face color quantity to this mesh.
    pub fn add_face_color_quantity(
        &mut self,
        name: impl Into<String>,
        colors: Vec<Vec3>,
    ) -> Result<&mut MeshColorQuantity> {
        let name = name.into();
        self.check_element_data(&name, ElementKind::Face, colors.len())?;
        self.insert_quantity(MeshColorQuantity::new(name, ElementKind::Face, colors))
    }

    // === Vectors

    /// Adds a vertex vector quantity, auto-scaled for display.
    pub fn add_vertex_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec3>,
    ) -> Result<&mut MeshVectorQuantity> {
        self.add_vector_quantity(name, ElementKind::Vertex, vectors, VectorType::Standard)
    }

    /// Adds a face vector quantity rooted at face centers, auto-scaled for display.
    pub fn add_face_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec3>,
    ) -> Result<&mut MeshVectorQuantity> {
        self.add_vector_quantity(name, ElementKind::Face, vectors, VectorType::Standard)
    }

    /// Adds a vector quantity on vertices or faces.
    pub fn add_vector_quantity(
        &mut self,
        name: impl Into<String>,
        element: ElementKind,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Result<&mut MeshVectorQuantity> {
        let name = name.into();
        if !matches!(element, ElementKind::Vertex | ElementKind::Face) {
            return Err(GeoscopeError::InvalidMesh(format!(
                "vector quantity '{name}' must be defined on vertices or faces, not {element}s"
            )));
        }
        self.check_element_data(&name, element, vectors.len())?;
        let quantity =
            MeshVectorQuantity::new(name, element, vectors, VectorStyle::new(vector_type));
        self.insert_quantity(quantity)
    }

    /// Adds tangent-space vectors on vertices or faces, expressed in the tangent basis.
    ///
    /// `n_sym` copies of each vector are drawn, rotated evenly about the normal.
    pub fn add_intrinsic_vector_quantity(
        &mut self,
        name: impl Into<String>,
        element: ElementKind,
        vectors: Vec<Vec2>,
        n_sym: u32,
        vector_type: VectorType,
    ) -> Result<&mut MeshIntrinsicVectorQuantity> {
        let name = name.into();
        if !matches!(element, ElementKind::Vertex | ElementKind::Face) {
            return Err(GeoscopeError::InvalidMesh(format!(
                "intrinsic vector quantity '{name}' must be defined on vertices or faces, not {element}s"
            )));
        }
        self.check_element_data(&name, element, vectors.len())?;
        let style = VectorStyle::new(vector_type);
        let quantity = MeshIntrinsicVectorQuantity::new(name, element, vectors, n_sym, style);
        self.insert_quantity(quantity)
    }

    pub fn add_vertex_intrinsic_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec2>,
    ) -> Result<&mut MeshIntrinsicVectorQuantity> {
        self.add_intrinsic_vector_quantity(
            name,
            ElementKind::Vertex,
            vectors,
            1,
            VectorType::Standard,
        )
    }

    pub fn add_face_intrinsic_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec2>,
    ) -> Result<&mut MeshIntrinsicVectorQuantity> {
        self.add_intrinsic_vector_quantity(
            name,
            ElementKind::Face,
            vectors,
            1,
            VectorType::Standard,
        )
    }

    // === Parameterizations

    fn add_parameterization(
        &mut self,
        name: impl Into<String>,
        element: ElementKind,
        coords: Vec<Vec2>,
        coords_type: ParamCoordsType,
        style: ParamStyle,
    ) -> Result<&mut MeshParameterizationQuantity> {
        let name = name.into();
        self.check_element_data(&name, element, coords.len())?;
        let quantity = MeshParameterizationQuantity::new(name, element, coords, coords_type, style);
        self.insert_quantity(quantity)
    }

    /// Adds UV coordinates per face corner, allowing seams.
    pub fn add_corner_parameterization_quantity(
        &mut self,
        name: impl Into<String>,
        coords: Vec<Vec2>,
        coords_type: ParamCoordsType,
    ) -> Result<&mut MeshParameterizationQuantity> {
        let style = ParamStyle::default();
        self.add_parameterization(name, ElementKind::Corner, coords, coords_type, style)
    }

    /// Adds UV coordinates per vertex.
    pub fn add_vertex_parameterization_quantity(
        &mut self,
        name: impl Into<String>,
        coords: Vec<Vec2>,
        coords_type: ParamCoordsType,
    ) -> Result<&mut MeshParameterizationQuantity> {
        let style = ParamStyle::default();
        self.add_parameterization(name, ElementKind::Vertex, coords, coords_type, style)
    }

    /// Adds a local chart around a point (a log map, say), in world units and hue-coded by angle.
    pub fn add_local_parameterization_quantity(
        &mut self,
        name: impl Into<String>,
        coords: Vec<Vec2>,
    ) -> Result<&mut MeshParameterizationQuantity> {
        let style = ParamStyle {
            viz: ParamVizStyle::LocalCheck,
            ..ParamStyle::default()
        };
        self.add_parameterization(
            name,
            ElementKind::Vertex,
            coords,
            ParamCoordsType::World,
            style,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_core::{GeoscopeError, Quantity};
    use proptest::prelude::*;

    fn tetrahedron() -> SurfaceMesh {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let faces = [[0u32, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];
        SurfaceMesh::from_triangles("tet", vertices, &faces).unwrap()
    }

    /// Test expected sizes on every scalar element kind.
    #[test]
    fn test_scalar_sizes_per_element() {
        let mut mesh = tetrahedron();
        assert!(mesh.add_edge_scalar_quantity("e", vec![0.0; 6]).is_ok());
        assert!(mesh.add_halfedge_scalar_quantity("h", vec![0.0; 12]).is_ok());
        assert!(mesh.add_face_scalar_quantity("f", vec![0.0; 3]).is_err());
        assert_eq!(mesh.quantity_names(), vec!["e", "h"]);
        assert_eq!(
            mesh.get_quantity("h").unwrap().nice_name(),
            "h (halfedge scalar)"
        );
    }

    /// Test that colors dominate scalars and vectors dominate nothing.
    #[test]
    fn test_dominance_between_kinds() {
        let mut mesh = tetrahedron();
        mesh.add_vertex_scalar_quantity("s", vec![0.0; 4]).unwrap();
        mesh.add_face_color_quantity("c", vec![Vec3::ONE; 4]).unwrap();
        mesh.add_vertex_vector_quantity("v", vec![Vec3::X; 4]).unwrap();
        mesh.set_quantity_enabled("v", true).unwrap();

        assert!(!mesh.get_quantity("s").unwrap().is_enabled());
        assert!(mesh.get_quantity("c").unwrap().is_enabled());
        assert!(mesh.get_quantity("v").unwrap().is_enabled());
        assert_eq!(mesh.quantities().dominant().unwrap().name(), "c");
    }

    /// Test that vectors are only accepted on vertices and faces.
    #[test]
    fn test_vector_elements() {
        let mut mesh = tetrahedron();
        assert!(matches!(
            mesh.add_vector_quantity("e", ElementKind::Edge, vec![Vec3::X; 6], VectorType::Ambient),
            Err(GeoscopeError::InvalidMesh(_))
        ));
        let q = mesh.add_face_vector_quantity("n", vec![Vec3::Z; 4]).unwrap();
        assert_eq!(q.style().vector_type, VectorType::Standard);
    }

    /// Test that updates keep the length fixed and leave data intact on failure.
    #[test]
    fn test_update_scalar_data() {
        let mut mesh = tetrahedron();
        let q = mesh
            .add_vertex_scalar_quantity("s", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap();
        q.update_data(vec![4.0, 3.0, 2.0, 1.0]).unwrap();
        assert!(q.update_data(vec![0.0; 3]).is_err());
        assert_eq!(q.values(), &[4.0, 3.0, 2.0, 1.0]);
    }

    /// Test that corner coordinates follow the corner count and corner permutation.
    #[test]
    fn test_parameterization_sizes() {
        let mut mesh = tetrahedron();
        let unit = ParamCoordsType::Unit;
        assert!(mesh
            .add_corner_parameterization_quantity("short", vec![Vec2::ZERO; 11], unit)
            .is_err());
        let q = mesh
            .add_corner_parameterization_quantity("uv", vec![Vec2::ZERO; 12], unit)
            .unwrap();
        assert_eq!(q.element(), ElementKind::Corner);
        assert_eq!(q.nice_name(), "uv (corner parameterization)");
        assert!(mesh
            .add_vertex_parameterization_quantity("v", vec![Vec2::ZERO; 12], unit)
            .is_err());
        let local = mesh
            .add_local_parameterization_quantity("log map", vec![Vec2::X; 4])
            .unwrap();
        assert_eq!(local.coords_type(), ParamCoordsType::World);
        assert_eq!(local.style().viz, ParamVizStyle::LocalCheck);
        assert_eq!(mesh.quantities().dominant().unwrap().name(), "log map");

        let mut permuted = tetrahedron();
        let indices: Vec<usize> = (0..12).rev().collect();
        permuted.set_corner_permutation(indices, Some(14)).unwrap();
        assert!(permuted
            .add_corner_parameterization_quantity("uv", vec![Vec2::ZERO; 12], unit)
            .is_err());
        assert!(permuted
            .add_corner_parameterization_quantity("uv", vec![Vec2::ZERO; 14], unit)
            .is_ok());
    }

    /// Test intrinsic vector sizes and accepted elements.
    #[test]
    fn test_intrinsic_vector_sizes() {
        let mut mesh = tetrahedron();
        assert!(mesh.add_face_intrinsic_vector_quantity("f", vec![Vec2::X; 3]).is_err());
        assert!(mesh.add_vertex_intrinsic_vector_quantity("v", vec![Vec2::X; 5]).is_err());
        let ambient = VectorType::Ambient;
        assert!(matches!(
            mesh.add_intrinsic_vector_quantity("e", ElementKind::Edge, vec![Vec2::X; 6], 1, ambient),
            Err(GeoscopeError::InvalidMesh(_))
        ));
        let q = mesh
            .add_intrinsic_vector_quantity("cross", ElementKind::Face, vec![Vec2::X; 4], 4, ambient)
            .unwrap();
        assert_eq!(q.n_sym(), 4);
        assert!(!q.is_enabled());
        assert_eq!(q.data_size().unwrap(), 4);
        assert_eq!(q.set_n_sym(0).n_sym(), 1);
        assert_eq!(q.nice_name(), "cross (face intrinsic vector)");
    }

    proptest! {
        /// Test that an external vertex size is enforced for any permutation.
        #[test]
        fn test_permuted_vertex_size(extra in 0usize..5, shift in 0usize..4, len in 0usize..12) {
            let mut mesh = tetrahedron();
            let indices: Vec<usize> = (0..4).map(|i| (i + shift) % 4).collect();
            mesh.set_vertex_permutation(indices, Some(4 + extra)).unwrap();
            let result = mesh.add_vertex_scalar_quantity("s", vec![0.0; len]);
            prop_assert_eq!(result.is_ok(), len == 4 + extra);
        }
    }
}
