//! Connectivity and derived geometry for surface meshes.
//!
//! Faces are stored in compressed rows: `face_starts[f]..face_starts[f + 1]`
//! indexes the corners of face `f`, and each corner names a vertex. Element
//! orderings are fixed here:
//! - corners run through the faces in order;
//! - halfedge `h` leaves the vertex of corner `h` toward the next corner of
//!   the same face, so halfedges and corners share indices;
//! - edges are numbered in order of first appearance while walking halfedges;
//! - each face of degree `n` is fan-triangulated from its first corner into
//!   `n - 2` triangles.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use geoscope_core::{
    check_size, expected_size, ElementKind, GeoscopeError, ManagedBuffer, Permutation, Result,
};
use glam::Vec3;

/// Face-vertex connectivity with the element counts derived from it.
#[derive(Debug)]
pub struct Connectivity {
    n_vertices: usize,
    face_starts: Vec<usize>,
    corner_vertices: Vec<u32>,
    corner_face: Vec<usize>,
    halfedge_edge: Vec<usize>,
    edges: Vec<[u32; 2]>,
    triangle_corners: Vec<[usize; 3]>,
    twins: OnceCell<Vec<usize>>,
}

impl Connectivity {
    /// Builds connectivity from one vertex list per face.
    pub fn from_faces<F: AsRef<[u32]>>(n_vertices: usize, faces: &[F]) -> Result<Self> {
        let mut face_starts = Vec::with_capacity(faces.len() + 1);
        let mut corner_vertices = Vec::new();
        face_starts.push(0);
        for face in faces {
            corner_vertices.extend_from_slice(face.as_ref());
            face_starts.push(corner_vertices.len());
        }
        Self::from_csr(n_vertices, corner_vertices, face_starts)
    }

    /// Builds connectivity from compressed rows.
    ///
    /// `face_starts` has one more entry than there are faces, starts at 0, and
    /// ends at `corner_vertices.len()`.
    pub fn from_csr(
        n_vertices: usize,
        corner_vertices: Vec<u32>,
        face_starts: Vec<usize>,
    ) -> Result<Self> {
        if face_starts.first() != Some(&0) || face_starts.last() != Some(&corner_vertices.len()) {
            return Err(GeoscopeError::InvalidMesh(format!(
                "face starts must run from 0 to {}",
                corner_vertices.len()
            )));
        }
        for (f, w) in face_starts.windows(2).enumerate() {
            if w[1] < w[0] + 3 {
                return Err(GeoscopeError::InvalidMesh(format!(
                    "face {f} has fewer than 3 vertices"
                )));
            }
        }
        if let Some(&bad) = corner_vertices.iter().find(|&&v| v as usize >= n_vertices) {
            return Err(GeoscopeError::InvalidMesh(format!(
                "vertex index {bad} out of range for {n_vertices} vertices"
            )));
        }

        let mut connectivity = Self {
            n_vertices,
            face_starts,
            corner_vertices,
            corner_face: Vec::new(),
            halfedge_edge: Vec::new(),
            edges: Vec::new(),
            triangle_corners: Vec::new(),
            twins: OnceCell::new(),
        };
        connectivity.compute_counts();
        Ok(connectivity)
    }

    /// Derives corner, halfedge, edge, and triangle tables from the faces.
    fn compute_counts(&mut self) {
        let n_faces = self.n_faces();
        let mut edge_ids: HashMap<(u32, u32), usize> = HashMap::new();

        self.corner_face = Vec::with_capacity(self.corner_vertices.len());
        self.halfedge_edge = Vec::with_capacity(self.corner_vertices.len());
        self.edges.clear();
        self.triangle_corners.clear();

        for f in 0..n_faces {
            let corners = self.face_corners(f);
            let first = corners.start;
            for c in corners.clone() {
                self.corner_face.push(f);
                let (a, b) = (self.corner_vertices[c], self.corner_vertices[self.next_corner(c)]);
                let key = (a.min(b), a.max(b));
                let next_id = self.edges.len();
                let e = *edge_ids.entry(key).or_insert_with(|| next_id);
                if e == next_id {
                    self.edges.push([key.0, key.1]);
                }
                self.halfedge_edge.push(e);
            }
            for c in (first + 1)..(corners.end - 1) {
                self.triangle_corners.push([first, c, c + 1]);
            }
        }
    }

    pub fn n_vertices(&self) -> usize {
        self.n_vertices
    }

    pub fn n_faces(&self) -> usize {
        self.face_starts.len() - 1
    }

    pub fn n_corners(&self) -> usize {
        self.corner_vertices.len()
    }

    /// Equal to the corner count.
    pub fn n_halfedges(&self) -> usize {
        self.corner_vertices.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn n_triangles(&self) -> usize {
        self.triangle_corners.len()
    }

    pub fn element_count(&self, element: ElementKind) -> usize {
        match element {
            ElementKind::Vertex => self.n_vertices(),
            ElementKind::Face => self.n_faces(),
            ElementKind::Edge => self.n_edges(),
            ElementKind::Halfedge => self.n_halfedges(),
            ElementKind::Corner => self.n_corners(),
        }
    }

    pub fn face_corners(&self, f: usize) -> Range<usize> {
        self.face_starts[f]..self.face_starts[f + 1]
    }

    /// Vertex indices of face `f` in order.
    pub fn face(&self, f: usize) -> &[u32] {
        &self.corner_vertices[self.face_corners(f)]
    }

    pub fn face_starts(&self) -> &[usize] {
        &self.face_starts
    }

    pub fn corner_vertices(&self) -> &[u32] {
        &self.corner_vertices
    }

    pub fn corner_vertex(&self, c: usize) -> usize {
        self.corner_vertices[c] as usize
    }

    /// The following corner of the same face, wrapping around.
    pub fn next_corner(&self, c: usize) -> usize {
        let corners = self.face_corners(self.face_of_corner(c));
        if c + 1 == corners.end {
            corners.start
        } else {
            c + 1
        }
    }

    fn face_of_corner(&self, c: usize) -> usize {
        match self.corner_face.get(c) {
            Some(&f) => f,
            None => self.face_starts.partition_point(|&s| s <= c) - 1,
        }
    }

    pub fn halfedge_tail(&self, h: usize) -> usize {
        self.corner_vertex(h)
    }

    pub fn halfedge_tip(&self, h: usize) -> usize {
        self.corner_vertex(self.next_corner(h))
    }

    pub fn halfedge_edge(&self, h: usize) -> usize {
        self.halfedge_edge[h]
    }

    pub fn face_for_halfedge(&self, h: usize) -> usize {
        self.corner_face[h]
    }

    /// Endpoints of each edge, smaller vertex index first.
    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    pub fn triangle_corners(&self) -> &[[usize; 3]] {
        &self.triangle_corners
    }

    /// The oppositely oriented halfedge across the same edge.
    ///
    /// When several candidates exist the lowest index wins; boundary halfedges
    /// and halfedges with no reverse-oriented partner are their own twin.
    pub fn twin_halfedge(&self, h: usize) -> usize {
        self.twins.get_or_init(|| self.compute_twins())[h]
    }

    fn compute_twins(&self) -> Vec<usize> {
        let mut by_edge: Vec<Vec<usize>> = vec![Vec::new(); self.n_edges()];
        for h in 0..self.n_halfedges() {
            by_edge[self.halfedge_edge[h]].push(h);
        }

        let twins: Vec<usize> = (0..self.n_halfedges())
            .map(|h| {
                let (tail, tip) = (self.halfedge_tail(h), self.halfedge_tip(h));
                by_edge[self.halfedge_edge[h]]
                    .iter()
                    .copied()
                    .find(|&o| {
                        o != h && self.halfedge_tail(o) == tip && self.halfedge_tip(o) == tail
                    })
                    .unwrap_or(h)
            })
            .collect();

        let non_manifold = by_edge.iter().filter(|hs| hs.len() > 2).count();
        let unoriented = by_edge
            .iter()
            .filter(|hs| hs.len() == 2 && twins[hs[0]] == hs[0])
            .count();
        if non_manifold + unoriented > 0 {
            log::warn!(
                "mesh has {non_manifold} non-manifold and {unoriented} inconsistently oriented \
                 edges; twin halfedges there are the lowest-index candidate"
            );
        }
        twins
    }
}

fn face_vector_area(positions: &[Vec3], face: &[u32]) -> Vec3 {
    let p0 = positions[face[0] as usize];
    face.windows(2)
        .skip(1)
        .map(|w| (positions[w[0] as usize] - p0).cross(positions[w[1] as usize] - p0))
        .sum::<Vec3>()
        * 0.5
}

fn per_face<T>(
    conn: &Connectivity,
    positions: &[Vec3],
    f: impl Fn(&[Vec3], &[u32]) -> T,
) -> Vec<T> {
    (0..conn.n_faces()).map(|i| f(positions, conn.face(i))).collect()
}

pub fn compute_face_normals(positions: &[Vec3], conn: &Connectivity) -> Vec<Vec3> {
    per_face(conn, positions, |p, face| {
        face_vector_area(p, face).normalize_or_zero()
    })
}

pub fn compute_face_areas(positions: &[Vec3], conn: &Connectivity) -> Vec<f32> {
    per_face(conn, positions, |p, face| face_vector_area(p, face).length())
}

pub fn compute_face_centers(positions: &[Vec3], conn: &Connectivity) -> Vec<Vec3> {
    per_face(conn, positions, |p, face| {
        face.iter().map(|&v| p[v as usize]).sum::<Vec3>() / face.len() as f32
    })
}

/// Area-weighted average of incident face normals.
pub fn compute_vertex_normals(positions: &[Vec3], conn: &Connectivity) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; conn.n_vertices()];
    for f in 0..conn.n_faces() {
        let face = conn.face(f);
        let weighted = face_vector_area(positions, face);
        for &v in face {
            normals[v as usize] += weighted;
        }
    }
    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

/// Each face's area shared equally among its vertices.
pub fn compute_vertex_areas(positions: &[Vec3], conn: &Connectivity) -> Vec<f32> {
    let mut areas = vec![0.0; conn.n_vertices()];
    for f in 0..conn.n_faces() {
        let face = conn.face(f);
        let share = face_vector_area(positions, face).length() / face.len() as f32;
        for &v in face {
            areas[v as usize] += share;
        }
    }
    areas
}

pub fn compute_edge_lengths(positions: &[Vec3], conn: &Connectivity) -> Vec<f32> {
    conn.edges()
        .iter()
        .map(|&[a, b]| positions[a as usize].distance(positions[b as usize]))
        .collect()
}

/// First edge direction of each face, orthogonalized against the face normal.
pub fn compute_face_tangent_basis(
    positions: &[Vec3],
    conn: &Connectivity,
    face_normals: &[Vec3],
) -> Vec<Vec3> {
    (0..conn.n_faces())
        .map(|f| {
            let face = conn.face(f);
            let n = face_normals[f];
            let e = positions[face[1] as usize] - positions[face[0] as usize];
            (e - n * n.dot(e)).normalize_or_zero()
        })
        .collect()
}

/// Area-weighted face bases projected into each vertex tangent plane.
pub fn compute_vertex_tangent_basis(
    positions: &[Vec3],
    conn: &Connectivity,
    face_normals: &[Vec3],
    vertex_normals: &[Vec3],
) -> Vec<Vec3> {
    let face_basis = compute_face_tangent_basis(positions, conn, face_normals);
    let mut accumulated = vec![Vec3::ZERO; conn.n_vertices()];
    for f in 0..conn.n_faces() {
        let face = conn.face(f);
        let weighted = face_basis[f] * face_vector_area(positions, face).length();
        for &v in face {
            accumulated[v as usize] += weighted;
        }
    }
    accumulated
        .iter()
        .zip(vertex_normals)
        .map(|(&b, &n)| {
            let projected = (b - n * n.dot(b)).normalize_or_zero();
            if projected == Vec3::ZERO {
                n.any_orthonormal_vector()
            } else {
                projected
            }
        })
        .collect()
}

/// Connectivity, permutations, and every lazily derived per-element array.
pub struct MeshGeometry {
    connectivity: Connectivity,
    permutations: BTreeMap<ElementKind, Permutation>,
    pub(crate) vertex_positions: ManagedBuffer<Vec3>,
    pub(crate) vertex_normals: ManagedBuffer<Vec3>,
    pub(crate) face_normals: ManagedBuffer<Vec3>,
    pub(crate) face_centers: ManagedBuffer<Vec3>,
    pub(crate) face_areas: ManagedBuffer<f32>,
    pub(crate) vertex_areas: ManagedBuffer<f32>,
    pub(crate) edge_lengths: ManagedBuffer<f32>,
    pub(crate) face_tangent_basis_x: ManagedBuffer<Vec3>,
    pub(crate) vertex_tangent_basis_x: ManagedBuffer<Vec3>,
    pub(crate) corner_positions: ManagedBuffer<Vec3>,
    pub(crate) corner_normals: ManagedBuffer<Vec3>,
    pub(crate) triangle_indices: ManagedBuffer<u32>,
    pub(crate) edge_indices: ManagedBuffer<u32>,
    user_face_basis: bool,
    user_vertex_basis: bool,
}

impl MeshGeometry {
    pub fn new(positions: Vec<Vec3>, connectivity: Connectivity) -> Self {
        Self {
            connectivity,
            permutations: BTreeMap::new(),
            vertex_positions: ManagedBuffer::with_data("vertex positions", positions),
            vertex_normals: ManagedBuffer::new("vertex normals"),
            face_normals: ManagedBuffer::new("face normals"),
            face_centers: ManagedBuffer::new("face centers"),
            face_areas: ManagedBuffer::new("face areas"),
            vertex_areas: ManagedBuffer::new("vertex areas"),
            edge_lengths: ManagedBuffer::new("edge lengths"),
            face_tangent_basis_x: ManagedBuffer::new("face tangent basis"),
            vertex_tangent_basis_x: ManagedBuffer::new("vertex tangent basis"),
            corner_positions: ManagedBuffer::new("corner positions"),
            corner_normals: ManagedBuffer::new("corner normals"),
            triangle_indices: ManagedBuffer::new("triangle indices"),
            edge_indices: ManagedBuffer::new("edge indices"),
            user_face_basis: false,
            user_vertex_basis: false,
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    // === Permutations

    /// Declares the caller's ordering for `element`.
    pub fn set_permutation(
        &mut self,
        element: ElementKind,
        indices: Vec<usize>,
        expected_size: Option<usize>,
    ) -> Result<()> {
        let n = self.connectivity.element_count(element);
        let permutation = Permutation::new(element, indices, n, expected_size)?;
        log::debug!(
            "{element} permutation set, caller arrays now hold {} entries",
            permutation.data_size()
        );
        self.permutations.insert(element, permutation);
        Ok(())
    }

    pub fn permutation(&self, element: ElementKind) -> Option<&Permutation> {
        self.permutations.get(&element)
    }

    /// Length caller data on `element` must have.
    pub fn expected_data_size(&self, element: ElementKind) -> usize {
        expected_size(
            self.connectivity.element_count(element),
            self.permutation(element),
        )
    }

    /// Caller array index holding the value for internal element `i`.
    pub fn data_index(&self, element: ElementKind, i: usize) -> usize {
        self.permutation(element).map_or(i, |p| p.get(i))
    }

    /// Whether per-vertex caller data can be bound to indexed draws unchanged.
    pub fn shares_vertex_order(&self) -> bool {
        self.permutation(ElementKind::Vertex)
            .map_or(true, Permutation::is_identity)
    }

    /// Caller data rearranged into internal element order.
    pub fn gather_elements<T: Copy>(&self, element: ElementKind, data: &[T]) -> Vec<T> {
        match self.permutation(element) {
            Some(p) => p.gather(data),
            None => data.to_vec(),
        }
    }

    /// Caller data spread onto triangle corners, three entries per triangle.
    ///
    /// Edge and halfedge data at a corner come from the halfedge leaving it.
    pub fn gather_corners<T: Copy>(&self, element: ElementKind, data: &[T]) -> Vec<T> {
        let conn = &self.connectivity;
        let internal = |c: usize| match element {
            ElementKind::Vertex => conn.corner_vertex(c),
            ElementKind::Face => conn.face_for_halfedge(c),
            ElementKind::Edge => conn.halfedge_edge(c),
            ElementKind::Halfedge | ElementKind::Corner => c,
        };
        conn.triangle_corners()
            .iter()
            .flatten()
            .map(|&c| data[self.data_index(element, internal(c))])
            .collect()
    }

    // === Positions

    /// Replaces vertex positions and refreshes every derived array.
    ///
    /// Derived arrays with a render buffer are recomputed immediately so the
    /// buffers stay current; the rest are recomputed on demand.
    pub fn update_vertex_positions(&mut self, positions: Vec<Vec3>) -> Result<()> {
        self.vertex_positions
            .update_data(positions, self.connectivity.n_vertices())?;
        self.invalidate_derived();
        self.refresh_allocated_derived()
    }

    fn invalidate_derived(&mut self) {
        self.vertex_normals.invalidate();
        self.face_normals.invalidate();
        self.face_centers.invalidate();
        self.face_areas.invalidate();
        self.vertex_areas.invalidate();
        self.edge_lengths.invalidate();
        if !self.user_face_basis {
            self.face_tangent_basis_x.invalidate();
        }
        if !self.user_vertex_basis {
            self.vertex_tangent_basis_x.invalidate();
        }
        self.corner_positions.invalidate();
        self.corner_normals.invalidate();
    }

    fn refresh_allocated_derived(&mut self) -> Result<()> {
        if self.vertex_normals.has_render_buffer() {
            self.ensure_vertex_normals()?;
        }
        if self.face_normals.has_render_buffer() {
            self.ensure_face_normals()?;
        }
        if self.face_centers.has_render_buffer() {
            self.ensure_face_centers()?;
        }
        if self.face_areas.has_render_buffer() {
            self.ensure_face_areas()?;
        }
        if self.vertex_areas.has_render_buffer() {
            self.ensure_vertex_areas()?;
        }
        if self.edge_lengths.has_render_buffer() {
            self.ensure_edge_lengths()?;
        }
        if self.face_tangent_basis_x.has_render_buffer() {
            self.ensure_face_tangent_basis()?;
        }
        if self.vertex_tangent_basis_x.has_render_buffer() {
            self.ensure_vertex_tangent_basis()?;
        }
        if self.corner_positions.has_render_buffer() || self.corner_normals.has_render_buffer() {
            self.ensure_corner_geometry()?;
        }
        Ok(())
    }

    // === Derived data

    pub fn ensure_face_normals(&mut self) -> Result<()> {
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        self.face_normals
            .ensure_host_data(|| Ok(compute_face_normals(positions.require_host_data()?, conn)))
    }

    pub fn ensure_face_areas(&mut self) -> Result<()> {
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        self.face_areas
            .ensure_host_data(|| Ok(compute_face_areas(positions.require_host_data()?, conn)))
    }

    pub fn ensure_face_centers(&mut self) -> Result<()> {
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        self.face_centers
            .ensure_host_data(|| Ok(compute_face_centers(positions.require_host_data()?, conn)))
    }

    pub fn ensure_vertex_normals(&mut self) -> Result<()> {
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        self.vertex_normals
            .ensure_host_data(|| Ok(compute_vertex_normals(positions.require_host_data()?, conn)))
    }

    pub fn ensure_vertex_areas(&mut self) -> Result<()> {
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        self.vertex_areas
            .ensure_host_data(|| Ok(compute_vertex_areas(positions.require_host_data()?, conn)))
    }

    pub fn ensure_edge_lengths(&mut self) -> Result<()> {
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        self.edge_lengths
            .ensure_host_data(|| Ok(compute_edge_lengths(positions.require_host_data()?, conn)))
    }

    pub fn ensure_face_tangent_basis(&mut self) -> Result<()> {
        self.ensure_face_normals()?;
        let (positions, conn, normals) =
            (&self.vertex_positions, &self.connectivity, &self.face_normals);
        self.face_tangent_basis_x.ensure_host_data(|| {
            Ok(compute_face_tangent_basis(
                positions.require_host_data()?,
                conn,
                normals.require_host_data()?,
            ))
        })
    }

    pub fn ensure_vertex_tangent_basis(&mut self) -> Result<()> {
        self.ensure_face_normals()?;
        self.ensure_vertex_normals()?;
        let (positions, conn) = (&self.vertex_positions, &self.connectivity);
        let (face_normals, vertex_normals) = (&self.face_normals, &self.vertex_normals);
        self.vertex_tangent_basis_x.ensure_host_data(|| {
            Ok(compute_vertex_tangent_basis(
                positions.require_host_data()?,
                conn,
                face_normals.require_host_data()?,
                vertex_normals.require_host_data()?,
            ))
        })
    }

    /// Overrides the per-face tangent basis; it then survives position updates.
    pub fn set_face_tangent_basis_x(&mut self, basis: Vec<Vec3>) -> Result<()> {
        check_size(
            "face tangent basis",
            self.expected_data_size(ElementKind::Face),
            basis.len(),
        )?;
        let basis = self.gather_elements(ElementKind::Face, &basis);
        self.face_tangent_basis_x
            .update_data(basis, self.connectivity.n_faces())?;
        self.user_face_basis = true;
        Ok(())
    }

    /// Overrides the per-vertex tangent basis; it then survives position updates.
    pub fn set_vertex_tangent_basis_x(&mut self, basis: Vec<Vec3>) -> Result<()> {
        check_size(
            "vertex tangent basis",
            self.expected_data_size(ElementKind::Vertex),
            basis.len(),
        )?;
        let basis = self.gather_elements(ElementKind::Vertex, &basis);
        self.vertex_tangent_basis_x
            .update_data(basis, self.connectivity.n_vertices())?;
        self.user_vertex_basis = true;
        Ok(())
    }

    /// Per-corner positions and normals for non-indexed triangle draws.
    pub fn ensure_corner_geometry(&mut self) -> Result<()> {
        self.ensure_vertex_normals()?;
        let conn = &self.connectivity;
        let (positions, normals) = (&self.vertex_positions, &self.vertex_normals);
        let spread = |values: &[Vec3]| -> Vec<Vec3> {
            conn.triangle_corners()
                .iter()
                .flatten()
                .map(|&c| values[conn.corner_vertex(c)])
                .collect()
        };
        self.corner_positions
            .ensure_host_data(|| Ok(spread(positions.require_host_data()?)))?;
        self.corner_normals
            .ensure_host_data(|| Ok(spread(normals.require_host_data()?)))
    }

    /// Vertex index lists for indexed triangle and edge draws.
    pub fn ensure_index_buffers(&mut self) -> Result<()> {
        let conn = &self.connectivity;
        self.triangle_indices.ensure_host_data(|| {
            Ok(conn
                .triangle_corners()
                .iter()
                .flatten()
                .map(|&c| conn.corner_vertices()[c])
                .collect())
        })?;
        self.edge_indices
            .ensure_host_data(|| Ok(conn.edges().iter().flatten().copied().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_pair() -> Connectivity {
        // Two triangles sharing the edge 1-2.
        Connectivity::from_faces(4, &[[0u32, 1, 2], [2, 1, 3]]).unwrap()
    }

    /// Test element counts for two triangles sharing an edge.
    #[test]
    fn test_counts() {
        let conn = quad_pair();
        assert_eq!(conn.n_vertices(), 4);
        assert_eq!(conn.n_faces(), 2);
        assert_eq!(conn.n_edges(), 5);
        assert_eq!(conn.n_halfedges(), 6);
        assert_eq!(conn.n_corners(), 6);
        assert_eq!(conn.n_triangles(), 2);
        assert_eq!(conn.edges(), &[[0, 1], [1, 2], [0, 2], [1, 3], [2, 3]]);
    }

    /// Test fan triangulation of a polygon.
    #[test]
    fn test_polygon_triangulation() {
        let conn = Connectivity::from_faces(5, &[vec![0u32, 1, 2, 3, 4]]).unwrap();
        assert_eq!(conn.n_triangles(), 3);
        assert_eq!(conn.triangle_corners(), &[[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
        assert_eq!(conn.n_edges(), 5);
        assert_eq!(conn.next_corner(4), 0);
    }

    /// Test malformed connectivity is rejected.
    #[test]
    fn test_invalid_faces() {
        assert!(matches!(
            Connectivity::from_faces(3, &[[0u32, 1]]),
            Err(GeoscopeError::InvalidMesh(_))
        ));
        assert!(matches!(
            Connectivity::from_faces(3, &[[0u32, 1, 3]]),
            Err(GeoscopeError::InvalidMesh(_))
        ));
        assert!(Connectivity::from_csr(3, vec![0, 1, 2], vec![0, 2]).is_err());
    }

    /// Test twins on a manifold mesh and on a boundary.
    #[test]
    fn test_twin_halfedges() {
        let conn = quad_pair();
        // Halfedge 1 is 1->2 in face 0, halfedge 3 is 2->1 in face 1.
        assert_eq!(conn.twin_halfedge(1), 3);
        assert_eq!(conn.twin_halfedge(3), 1);
        assert_eq!(conn.twin_halfedge(0), 0);
        assert_eq!(conn.face_for_halfedge(4), 1);
    }

    /// Test that non-manifold edges still get a deterministic twin.
    #[test]
    fn test_non_manifold_twin() {
        // Three triangles fan around the edge 0-1.
        let conn = Connectivity::from_faces(5, &[[0u32, 1, 2], [1, 0, 3], [1, 0, 4]]).unwrap();
        assert_eq!(conn.twin_halfedge(0), 3);
        assert_eq!(conn.twin_halfedge(3), 0);
        assert_eq!(conn.twin_halfedge(6), 0);
    }

    /// Test derived geometry of a unit right triangle.
    #[test]
    fn test_derived_geometry() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let conn = Connectivity::from_faces(3, &[[0u32, 1, 2]]).unwrap();
        assert_eq!(compute_face_normals(&positions, &conn), vec![Vec3::Z]);
        assert!((compute_face_areas(&positions, &conn)[0] - 0.5).abs() < 1e-6);
        let areas = compute_vertex_areas(&positions, &conn);
        assert!(areas.iter().all(|a| (a - 0.5 / 3.0).abs() < 1e-6));
        let lengths = compute_edge_lengths(&positions, &conn);
        assert!((lengths[1] - 2.0f32.sqrt()).abs() < 1e-6);
        let normals = compute_face_normals(&positions, &conn);
        assert_eq!(compute_face_tangent_basis(&positions, &conn, &normals), vec![Vec3::X]);
    }

    /// Test corner gathering follows permutations.
    #[test]
    fn test_gather_corners_with_permutation() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE];
        let mut geometry = MeshGeometry::new(positions, quad_pair());
        geometry
            .set_permutation(ElementKind::Face, vec![1, 0], None)
            .unwrap();
        let corners = geometry.gather_corners(ElementKind::Face, &[10.0f32, 20.0]);
        assert_eq!(corners, vec![20.0, 20.0, 20.0, 10.0, 10.0, 10.0]);

        let edge_values: Vec<f32> = (0..5).map(|e| e as f32).collect();
        let corners = geometry.gather_corners(ElementKind::Edge, &edge_values);
        assert_eq!(corners, vec![0.0, 1.0, 2.0, 1.0, 3.0, 4.0]);
    }

    /// Test that a position update refreshes allocated derived buffers.
    #[test]
    fn test_position_update_refreshes_buffers() {
        let engine = geoscope_render::HeadlessEngine::new();
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let conn = Connectivity::from_faces(3, &[[0u32, 1, 2]]).unwrap();
        let mut geometry = MeshGeometry::new(positions, conn);

        geometry.ensure_face_normals().unwrap();
        let buffer = geometry.face_normals.render_buffer(&engine).unwrap();
        assert_eq!(buffer.get_value::<Vec3>(0).unwrap(), Vec3::Z);

        geometry
            .update_vertex_positions(vec![Vec3::ZERO, Vec3::Y, Vec3::X])
            .unwrap();
        assert_eq!(buffer.get_value::<Vec3>(0).unwrap(), -Vec3::Z);
        assert_eq!(buffer.upload_count(), 2);
        assert!(geometry
            .update_vertex_positions(vec![Vec3::ZERO])
            .is_err());
    }
}
