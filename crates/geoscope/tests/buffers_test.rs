//! Lazy upload, sharing, and residency of managed buffers.

use std::rc::Rc;

use geoscope::*;
use proptest::prelude::*;

fn quad_pair_vertices() -> Vec<Vec3> {
    vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)]
}

const QUAD_PAIR: [[u32; 3]; 2] = [[0, 1, 2], [2, 1, 3]];

#[test]
fn test_nothing_uploads_before_draw() {
    let mut session = Session::headless();
    session
        .register_surface_mesh("mesh", quad_pair_vertices(), &QUAD_PAIR)
        .unwrap()
        .add_vertex_scalar_quantity("height", vec![0.0, 1.0, 2.0, 3.0])
        .unwrap();
    assert!(session.engine().draw_log().is_empty());

    let engine = HeadlessEngine::new();
    let mesh = session.get_surface_mesh_mut("mesh").unwrap();
    let buffer = mesh.vertex_positions_render_buffer(&engine).unwrap();
    assert_eq!(buffer.upload_count(), 1);
    assert_eq!(buffer.data_size(), 4);
}

#[test]
fn test_repeated_draws_reuse_buffers() {
    let mut session = Session::headless();
    session
        .register_surface_mesh("mesh", quad_pair_vertices(), &QUAD_PAIR)
        .unwrap();
    session.draw().unwrap();
    session.draw().unwrap();

    let log = session.engine().draw_log();
    assert_eq!(log.len(), 2);
    let first = log[0].attribute("a_vertexPositions").unwrap();
    let second = log[1].attribute("a_vertexPositions").unwrap();
    assert!(Rc::ptr_eq(first, second));
    assert_eq!(first.upload_count(), 1);
}

#[test]
fn test_scalar_update_refills_bound_buffer() {
    let mut session = Session::headless();
    session
        .register_surface_mesh("mesh", quad_pair_vertices(), &QUAD_PAIR)
        .unwrap()
        .add_vertex_scalar_quantity("height", vec![0.0, 1.0, 2.0, 3.0])
        .unwrap();
    session.draw().unwrap();
    let bound = session.engine().draw_log()[0]
        .attribute("a_value")
        .unwrap()
        .clone();
    assert!(session.take_redraw_request());

    session
        .get_surface_mesh_mut("mesh")
        .unwrap()
        .get_quantity_mut_as::<MeshScalarQuantity>("height")
        .unwrap()
        .update_data(vec![3.0, 2.0, 1.0, 0.0])
        .unwrap();
    assert!(session.take_redraw_request());
    assert_eq!(bound.get_data::<f32>().unwrap(), vec![3.0, 2.0, 1.0, 0.0]);
    assert_eq!(bound.upload_count(), 2);
}

#[test]
fn test_derived_buffers_follow_position_updates() {
    let engine = HeadlessEngine::new();
    let mut session = Session::headless();
    let mesh = session
        .register_surface_mesh("mesh", quad_pair_vertices(), &QUAD_PAIR)
        .unwrap();
    let areas = mesh
        .derived_render_buffer(DerivedArray::FaceAreas, &engine)
        .unwrap();
    assert_eq!(areas.get_data::<f32>().unwrap(), vec![0.5, 0.5]);
    let lengths = mesh.edge_lengths().unwrap().to_vec();

    let doubled: Vec<Vec3> = quad_pair_vertices().iter().map(|p| *p * 2.0).collect();
    mesh.update_vertex_positions(doubled).unwrap();
    assert_eq!(areas.get_data::<f32>().unwrap(), vec![2.0, 2.0]);

    // Arrays never uploaded are recomputed on demand instead.
    let doubled_lengths: Vec<f32> = lengths.iter().map(|l| l * 2.0).collect();
    assert_eq!(mesh.edge_lengths().unwrap(), doubled_lengths.as_slice());
}

#[test]
fn test_device_resident_positions() {
    let engine = HeadlessEngine::new();
    let mut session = Session::headless();
    let mesh = session
        .register_surface_mesh("mesh", quad_pair_vertices(), &QUAD_PAIR)
        .unwrap();
    let buffer = mesh.vertex_positions_render_buffer(&engine).unwrap();
    buffer.set_data(&[Vec3::ZERO, Vec3::Z, Vec3::Y, Vec3::ONE]).unwrap();
    mesh.mark_vertex_positions_updated().unwrap();

    assert!(mesh.vertices().is_empty());
    assert_eq!(mesh.vertex_position(1).unwrap(), Vec3::Z);
    assert!(matches!(
        mesh.face_areas(),
        Err(GeoscopeError::HostDataUnavailable(_))
    ));
    let bounds = mesh.bounding_box().unwrap();
    assert_eq!(bounds, (Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)));

    // Host data written again becomes authoritative and flows into the same buffer.
    mesh.update_vertex_positions(quad_pair_vertices()).unwrap();
    assert_eq!(mesh.vertices().len(), 4);
    assert_eq!(buffer.get_value::<Vec3>(1).unwrap(), Vec3::X);
}

#[test]
fn test_mark_updated_requires_render_buffer() {
    let mut buffer = ManagedBuffer::with_data("values", vec![1.0f32, 2.0]);
    assert!(matches!(
        buffer.mark_externally_updated(),
        Err(GeoscopeError::RenderBufferNotAllocated(_))
    ));
    assert_eq!(buffer.residency(), Residency::Host);
}

proptest! {
    #[test]
    fn test_render_buffer_is_idempotent(
        data in proptest::collection::vec(-1.0e3f32..1.0e3, 1..64),
        requests in 1usize..6,
    ) {
        let engine = HeadlessEngine::new();
        let mut buffer = ManagedBuffer::with_data("values", data.clone());
        let first = buffer.render_buffer(&engine).unwrap();
        for _ in 1..requests {
            let again = buffer.render_buffer(&engine).unwrap();
            prop_assert!(Rc::ptr_eq(&first, &again));
        }
        prop_assert_eq!(first.upload_count(), 1);
        prop_assert_eq!(first.get_data::<f32>().unwrap(), data);
    }
}
