//! End-to-end surface mesh use: quantities, permutations, drawing, picking.

use geoscope::*;

/// A unit square split into two triangles plus a lone quad beside it.
fn register_scene(session: &mut Session) {
    let vertices = vec![
        Vec3::ZERO,
        Vec3::X,
        Vec3::Y,
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(2.0, 1.0, 0.0),
    ];
    let faces: Vec<Vec<u32>> = vec![vec![0, 1, 2], vec![2, 1, 3], vec![1, 4, 5, 3]];
    session
        .register_surface_mesh("shape", vertices, &faces)
        .unwrap();
}

fn labels(ui: &RecordingUi) -> Vec<String> {
    ui.events()
        .iter()
        .filter_map(|event| match event {
            UiEvent::Label(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_polygon_counts() {
    let mut session = Session::headless();
    register_scene(&mut session);
    let mesh = session.get_surface_mesh("shape").unwrap();
    assert_eq!(mesh.num_vertices(), 6);
    assert_eq!(mesh.num_faces(), 3);
    assert_eq!(mesh.num_corners(), 10);
    assert_eq!(mesh.num_halfedges(), 10);
    assert_eq!(mesh.num_triangles(), 4);
    assert_eq!(mesh.num_edges(), 8);
}

#[test]
fn test_scalar_then_color_draw() {
    let mut session = Session::headless();
    register_scene(&mut session);
    let mesh = session.get_surface_mesh_mut("shape").unwrap();
    mesh.add_vertex_scalar_quantity("height", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
        .unwrap();
    session.draw().unwrap();

    let log = session.engine().draw_log();
    assert_eq!(log.len(), 1);
    assert!(log[0].program.starts_with("MESH["));
    assert_eq!(log[0].index_count, 12);
    assert_eq!(log[0].uniform("u_rangeLow"), Some(UniformValue::Float(0.0)));
    assert_eq!(log[0].uniform("u_rangeHigh"), Some(UniformValue::Float(5.0)));
    assert!(log[0].textures.iter().any(|t| t == "t_colormap"));

    session.engine().clear_draw_log();
    session
        .get_surface_mesh_mut("shape")
        .unwrap()
        .add_face_color_quantity("region", vec![Vec3::X, Vec3::Y, Vec3::Z])
        .unwrap();
    session.draw().unwrap();

    let log = session.engine().draw_log();
    assert_eq!(log.len(), 1, "the color quantity replaces the scalar");
    assert!(log[0].program.starts_with("MESH_EXPANDED["));
    let colors = log[0].attribute("a_color").unwrap().get_data::<Vec3>().unwrap();
    assert_eq!(colors.len(), 12);
    assert_eq!(&colors[6..], &[Vec3::Z; 6]);
}

#[test]
fn test_permuted_vertex_data_is_gathered() {
    let mut session = Session::headless();
    register_scene(&mut session);
    let mesh = session.get_surface_mesh_mut("shape").unwrap();
    mesh.set_vertex_permutation(vec![5, 4, 3, 2, 1, 0], None)
        .unwrap();
    mesh.add_vertex_scalar_quantity("reversed", vec![50.0, 40.0, 30.0, 20.0, 10.0, 0.0])
        .unwrap();
    session.draw().unwrap();

    let log = session.engine().draw_log();
    assert!(log[0].program.starts_with("MESH_EXPANDED["));
    let values = log[0].attribute("a_value").unwrap().get_data::<f32>().unwrap();
    // Internal vertex i reads caller entry 5 - i, which holds 10 * i.
    assert_eq!(&values[..6], &[0.0, 10.0, 20.0, 20.0, 10.0, 30.0]);
}

#[test]
fn test_disabled_structure_is_skipped() {
    let mut session = Session::headless();
    register_scene(&mut session);
    session.register_point_cloud("dots", vec![Vec3::ZERO]).unwrap();
    session
        .get_surface_mesh_mut("shape")
        .unwrap()
        .set_enabled(false);
    session.draw().unwrap();

    let log = session.engine().draw_log();
    assert_eq!(log.len(), 1);
    assert!(log[0].program.starts_with("POINTS["));
}

#[test]
fn test_pick_resolution_and_panel() {
    let mut session = Session::headless();
    register_scene(&mut session);
    session
        .register_point_cloud("dots", vec![Vec3::ZERO, Vec3::X, Vec3::Y])
        .unwrap();
    session
        .get_surface_mesh_mut("shape")
        .unwrap()
        .add_face_scalar_quantity("area", vec![0.5, 0.5, 1.0])
        .unwrap();
    session.draw_pick().unwrap();

    // Point clouds sort before surface meshes, so the cloud takes indices 1..=3.
    let ranges = session.context().pick_ranges();
    assert_eq!(ranges.len(), 2);
    assert_eq!((ranges[0].start, ranges[0].count), (1, 3));
    assert_eq!(ranges[1].start, 4);
    assert_eq!(ranges[1].count, 6 + 3 + 8 + 10);

    assert_eq!(session.resolve_pick(0), None);
    let dot = session.resolve_pick(2).unwrap();
    assert_eq!((dot.name.as_str(), dot.local_index), ("dots", 1));

    // Vertices come first, then faces: local index 8 is face 2.
    let face = session.resolve_pick(4 + 8).unwrap();
    assert_eq!(face.type_name, "SurfaceMesh");
    let mut ui = RecordingUi::new();
    session.build_pick_ui(&mut ui, &face).unwrap();
    let text = labels(&ui);
    assert_eq!(text[0], "face #2");
    assert!(text.contains(&"degree 4".to_string()));
    assert!(text.contains(&"area: 1".to_string()));
}

#[test]
fn test_structure_options_from_ui() {
    let mut session = Session::headless();
    register_scene(&mut session);
    let mut ui = RecordingUi::new();
    ui.toggle("Show Edges");
    session.build_ui(&mut ui);
    assert!(session.get_surface_mesh("shape").unwrap().show_edges());

    session.draw().unwrap();
    let log = session.engine().draw_log();
    assert_eq!(log.len(), 2);
    assert!(log[1].program.starts_with("MESH_EDGES["));
    assert_eq!(log[1].index_count, 2 * 8);
}
