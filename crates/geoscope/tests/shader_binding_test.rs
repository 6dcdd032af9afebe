//! Requesting programs from a session's engine and binding them by hand.

use geoscope::*;
use geoscope_render::shaders::{MESH, POINTS, SHADE_BASECOLOR, SHADE_COLOR};

fn triangle() -> [Vec3; 3] {
    [Vec3::ZERO, Vec3::X, Vec3::Y]
}

fn bind_mesh_inputs(program: &mut ShaderProgram) {
    program.set_uniform("u_modelView", Mat4::IDENTITY).unwrap();
    program.set_uniform("u_projMatrix", Mat4::IDENTITY).unwrap();
    program.set_attribute("a_vertexPositions", &triangle()).unwrap();
    program.set_attribute("a_vertexNormals", &[Vec3::Z; 3]).unwrap();
}

#[test]
fn test_rules_extend_binding_table() {
    let session = Session::headless();
    let engine = session.engine();

    let plain = engine
        .request_shader(MESH, &[], ShaderReplacementDefaults::SceneObject)
        .unwrap();
    assert!(!plain.has_uniform("u_baseColor"));

    let mut shaded = engine
        .request_shader(MESH, &[SHADE_BASECOLOR], ShaderReplacementDefaults::SceneObject)
        .unwrap();
    assert_eq!(shaded.name(), "MESH[LIGHT_DIFFUSE,SHADE_BASECOLOR]");
    assert!(shaded.has_uniform("u_baseColor"));
    assert!(matches!(
        shaded.set_uniform("u_baseColor", 1.0f32),
        Err(RenderError::TypeMismatch { .. })
    ));
    assert!(matches!(
        shaded.set_uniform("u_missing", Vec3::ONE),
        Err(RenderError::UniformNotFound { .. })
    ));
}

#[test]
fn test_unknown_names_are_rejected() {
    let session = Session::headless();
    let engine = session.engine();
    assert!(matches!(
        engine.request_shader("NOPE", &[], ShaderReplacementDefaults::Process),
        Err(RenderError::ProgramNotFound(_))
    ));
    assert!(matches!(
        engine.request_shader(POINTS, &["NOPE"], ShaderReplacementDefaults::Process),
        Err(RenderError::RuleNotFound(_))
    ));
}

#[test]
fn test_draw_requires_complete_binding() {
    let session = Session::headless();
    let mut program = session
        .engine()
        .request_shader(MESH, &[SHADE_BASECOLOR], ShaderReplacementDefaults::SceneObject)
        .unwrap();
    bind_mesh_inputs(&mut program);

    let err = program.draw().unwrap_err();
    assert!(matches!(err, RenderError::IncompleteBinding { ref slot, .. } if slot == "uniform u_baseColor"));

    program.set_uniform("u_baseColor", Vec3::ONE).unwrap();
    let err = program.draw().unwrap_err();
    assert!(matches!(err, RenderError::IncompleteBinding { ref slot, .. } if slot == "index"));

    program.set_index(&[0, 1, 2]).unwrap();
    program.draw().unwrap();

    let log = session.engine().draw_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].mode, DrawMode::IndexedTriangles);
    assert_eq!((log[0].vertex_count, log[0].index_count), (3, 3));
    assert_eq!(log[0].uniform("u_baseColor"), Some(UniformValue::Vec3(Vec3::ONE)));
}

#[test]
fn test_attribute_types_are_checked() {
    let session = Session::headless();
    let engine = session.engine();
    let mut program = engine
        .request_shader(POINTS, &[], ShaderReplacementDefaults::Process)
        .unwrap();
    program.set_uniform("u_modelView", Mat4::IDENTITY).unwrap();
    program.set_uniform("u_projMatrix", Mat4::IDENTITY).unwrap();
    assert!(matches!(
        program.draw(),
        Err(RenderError::IncompleteBinding { ref slot, .. }) if slot == "attribute a_position"
    ));

    let flat = engine.generate_attribute_buffer(RenderDataType::Vector2Float, 1);
    flat.set_data(&[Vec2::ZERO, Vec2::ONE]).unwrap();
    assert!(matches!(
        program.set_external_buffer("a_position", flat),
        Err(RenderError::TypeMismatch { .. })
    ));
    assert!(matches!(
        program.set_attribute("a_position", &[1.0f32, 2.0]),
        Err(RenderError::TypeMismatch { .. })
    ));

    let positions = engine.generate_attribute_buffer(RenderDataType::Vector3Float, 1);
    positions.set_data(&triangle()).unwrap();
    program.set_external_buffer("a_position", positions).unwrap();
    program.draw().unwrap();
    assert_eq!(engine.draw_log()[0].vertex_count, 3);
}

#[test]
fn test_draw_checks_shapes() {
    let session = Session::headless();
    let mut program = session
        .engine()
        .request_shader(MESH, &[], ShaderReplacementDefaults::SceneObject)
        .unwrap();
    bind_mesh_inputs(&mut program);
    program.set_index(&[0, 1, 5]).unwrap();
    assert!(matches!(
        program.draw(),
        Err(RenderError::IndexOutOfRange { index: 5, len: 3, .. })
    ));

    program.set_index(&[0, 1, 2]).unwrap();
    program.set_attribute("a_vertexNormals", &[Vec3::Z; 2]).unwrap();
    assert!(matches!(
        program.draw(),
        Err(RenderError::AttributeSizeMismatch { expected: 3, actual: 2, .. })
    ));
}

#[test]
fn test_programs_have_independent_bindings() {
    let session = Session::headless();
    let engine = session.engine();
    let mut first = engine
        .request_shader(POINTS, &[SHADE_COLOR], ShaderReplacementDefaults::SceneObject)
        .unwrap();
    let second = engine
        .request_shader(POINTS, &[SHADE_COLOR], ShaderReplacementDefaults::SceneObject)
        .unwrap();
    first.set_attribute("a_position", &triangle()).unwrap();
    assert!(first.attribute_is_set("a_position"));
    assert!(!second.attribute_is_set("a_position"));
    assert_eq!(first.name(), second.name());
}
