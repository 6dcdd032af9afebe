//! Built-in WGSL programs and replacement rules.
//!
//! Stage sources reference uniforms as `u.<name>`, attributes as
//! `input.<name>`, and a texture `t_x` together with its sampler
//! `t_x_sampler`. Backends that compile real shaders generate those
//! declarations from the stage specifications.

use crate::engine::ShaderLibrary;
use crate::shader::{
    ShaderReplacementDefaults, ShaderReplacementRule, ShaderStageSpecification, ShaderStageType,
};
use crate::types::{DrawMode, RenderDataType, TextureDimension};

/// Indexed triangles sharing per-vertex buffers.
pub const MESH: &str = "MESH";
/// Non-indexed triangles with one entry per triangle corner.
pub const MESH_EXPANDED: &str = "MESH_EXPANDED";
/// Mesh edges as indexed line segments over the vertex positions.
pub const MESH_EDGES: &str = "MESH_EDGES";
pub const POINTS: &str = "POINTS";
/// Independent line segments, two vertices each.
pub const LINES: &str = "LINES";

pub const LIGHT_DIFFUSE: &str = "LIGHT_DIFFUSE";
pub const LIGHT_PASSTHRU: &str = "LIGHT_PASSTHRU";
pub const SHADE_BASECOLOR: &str = "SHADE_BASECOLOR";
pub const SHADE_COLOR: &str = "SHADE_COLOR";
pub const SHADE_COLORMAP_VALUE: &str = "SHADE_COLORMAP_VALUE";
pub const PROPAGATE_VALUE: &str = "PROPAGATE_VALUE";
pub const PROPAGATE_COLOR: &str = "PROPAGATE_COLOR";
pub const MESH_FLAT_SHADE: &str = "MESH_FLAT_SHADE";
pub const MESH_BACKFACE_FLIP: &str = "MESH_BACKFACE_FLIP";
pub const MESH_BACKFACE_DIFFERENT: &str = "MESH_BACKFACE_DIFFERENT";
pub const MESH_BACKFACE_CULL: &str = "MESH_BACKFACE_CULL";

const MESH_VERT: &str = r"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) position_view: vec3<f32>,
    @location(1) normal_view: vec3<f32>,
${ VERT_OUTPUT_FIELDS }$
};

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let position_view = u.u_modelView * vec4<f32>(input.a_vertexPositions, 1.0);
    out.clip_position = u.u_projMatrix * position_view;
    out.position_view = position_view.xyz;
    out.normal_view = (u.u_modelView * vec4<f32>(input.a_vertexNormals, 0.0)).xyz;
${ VERT_ASSIGNMENTS }$
    return out;
}
";

const MESH_FRAG: &str = r"
@fragment
fn fs_main(input: VertexOutput, @builtin(front_facing) front_facing: bool) -> @location(0) vec4<f32> {
    var albedo = vec3<f32>(0.8, 0.8, 0.8);
    var normal = normalize(input.normal_view);
${ GENERATE_SHADE_COLOR }$
${ ADJUST_NORMAL }$
    var lit = albedo;
${ GENERATE_LIT_COLOR }$
    return vec4<f32>(lit, 1.0);
}
";

const PLAIN_VERT: &str = r"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) position_view: vec3<f32>,
${ VERT_OUTPUT_FIELDS }$
};

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let position_view = u.u_modelView * vec4<f32>(input.a_position, 1.0);
    out.clip_position = u.u_projMatrix * position_view;
    out.position_view = position_view.xyz;
${ VERT_ASSIGNMENTS }$
    return out;
}
";

const PLAIN_FRAG: &str = r"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var albedo = vec3<f32>(0.0, 0.0, 0.0);
    let normal = vec3<f32>(0.0, 0.0, 1.0);
${ GENERATE_SHADE_COLOR }$
    var lit = albedo;
${ GENERATE_LIT_COLOR }$
    return vec4<f32>(lit, 1.0);
}
";

fn mesh_stages() -> Vec<ShaderStageSpecification> {
    vec![
        ShaderStageSpecification::new(ShaderStageType::Vertex, MESH_VERT)
            .with_uniform("u_modelView", RenderDataType::Matrix44Float)
            .with_uniform("u_projMatrix", RenderDataType::Matrix44Float)
            .with_attribute("a_vertexPositions", RenderDataType::Vector3Float)
            .with_attribute("a_vertexNormals", RenderDataType::Vector3Float),
        ShaderStageSpecification::new(ShaderStageType::Fragment, MESH_FRAG),
    ]
}

fn plain_stages() -> Vec<ShaderStageSpecification> {
    vec![
        ShaderStageSpecification::new(ShaderStageType::Vertex, PLAIN_VERT)
            .with_uniform("u_modelView", RenderDataType::Matrix44Float)
            .with_uniform("u_projMatrix", RenderDataType::Matrix44Float)
            .with_attribute("a_position", RenderDataType::Vector3Float),
        ShaderStageSpecification::new(ShaderStageType::Fragment, PLAIN_FRAG),
    ]
}

/// Rules prepended to every request with the given defaults.
pub fn default_rules(defaults: ShaderReplacementDefaults) -> &'static [&'static str] {
    match defaults {
        ShaderReplacementDefaults::SceneObject => &[LIGHT_DIFFUSE],
        ShaderReplacementDefaults::Pick => &[LIGHT_PASSTHRU],
        ShaderReplacementDefaults::Process => &[],
    }
}

fn builtin_rules() -> Vec<ShaderReplacementRule> {
    vec![
        ShaderReplacementRule::new(LIGHT_DIFFUSE).replace(
            "GENERATE_LIT_COLOR",
            "    lit = albedo * (0.3 + 0.7 * max(dot(normal, vec3<f32>(0.0, 0.0, 1.0)), 0.0));",
        ),
        ShaderReplacementRule::new(LIGHT_PASSTHRU),
        ShaderReplacementRule::new(SHADE_BASECOLOR)
            .with_uniform("u_baseColor", RenderDataType::Vector3Float)
            .replace("GENERATE_SHADE_COLOR", "    albedo = u.u_baseColor;"),
        ShaderReplacementRule::new(SHADE_COLOR)
            .replace("GENERATE_SHADE_COLOR", "    albedo = input.color;"),
        ShaderReplacementRule::new(SHADE_COLORMAP_VALUE)
            .with_uniform("u_rangeLow", RenderDataType::Float)
            .with_uniform("u_rangeHigh", RenderDataType::Float)
            .with_texture("t_colormap", TextureDimension::D1)
            .replace(
                "GENERATE_SHADE_COLOR",
                "    let range = max(u.u_rangeHigh - u.u_rangeLow, 1e-12);
    let t = clamp((input.value - u.u_rangeLow) / range, 0.0, 1.0);
    albedo = textureSample(t_colormap, t_colormap_sampler, t).rgb;",
            ),
        ShaderReplacementRule::new(PROPAGATE_VALUE)
            .with_attribute("a_value", RenderDataType::Float)
            .replace("VERT_OUTPUT_FIELDS", "    @location(2) value: f32,")
            .replace("VERT_ASSIGNMENTS", "    out.value = input.a_value;"),
        ShaderReplacementRule::new(PROPAGATE_COLOR)
            .with_attribute("a_color", RenderDataType::Vector3Float)
            .replace("VERT_OUTPUT_FIELDS", "    @location(3) color: vec3<f32>,")
            .replace("VERT_ASSIGNMENTS", "    out.color = input.a_color;"),
        ShaderReplacementRule::new(MESH_FLAT_SHADE).replace(
            "ADJUST_NORMAL",
            "    normal = normalize(cross(dpdx(input.position_view), dpdy(input.position_view)));",
        ),
        ShaderReplacementRule::new(MESH_BACKFACE_FLIP).replace(
            "ADJUST_NORMAL",
            "    if (!front_facing) { normal = -normal; }",
        ),
        ShaderReplacementRule::new(MESH_BACKFACE_DIFFERENT)
            .with_uniform("u_backfaceColor", RenderDataType::Vector3Float)
            .replace(
                "ADJUST_NORMAL",
                "    if (!front_facing) { normal = -normal; albedo = u.u_backfaceColor; }",
            ),
        ShaderReplacementRule::new(MESH_BACKFACE_CULL)
            .replace("ADJUST_NORMAL", "    if (!front_facing) { discard; }"),
    ]
}

/// Registers every built-in program and rule.
pub fn populate_defaults(library: &ShaderLibrary) {
    library.register_program(MESH, mesh_stages(), DrawMode::IndexedTriangles);
    library.register_program(MESH_EXPANDED, mesh_stages(), DrawMode::Triangles);
    library.register_program(MESH_EDGES, plain_stages(), DrawMode::IndexedLines);
    library.register_program(POINTS, plain_stages(), DrawMode::Points);
    library.register_program(LINES, plain_stages(), DrawMode::Lines);
    for rule in builtin_rules() {
        let name = rule.name.clone();
        library.register_rule(&name, rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::is_referenced;

    /// Test that every default rule list names a registered rule.
    #[test]
    fn test_default_rules_registered() {
        let library = ShaderLibrary::with_defaults();
        for defaults in [
            ShaderReplacementDefaults::SceneObject,
            ShaderReplacementDefaults::Pick,
            ShaderReplacementDefaults::Process,
        ] {
            for rule in default_rules(defaults) {
                assert!(library.has_rule(rule), "{rule} missing");
            }
        }
    }

    /// Test that a colormapped mesh composes into a source using the rule's names.
    #[test]
    fn test_colormap_composition() {
        let library = ShaderLibrary::with_defaults();
        let composed = library
            .compose(
                MESH,
                &[PROPAGATE_VALUE, SHADE_COLORMAP_VALUE],
                ShaderReplacementDefaults::SceneObject,
            )
            .unwrap();
        assert_eq!(composed.key, "MESH[LIGHT_DIFFUSE,PROPAGATE_VALUE,SHADE_COLORMAP_VALUE]");
        assert!(is_referenced(&composed.stages, "a_value"));
        assert!(is_referenced(&composed.stages, "t_colormap"));
        assert!(composed.stages.iter().all(|s| !s.src.contains("${")));
        assert_eq!(composed.stages[0].attributes.len(), 3);
    }
}
