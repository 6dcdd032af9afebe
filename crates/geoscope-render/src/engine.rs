//! The engine boundary: resource factories plus the shader program and rule cache.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::buffer::{AttributeBuffer, FrameBuffer, RenderBuffer, Texture};
use crate::error::{RenderError, RenderResult};
use crate::shader::{
    apply_shader_replacements, ShaderProgram, ShaderReplacementDefaults, ShaderReplacementRule,
    ShaderStageSpecification,
};
use crate::shaders;
use crate::types::{DrawMode, RenderBufferType, RenderDataType, TextureDimension, TextureFormat};

/// Shared "something changed, draw again" flag.
#[derive(Debug, Clone, Default)]
pub struct RedrawRequest(Rc<Cell<bool>>);

impl RedrawRequest {
    pub fn request(&self) {
        self.0.set(true);
    }

    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    /// Returns whether a redraw was requested and clears the flag.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

#[derive(Debug, Clone)]
struct RegisteredProgram {
    stages: Vec<ShaderStageSpecification>,
    draw_mode: DrawMode,
}

/// A base program with a rule list applied, ready to compile.
#[derive(Debug, Clone)]
pub struct ComposedProgram {
    /// Program name and full rule list, e.g. `MESH[LIGHT_DIFFUSE,SHADE_BASECOLOR]`.
    pub key: String,
    pub stages: Vec<ShaderStageSpecification>,
    pub draw_mode: DrawMode,
}

/// Named base programs, named rules, and composed stage lists keyed by request.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    programs: RefCell<HashMap<String, RegisteredProgram>>,
    rules: RefCell<HashMap<String, ShaderReplacementRule>>,
    composed: RefCell<HashMap<String, Rc<ComposedProgram>>>,
}

impl ShaderLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// A library pre-populated with the built-in programs and rules.
    pub fn with_defaults() -> Self {
        let library = Self::new();
        shaders::populate_defaults(&library);
        library
    }

    /// Registers a base program, replacing any program with the same name.
    pub fn register_program(
        &self,
        name: &str,
        stages: Vec<ShaderStageSpecification>,
        draw_mode: DrawMode,
    ) {
        self.programs
            .borrow_mut()
            .insert(name.to_string(), RegisteredProgram { stages, draw_mode });
        self.composed.borrow_mut().clear();
    }

    /// Registers a rule, replacing any rule with the same name.
    pub fn register_rule(&self, name: &str, rule: ShaderReplacementRule) {
        self.rules.borrow_mut().insert(name.to_string(), rule);
        self.composed.borrow_mut().clear();
    }

    pub fn has_program(&self, name: &str) -> bool {
        self.programs.borrow().contains_key(name)
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.borrow().contains_key(name)
    }

    /// Number of distinct composed programs currently cached.
    pub fn composed_count(&self) -> usize {
        self.composed.borrow().len()
    }

    /// Resolves a program and its rules, default rules first, into composed stages.
    ///
    /// Identical requests return the same cached composition.
    pub fn compose(
        &self,
        program_name: &str,
        rule_names: &[&str],
        defaults: ShaderReplacementDefaults,
    ) -> RenderResult<Rc<ComposedProgram>> {
        let full_rules: Vec<&str> = shaders::default_rules(defaults)
            .iter()
            .copied()
            .chain(rule_names.iter().copied())
            .collect();
        let key = format!("{program_name}[{}]", full_rules.join(","));

        if let Some(cached) = self.composed.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let programs = self.programs.borrow();
        let base = programs
            .get(program_name)
            .ok_or_else(|| RenderError::ProgramNotFound(program_name.to_string()))?;

        let rules = self.rules.borrow();
        let resolved = full_rules
            .iter()
            .map(|name| {
                rules
                    .get(*name)
                    .ok_or_else(|| RenderError::RuleNotFound((*name).to_string()))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        log::debug!("composing shader program {key}");
        let composed = Rc::new(ComposedProgram {
            key: key.clone(),
            stages: apply_shader_replacements(&base.stages, &resolved),
            draw_mode: base.draw_mode,
        });
        self.composed.borrow_mut().insert(key, composed.clone());
        Ok(composed)
    }
}

/// Factory for render resources and compiled programs.
///
/// This trait is the only place structures touch a graphics backend.
pub trait Engine {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    fn generate_attribute_buffer(
        &self,
        data_type: RenderDataType,
        array_count: usize,
    ) -> Rc<dyn AttributeBuffer>;

    fn generate_texture(
        &self,
        dimension: TextureDimension,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn Texture>>;

    fn generate_render_buffer(
        &self,
        kind: RenderBufferType,
        width: u32,
        height: u32,
    ) -> RenderResult<Rc<dyn RenderBuffer>>;

    fn generate_frame_buffer(&self, width: u32, height: u32) -> RenderResult<Rc<dyn FrameBuffer>>;

    /// Compiles already-composed stages into a program with a fresh binding table.
    fn compile_program(
        &self,
        name: &str,
        stages: &[ShaderStageSpecification],
        draw_mode: DrawMode,
    ) -> RenderResult<ShaderProgram>;

    fn shader_library(&self) -> &ShaderLibrary;

    fn redraw_request(&self) -> &RedrawRequest;

    /// Starts capturing backend validation errors raised by the following calls.
    ///
    /// Backends that validate eagerly have nothing to capture.
    fn push_error_scope(&self) {}

    /// Closes the innermost error scope, failing with the first error it captured.
    fn pop_error_scope(&self) -> RenderResult<()> {
        Ok(())
    }

    fn register_shader_program(
        &self,
        name: &str,
        stages: Vec<ShaderStageSpecification>,
        draw_mode: DrawMode,
    ) {
        self.shader_library().register_program(name, stages, draw_mode);
    }

    fn register_shader_rule(&self, name: &str, rule: ShaderReplacementRule) {
        self.shader_library().register_rule(name, rule);
    }

    /// Resolves `program_name` with `rules` applied in order and compiles it.
    ///
    /// Each call returns an independent program; only the composed source is shared.
    fn request_shader(
        &self,
        program_name: &str,
        rules: &[&str],
        defaults: ShaderReplacementDefaults,
    ) -> RenderResult<ShaderProgram> {
        let composed = self.shader_library().compose(program_name, rules, defaults)?;
        self.compile_program(&composed.key, &composed.stages, composed.draw_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderStageType;

    fn library() -> ShaderLibrary {
        let library = ShaderLibrary::new();
        library.register_program(
            "P",
            vec![ShaderStageSpecification::new(
                ShaderStageType::Vertex,
                "${ BODY }$",
            )],
            DrawMode::Triangles,
        );
        library.register_rule("A", ShaderReplacementRule::new("A").replace("BODY", "a"));
        library.register_rule("B", ShaderReplacementRule::new("B").replace("BODY", "b"));
        library
    }

    /// Test that identical requests share one composition.
    #[test]
    fn test_compose_is_cached() {
        let library = library();
        let first = library
            .compose("P", &["A", "B"], ShaderReplacementDefaults::Process)
            .unwrap();
        let second = library
            .compose("P", &["A", "B"], ShaderReplacementDefaults::Process)
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(library.composed_count(), 1);
        assert_eq!(first.key, "P[A,B]");
    }

    /// Test that rule order changes the result.
    #[test]
    fn test_rule_order_is_significant() {
        let library = library();
        let ab = library
            .compose("P", &["A", "B"], ShaderReplacementDefaults::Process)
            .unwrap();
        let ba = library
            .compose("P", &["B", "A"], ShaderReplacementDefaults::Process)
            .unwrap();
        assert_eq!(ab.stages[0].src, "a\nb\n");
        assert_eq!(ba.stages[0].src, "b\na\n");
    }

    /// Test lookup errors name the missing key.
    #[test]
    fn test_unknown_names() {
        let library = library();
        assert_eq!(
            library
                .compose("Q", &[], ShaderReplacementDefaults::Process)
                .unwrap_err(),
            RenderError::ProgramNotFound("Q".into())
        );
        assert_eq!(
            library
                .compose("P", &["A", "NOPE"], ShaderReplacementDefaults::Process)
                .unwrap_err(),
            RenderError::RuleNotFound("NOPE".into())
        );
    }

    /// Test that re-registering a rule invalidates cached compositions.
    #[test]
    fn test_register_rule_clears_cache() {
        let library = library();
        library
            .compose("P", &["A"], ShaderReplacementDefaults::Process)
            .unwrap();
        library.register_rule("A", ShaderReplacementRule::new("A").replace("BODY", "z"));
        assert_eq!(library.composed_count(), 0);
        let composed = library
            .compose("P", &["A"], ShaderReplacementDefaults::Process)
            .unwrap();
        assert_eq!(composed.stages[0].src, "z\n");
    }

    /// Test the redraw flag round trip.
    #[test]
    fn test_redraw_request() {
        let flag = RedrawRequest::default();
        let shared = flag.clone();
        assert!(!flag.take());
        shared.request();
        assert!(flag.is_requested());
        assert!(flag.take());
        assert!(!flag.is_requested());
    }
}
