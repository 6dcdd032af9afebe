//! Per-session state.
//!
//! Everything a session needs lives in one [`Context`] value owned by the
//! caller. Independent contexts never share structures or options.

use geoscope_render::{ColorMapRegistry, Engine, FrameBuffer, RenderContext};
use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::options::Options;
use crate::registry::Registry;

/// The contiguous block of pick indices assigned to one structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRange {
    pub type_name: &'static str,
    pub name: String,
    pub start: u32,
    pub count: u32,
}

/// A decoded pick: which structure was hit and which of its elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickResult {
    pub type_name: &'static str,
    pub name: String,
    pub local_index: usize,
}

/// The state of one session: structures, options, camera, scene extents.
pub struct Context {
    /// The structure registry.
    pub registry: Registry,

    /// Session options.
    pub options: Options,

    /// Named color maps available to quantities.
    pub color_maps: ColorMapRegistry,

    /// World to view transform.
    pub view: Mat4,

    pub projection: Mat4,

    /// Representative length scale for all registered structures.
    pub length_scale: f32,

    /// Axis-aligned bounding box for all registered structures.
    pub bounding_box: (Vec3, Vec3),

    pick_ranges: Vec<PickRange>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Context {
    pub fn new(options: Options) -> Self {
        Self {
            registry: Registry::new(),
            options,
            color_maps: ColorMapRegistry::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            length_scale: 1.0,
            bounding_box: (Vec3::ZERO, Vec3::ONE),
            pick_ranges: Vec::new(),
        }
    }

    /// Computes the center of the bounding box.
    pub fn center(&self) -> Vec3 {
        (self.bounding_box.0 + self.bounding_box.1) * 0.5
    }

    /// Updates the scene bounding box and length scale from all structures.
    pub fn update_extents(&mut self) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut has_extent = false;

        for structure in self.registry.iter() {
            if let Some((bb_min, bb_max)) = structure.bounding_box() {
                min = min.min(bb_min);
                max = max.max(bb_max);
                has_extent = true;
            }
        }

        if has_extent {
            self.bounding_box = (min, max);
            self.length_scale = (max - min).length();
        } else {
            self.bounding_box = (Vec3::ZERO, Vec3::ONE);
            self.length_scale = 1.0;
        }
    }

    /// Draws every enabled structure.
    ///
    /// Stops at the first structure that fails to draw.
    pub fn draw(&mut self, engine: &dyn Engine) -> Result<()> {
        self.with_error_checks(engine, |this| {
            let ctx = RenderContext {
                engine,
                view: this.view,
                projection: this.projection,
                color_maps: &this.color_maps,
            };
            for structure in this.registry.iter_mut().filter(|s| s.is_enabled()) {
                structure.draw(&ctx)?;
            }
            Ok(())
        })
    }

    /// Clears `target` to the background color, binds it, then draws the scene.
    pub fn draw_to(&mut self, engine: &dyn Engine, target: &dyn FrameBuffer) -> Result<()> {
        target.set_clear_color(self.options.clear_color());
        target.bind_for_rendering()?;
        target.clear()?;
        self.draw(engine)
    }

    /// Runs `draw` inside a backend error scope when render error checks are on.
    ///
    /// The scope is closed even when `draw` fails; the draw error wins.
    fn with_error_checks(
        &mut self,
        engine: &dyn Engine,
        draw: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if !self.options.enable_render_error_checks {
            return draw(self);
        }
        engine.push_error_scope();
        let drawn = draw(self);
        let checked = engine.pop_error_scope();
        drawn?;
        checked?;
        Ok(())
    }

    /// Draws every enabled structure's pickable elements, assigning index
    /// ranges in registry order starting at 1.
    pub fn draw_pick(&mut self, engine: &dyn Engine) -> Result<()> {
        self.with_error_checks(engine, |this| {
            let ctx = RenderContext {
                engine,
                view: this.view,
                projection: this.projection,
                color_maps: &this.color_maps,
            };
            this.pick_ranges.clear();
            let mut next = 1u32;
            for structure in this.registry.iter_mut().filter(|s| s.is_enabled()) {
                let count = u32::try_from(structure.pick_count()).unwrap_or(u32::MAX);
                if count == 0 {
                    continue;
                }
                structure.draw_pick(&ctx, next)?;
                this.pick_ranges.push(PickRange {
                    type_name: structure.type_name(),
                    name: structure.name().to_string(),
                    start: next,
                    count,
                });
                next = next.saturating_add(count);
            }
            Ok(())
        })
    }

    /// Ranges assigned by the last [`Self::draw_pick`].
    pub fn pick_ranges(&self) -> &[PickRange] {
        &self.pick_ranges
    }

    /// Maps a global pick index back to a structure element. Index 0 is background.
    pub fn resolve_pick(&self, index: u32) -> Option<PickResult> {
        self.pick_ranges
            .iter()
            .find(|r| index >= r.start && index - r.start < r.count)
            .map(|r| PickResult {
                type_name: r.type_name,
                name: r.name.clone(),
                local_index: (index - r.start) as usize,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Structure, StructureBase};
    use glam::Vec4;
    use std::any::Any;

    struct Dots {
        base: StructureBase,
        count: usize,
        drawn: u32,
        pick_start: u32,
    }

    impl Dots {
        fn boxed(name: &str, lo: Vec3, hi: Vec3, count: usize) -> Box<dyn Structure> {
            let mut base = StructureBase::new(name);
            base.set_object_bounds(Some((lo, hi)));
            Box::new(Self {
                base,
                count,
                drawn: 0,
                pick_start: 0,
            })
        }
    }

    impl Structure for Dots {
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
            "Dots"
        }
        fn object_space_bounds(&self) -> Option<(Vec3, Vec3)> {
            self.base.bounding_box()
        }
        fn draw(&mut self, _ctx: &RenderContext<'_>) -> Result<()> {
            self.drawn += 1;
            Ok(())
        }
        fn draw_pick(&mut self, _ctx: &RenderContext<'_>, pick_start: u32) -> Result<()> {
            self.pick_start = pick_start;
            Ok(())
        }
        fn pick_count(&self) -> usize {
            self.count
        }
    }

    /// Test scene extents over several structures and the empty fallback.
    #[test]
    fn test_update_extents() {
        let mut ctx = Context::default();
        ctx.update_extents();
        assert_eq!(ctx.bounding_box, (Vec3::ZERO, Vec3::ONE));

        ctx.registry
            .register(Dots::boxed("a", Vec3::ZERO, Vec3::ONE, 0))
            .unwrap();
        ctx.registry
            .register(Dots::boxed("b", Vec3::splat(-1.0), Vec3::ZERO, 0))
            .unwrap();
        ctx.update_extents();
        assert_eq!(ctx.bounding_box, (Vec3::splat(-1.0), Vec3::ONE));
        assert!((ctx.length_scale - 12.0f32.sqrt()).abs() < 1e-5);
        assert_eq!(ctx.center(), Vec3::ZERO);
    }

    /// Test that only enabled structures draw and pick ranges resolve.
    #[test]
    fn test_draw_and_pick_ranges() {
        let engine = geoscope_render::HeadlessEngine::new();
        let mut ctx = Context::default();
        ctx.registry
            .register(Dots::boxed("a", Vec3::ZERO, Vec3::ONE, 3))
            .unwrap();
        ctx.registry
            .register(Dots::boxed("b", Vec3::ZERO, Vec3::ONE, 2))
            .unwrap();
        ctx.registry
            .register(Dots::boxed("c", Vec3::ZERO, Vec3::ONE, 4))
            .unwrap()
            .set_enabled(false);

        ctx.draw(&engine).unwrap();
        ctx.draw_pick(&engine).unwrap();

        let a = ctx.registry.get_as::<Dots>("Dots", "a").unwrap();
        assert_eq!((a.drawn, a.pick_start), (1, 1));
        let c = ctx.registry.get_as::<Dots>("Dots", "c").unwrap();
        assert_eq!(c.drawn, 0);

        assert_eq!(ctx.resolve_pick(0), None);
        let hit = ctx.resolve_pick(4).unwrap();
        assert_eq!((hit.name.as_str(), hit.local_index), ("b", 0));
        assert_eq!(ctx.resolve_pick(6), None);
    }

    /// Test that checked draws open one balanced scope each and unchecked draws none.
    #[test]
    fn test_render_error_checks() {
        let engine = geoscope_render::HeadlessEngine::new();
        let mut ctx = Context::new(Options {
            enable_render_error_checks: true,
            ..Options::default()
        });
        ctx.registry
            .register(Dots::boxed("a", Vec3::ZERO, Vec3::ONE, 3))
            .unwrap();
        ctx.draw(&engine).unwrap();
        ctx.draw_pick(&engine).unwrap();
        assert_eq!(engine.checked_scope_count(), 2);

        ctx.options.enable_render_error_checks = false;
        ctx.draw(&engine).unwrap();
        assert_eq!(engine.checked_scope_count(), 2);
    }

    /// Test that a scene draw clears its target to the background color.
    #[test]
    fn test_draw_to_clears_background() {
        use geoscope_render::{Attachment, RenderBufferType};

        let engine = geoscope_render::HeadlessEngine::new();
        let mut ctx = Context::new(Options {
            background_color: Vec3::new(0.2, 0.4, 0.6),
            ..Options::default()
        });
        let target = engine.generate_frame_buffer(2, 2).unwrap();
        assert!(ctx.draw_to(&engine, target.as_ref()).is_err());

        let color = engine
            .generate_render_buffer(RenderBufferType::Float4, 2, 2)
            .unwrap();
        target.add_color_buffer(Attachment::RenderBuffer(color)).unwrap();
        ctx.draw_to(&engine, target.as_ref()).unwrap();
        assert_eq!(target.clear_color(), Vec4::new(0.2, 0.4, 0.6, 1.0));
        assert_eq!(target.read_float4(1, 1).unwrap(), Vec4::new(0.2, 0.4, 0.6, 1.0));
    }
}
