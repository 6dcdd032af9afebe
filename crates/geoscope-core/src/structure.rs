//! Structure trait and related types.
//!
//! A [`Structure`] represents a geometric object in the scene, such as a point cloud
//! or surface mesh.

use std::any::Any;

use geoscope_render::RenderContext;
use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::ui::UiBuilder;

/// State shared by every structure: identity, visibility, placement, extents.
#[derive(Debug, Clone)]
pub struct StructureBase {
    name: String,
    enabled: bool,
    transform: Mat4,
    object_bounds: Option<(Vec3, Vec3)>,
}

impl StructureBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            transform: Mat4::IDENTITY,
            object_bounds: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached bounds of the untransformed geometry.
    pub fn object_bounds(&self) -> Option<(Vec3, Vec3)> {
        self.object_bounds
    }

    pub fn set_object_bounds(&mut self, bounds: Option<(Vec3, Vec3)>) {
        self.object_bounds = bounds;
    }

    /// World-space box around the transformed object-space box.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let (lo, hi) = self.object_bounds?;
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            let p = self.transform.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }
}

/// Computes the axis-aligned box of a point set, `None` when empty or non-finite.
pub fn bounds_of(points: impl IntoIterator<Item = Vec3>) -> Option<(Vec3, Vec3)> {
    let mut points = points.into_iter().filter(|p| p.is_finite());
    let first = points.next()?;
    Some(points.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
}

/// A geometric object that can be visualized.
///
/// Structures are the primary objects in a session. Each structure has:
/// - A unique name within its type
/// - A transform matrix for positioning in the scene
/// - Visibility state
/// - Methods for rendering and UI building
pub trait Structure: Any {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn base(&self) -> &StructureBase;

    fn base_mut(&mut self) -> &mut StructureBase;

    /// Returns the type name of this structure (e.g., "`PointCloud`", "`SurfaceMesh`").
    fn type_name(&self) -> &'static str;

    /// Bounds of the untransformed geometry, `None` if it has no spatial extent
    /// or its positions are not host-resident.
    fn object_space_bounds(&self) -> Option<(Vec3, Vec3)>;

    /// Draws this structure and its enabled quantities.
    fn draw(&mut self, ctx: &RenderContext<'_>) -> Result<()>;

    /// Draws pickable elements encoding indices `pick_start..pick_start + pick_count()`.
    fn draw_pick(&mut self, ctx: &RenderContext<'_>, pick_start: u32) -> Result<()>;

    /// Number of individually pickable elements.
    fn pick_count(&self) -> usize {
        0
    }

    fn build_custom_ui(&mut self, _ui: &mut dyn UiBuilder) {}

    /// Structure-specific entries of the options menu.
    fn build_custom_options_ui(&mut self, _ui: &mut dyn UiBuilder) {}

    fn build_quantities_ui(&mut self, _ui: &mut dyn UiBuilder) {}

    /// Describes the element with the given local pick index.
    fn build_pick_ui(&mut self, _ui: &mut dyn UiBuilder, _local_index: usize) {}

    /// Drops cached render state so it is rebuilt on the next draw.
    fn refresh(&mut self) {}

    /// Returns the unique name of this structure.
    fn name(&self) -> &str {
        self.base().name()
    }

    fn is_enabled(&self) -> bool {
        self.base().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.base_mut().enabled = enabled;
    }

    fn transform(&self) -> Mat4 {
        self.base().transform
    }

    fn set_transform(&mut self, transform: Mat4) {
        self.base_mut().transform = transform;
        self.update_extents();
    }

    /// Resets the transform to identity.
    fn reset_transform(&mut self) {
        self.set_transform(Mat4::IDENTITY);
    }

    /// Translates the structure so its world bounding box is centered at the origin.
    fn center_bounding_box(&mut self) {
        let Some((min, max)) = self.bounding_box() else {
            return;
        };
        let center = (min + max) * 0.5;
        let transform = Mat4::from_translation(-center) * self.transform();
        self.set_transform(transform);
    }

    /// Recomputes cached bounds from the current geometry.
    fn update_extents(&mut self) {
        let bounds = self.object_space_bounds();
        self.base_mut().set_object_bounds(bounds);
    }

    /// Returns the axis-aligned bounding box in world coordinates.
    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.base().bounding_box()
    }

    /// Returns a characteristic length scale for this structure.
    fn length_scale(&self) -> f32 {
        self.bounding_box()
            .map_or(1.0, |(min, max)| (max - min).length())
    }

    /// Camera view composed with the model transform.
    fn model_view(&self, view: Mat4) -> Mat4 {
        view * self.transform()
    }

    /// Header, enabled checkbox, options menu, then custom and quantity UI.
    fn build_ui(&mut self, ui: &mut dyn UiBuilder) {
        let name = self.name().to_string();
        ui.tree_node(&name, &mut |ui| {
            let mut enabled = self.is_enabled();
            let mut center = false;
            let mut reset = false;
            ui.horizontal(&mut |ui| {
                if ui.checkbox("Enabled", &mut enabled) {
                    self.set_enabled(enabled);
                }
                ui.menu("Options", &mut |ui| {
                    ui.menu("Transform", &mut |ui| {
                        center |= ui.menu_item("Center");
                        reset |= ui.menu_item("Reset");
                    });
                    self.build_custom_options_ui(ui);
                });
            });
            if center {
                self.center_bounding_box();
            }
            if reset {
                self.reset_transform();
            }
            self.build_custom_ui(ui);
            self.build_quantities_ui(ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{RecordingUi, UiEvent};
    use proptest::prelude::*;

    struct Boxy {
        base: StructureBase,
        points: Vec<Vec3>,
    }

    impl Boxy {
        fn new(points: Vec<Vec3>) -> Self {
            let mut boxy = Self {
                base: StructureBase::new("boxy"),
                points,
            };
            boxy.update_extents();
            boxy
        }
    }

    impl Structure for Boxy {
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
            "Boxy"
        }
        fn object_space_bounds(&self) -> Option<(Vec3, Vec3)> {
            bounds_of(self.points.iter().copied())
        }
        fn draw(&mut self, _ctx: &RenderContext<'_>) -> Result<()> {
            Ok(())
        }
        fn draw_pick(&mut self, _ctx: &RenderContext<'_>, _pick_start: u32) -> Result<()> {
            Ok(())
        }
    }

    /// Test that centering moves the world box center to the origin.
    #[test]
    fn test_center_bounding_box() {
        let mut boxy = Boxy::new(vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(3.0, 6.0, 5.0)]);
        boxy.set_transform(Mat4::from_scale(Vec3::splat(2.0)));
        boxy.center_bounding_box();

        let (min, max) = boxy.bounding_box().unwrap();
        assert!(((min + max) * 0.5).length() < 1e-5);
        assert!((max - min - Vec3::new(4.0, 8.0, 4.0)).length() < 1e-5);

        let before = boxy.transform();
        boxy.center_bounding_box();
        assert!(boxy.transform().abs_diff_eq(before, 1e-5));
    }

    /// Test reset and model-view composition.
    #[test]
    fn test_reset_and_model_view() {
        let mut boxy = Boxy::new(vec![Vec3::ZERO, Vec3::ONE]);
        boxy.set_transform(Mat4::from_translation(Vec3::X));
        let view = Mat4::from_translation(Vec3::Z);
        assert_eq!(boxy.model_view(view), view * Mat4::from_translation(Vec3::X));
        boxy.reset_transform();
        assert_eq!(boxy.transform(), Mat4::IDENTITY);
        assert_eq!(boxy.bounding_box(), Some((Vec3::ZERO, Vec3::ONE)));
    }

    /// Test the UI call sequence and the transform menu actions.
    #[test]
    fn test_build_ui_sequence() {
        let mut boxy = Boxy::new(vec![Vec3::ONE, Vec3::splat(3.0)]);
        let mut ui = RecordingUi::new();
        ui.click("Center").toggle("Enabled");
        boxy.build_ui(&mut ui);

        assert_eq!(
            ui.labels(),
            vec!["boxy", "Enabled", "Options", "Transform", "Center", "Reset"]
        );
        assert_eq!(ui.events().last(), Some(&UiEvent::TreePop));
        assert!(!boxy.is_enabled());
        let (min, max) = boxy.bounding_box().unwrap();
        assert!(((min + max) * 0.5).length() < 1e-5);
    }

    proptest! {
        /// Test that centering is idempotent for arbitrary boxes and transforms.
        #[test]
        fn test_center_idempotent(
            lo in prop::array::uniform3(-100.0f32..100.0),
            extent in prop::array::uniform3(0.1f32..50.0),
            shift in prop::array::uniform3(-20.0f32..20.0),
        ) {
            let lo = Vec3::from(lo);
            let mut boxy = Boxy::new(vec![lo, lo + Vec3::from(extent)]);
            boxy.set_transform(Mat4::from_translation(Vec3::from(shift)));
            boxy.center_bounding_box();
            let (min, max) = boxy.bounding_box().unwrap();
            prop_assert!(((min + max) * 0.5).length() < 1e-3);
            let once = boxy.transform();
            boxy.center_bounding_box();
            prop_assert!(boxy.transform().abs_diff_eq(once, 1e-3));
        }
    }
}
