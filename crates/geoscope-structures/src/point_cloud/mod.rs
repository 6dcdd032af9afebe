//! Point cloud structure.

mod quantities;

use std::any::Any;
use std::rc::Rc;

use geoscope_core::{
    bounds_of, check_size, DataType, ManagedBuffer, Quantity, QuantityMap, Residency, Result,
    Structure, StructureBase, StructureKind, UiBuilder,
};
use geoscope_render::shaders::{POINTS, SHADE_BASECOLOR};
use geoscope_render::{
    index_to_color, AttributeBuffer, Engine, RenderContext, ShaderProgram,
    ShaderReplacementDefaults,
};
use glam::{Mat4, Vec3};

use crate::capabilities::{
    cached_program, set_view_uniforms, VectorStyle, VectorType, COLOR_RULES,
};

pub use quantities::*;

/// Pairs [`PointCloud`] with [`PointCloudQuantity`].
pub struct PointCloudKind;

impl StructureKind for PointCloudKind {
    const TYPE_NAME: &'static str = "PointCloud";
    type Quantity = dyn PointCloudQuantity;
}

/// A point cloud structure.
pub struct PointCloud {
    base: StructureBase,
    points: ManagedBuffer<Vec3>,
    quantities: QuantityMap<PointCloudKind>,
    material: String,
    point_radius: f32,
    base_color: Vec3,
    default_colormap: String,
    program: Option<ShaderProgram>,
}

impl PointCloud {
    /// Creates a new point cloud.
    pub fn new(name: impl Into<String>, points: Vec<Vec3>) -> Self {
        let name = name.into();
        let mut cloud = Self {
            base: StructureBase::new(name.clone()),
            points: ManagedBuffer::with_data("points", points),
            quantities: QuantityMap::new(name),
            material: "clay".to_string(),
            point_radius: 0.01,
            base_color: Vec3::new(0.2, 0.5, 0.8),
            default_colormap: "viridis".to_string(),
            program: None,
        };
        cloud.update_extents();
        cloud
    }

    /// Returns the number of points.
    pub fn num_points(&self) -> usize {
        self.points.size().unwrap_or(0)
    }

    /// Point positions, empty while they only live in the render buffer.
    pub fn points(&self) -> &[Vec3] {
        self.points.host_data()
    }

    pub fn point(&self, i: usize) -> Result<Vec3> {
        self.points.get_value(i)
    }

    /// Replaces the point positions; the count must not change.
    pub fn update_point_positions(&mut self, points: Vec<Vec3>) -> Result<&mut Self> {
        let expected = self.num_points();
        self.points.update_data(points, expected)?;
        self.update_extents();
        Ok(self)
    }

    pub fn points_render_buffer(
        &mut self,
        engine: &dyn Engine,
    ) -> Result<Rc<dyn AttributeBuffer>> {
        self.points.render_buffer(engine)
    }

    /// Records that the position render buffer was written directly.
    pub fn mark_points_updated(&mut self) -> Result<()> {
        self.points.mark_externally_updated()
    }

    // === Enable and transform

    // Chaining forms of the `Structure` methods of the same name.

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        Structure::set_enabled(self, enabled);
        self
    }

    pub fn set_transform(&mut self, transform: Mat4) -> &mut Self {
        Structure::set_transform(self, transform);
        self
    }

    pub fn reset_transform(&mut self) -> &mut Self {
        Structure::reset_transform(self);
        self
    }

    pub fn center_bounding_box(&mut self) -> &mut Self {
        Structure::center_bounding_box(self);
        self
    }

    // === Quantities

    fn insert_quantity<T: PointCloudQuantity>(&mut self, quantity: T) -> Result<&mut T> {
        check_size(quantity.name(), self.num_points(), quantity.data_size()?)?;
        log::debug!(
            "adding {} to point cloud '{}'",
            quantity.nice_name(),
            self.base.name()
        );
        self.quantities.insert_as::<T>(Box::new(quantity))
    }

    /// Adds a scalar quantity to this point cloud.
    pub fn add_scalar_quantity(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> Result<&mut PointCloudScalarQuantity> {
        self.add_scalar_quantity_with_type(name, values, DataType::Standard)
    }

    pub fn add_scalar_quantity_with_type(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
        data_type: DataType,
    ) -> Result<&mut PointCloudScalarQuantity> {
        let quantity =
            PointCloudScalarQuantity::new(name, values, data_type, &self.default_colormap);
        self.insert_quantity(quantity)
    }

    /// Adds a color quantity to this point cloud.
    pub fn add_color_quantity(
        &mut self,
        name: impl Into<String>,
        colors: Vec<Vec3>,
    ) -> Result<&mut PointCloudColorQuantity> {
        self.insert_quantity(PointCloudColorQuantity::new(name, colors))
    }

    /// Adds a vector quantity to this point cloud.
    pub fn add_vector_quantity(
        &mut self,
        name: impl Into<String>,
        vectors: Vec<Vec3>,
        vector_type: VectorType,
    ) -> Result<&mut PointCloudVectorQuantity> {
        let quantity =
            PointCloudVectorQuantity::new(name, vectors, VectorStyle::new(vector_type));
        self.insert_quantity(quantity)
    }

    pub fn quantities(&self) -> &QuantityMap<PointCloudKind> {
        &self.quantities
    }

    pub fn get_quantity(&self, name: &str) -> Option<&dyn PointCloudQuantity> {
        self.quantities.get(name)
    }

    pub fn get_quantity_mut_as<T: PointCloudQuantity>(&mut self, name: &str) -> Option<&mut T> {
        self.quantities.get_mut_as(name)
    }

    pub fn set_quantity_enabled(&mut self, name: &str, enabled: bool) -> Result<&mut Self> {
        self.quantities.set_enabled(name, enabled)?;
        Ok(self)
    }

    pub fn remove_quantity(&mut self, name: &str) -> Result<&mut Self> {
        self.quantities.remove(name)?;
        Ok(self)
    }

    pub fn set_default_colormap(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_colormap = name.into();
        self
    }

    // === Style

    pub fn point_radius(&self) -> f32 {
        self.point_radius
    }

    pub fn set_point_radius(&mut self, radius: f32) -> &mut Self {
        self.point_radius = radius;
        self
    }

    pub fn base_color(&self) -> Vec3 {
        self.base_color
    }

    pub fn set_base_color(&mut self, color: Vec3) -> &mut Self {
        self.base_color = color;
        self
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn set_material(&mut self, material: impl Into<String>) -> &mut Self {
        self.material = material.into();
        self
    }
}

impl Structure for PointCloud {
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
        PointCloudKind::TYPE_NAME
    }

    fn object_space_bounds(&self) -> Option<(Vec3, Vec3)> {
        match self.points.residency() {
            Residency::Device => self.base.object_bounds(),
            _ => bounds_of(self.points().iter().copied()),
        }
    }

    fn draw(&mut self, ctx: &RenderContext<'_>) -> Result<()> {
        let transform = self.transform();
        let length_scale = self.length_scale();
        let mut target = PointDraw {
            positions: &mut self.points,
            ctx,
            transform,
            length_scale,
        };

        if self.quantities.dominant().is_none() {
            let program = cached_program(&mut self.program, || {
                target.point_program(&[SHADE_BASECOLOR])
            })?;
            program.set_uniform("u_baseColor", self.base_color)?;
            target.submit(program)?;
        }

        for quantity in self.quantities.iter_mut().filter(|q| q.is_enabled()) {
            quantity.draw(&mut target)?;
        }
        Ok(())
    }

    fn draw_pick(&mut self, ctx: &RenderContext<'_>, pick_start: u32) -> Result<()> {
        let mut program =
            ctx.engine
                .request_shader(POINTS, &COLOR_RULES, ShaderReplacementDefaults::Pick)?;
        program.set_external_buffer("a_position", self.points.render_buffer(ctx.engine)?)?;
        let colors: Vec<Vec3> = (0..self.num_points())
            .map(|i| index_to_color(pick_start + i as u32))
            .collect();
        program.set_attribute("a_color", &colors)?;
        set_view_uniforms(&mut program, ctx, self.transform())?;
        program.draw()?;
        Ok(())
    }

    fn pick_count(&self) -> usize {
        self.num_points()
    }

    fn build_custom_ui(&mut self, ui: &mut dyn UiBuilder) {
        ui.color_edit("Color", &mut self.base_color);
        ui.slider_f32("Radius", &mut self.point_radius, 0.0, 0.1);
    }

    fn build_quantities_ui(&mut self, ui: &mut dyn UiBuilder) {
        self.quantities.build_ui(ui);
    }

    fn build_pick_ui(&mut self, ui: &mut dyn UiBuilder, local_index: usize) {
        ui.label(&format!("point #{local_index}"));
        if let Ok(p) = self.point(local_index) {
            ui.label(&format!("position ({:.4}, {:.4}, {:.4})", p.x, p.y, p.z));
        }
        for quantity in self.quantities.iter() {
            if let Some(text) = quantity.describe(local_index) {
                ui.label(&text);
            }
        }
    }

    fn refresh(&mut self) {
        self.program = None;
        self.quantities.refresh_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_core::GeoscopeError;
    use geoscope_render::{ColorMapRegistry, HeadlessEngine};
    use glam::Mat4;

    fn cloud() -> PointCloud {
        PointCloud::new("pts", vec![Vec3::ZERO, Vec3::X, Vec3::new(0.0, 2.0, 0.0)])
    }

    fn draw(cloud: &mut PointCloud, engine: &HeadlessEngine) {
        let color_maps = ColorMapRegistry::new();
        let ctx = RenderContext {
            engine,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            color_maps: &color_maps,
        };
        cloud.draw(&ctx).unwrap();
    }

    /// Test quantity sizes are checked against the point count.
    #[test]
    fn test_quantity_sizes() {
        let mut cloud = cloud();
        assert!(cloud.add_scalar_quantity("s", vec![1.0, 2.0, 3.0]).is_ok());
        assert!(matches!(
            cloud.add_color_quantity("c", vec![Vec3::ONE; 2]),
            Err(GeoscopeError::SizeMismatch { expected: 3, actual: 2, .. })
        ));
        assert!(cloud.get_quantity("c").is_none());
    }

    /// Test the base draw and that positions are shared with quantities.
    #[test]
    fn test_draw_shares_positions() {
        let engine = HeadlessEngine::new();
        let mut cloud = cloud();
        cloud
            .add_vector_quantity("v", vec![Vec3::Y; 3], VectorType::Ambient)
            .unwrap();
        cloud.set_quantity_enabled("v", true).unwrap();
        draw(&mut cloud, &engine);

        let log = engine.draw_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].program.starts_with("POINTS["));
        assert_eq!(log[0].vertex_count, 3);
        assert!(log[1].program.starts_with("LINES["));
        assert_eq!(log[1].vertex_count, 6);

        let positions = cloud.points_render_buffer(&engine).unwrap();
        assert!(Rc::ptr_eq(log[0].attribute("a_position").unwrap(), &positions));
        assert_eq!(positions.upload_count(), 1);
    }

    /// Test that a color quantity replaces the base color pass.
    #[test]
    fn test_color_dominates_base() {
        let engine = HeadlessEngine::new();
        let mut cloud = cloud();
        cloud.add_color_quantity("c", vec![Vec3::X; 3]).unwrap();
        draw(&mut cloud, &engine);
        let log = engine.draw_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].attribute("a_color").is_some());
        assert!(log[0].uniform("u_baseColor").is_none());
    }

    /// Test that colors written on the device are sized and drawn from the buffer.
    #[test]
    fn test_color_external_update() {
        let engine = HeadlessEngine::new();
        let mut cloud = cloud();
        let quantity = cloud.add_color_quantity("c", vec![Vec3::ZERO; 3]).unwrap();
        let buffer = quantity.render_buffer(&engine).unwrap();
        buffer.set_data(&[Vec3::X, Vec3::Y, Vec3::Z]).unwrap();
        quantity.mark_render_buffer_updated().unwrap();
        assert!(quantity.colors().is_empty());
        assert_eq!(quantity.data_size().unwrap(), 3);

        draw(&mut cloud, &engine);
        let log = engine.draw_log();
        assert!(Rc::ptr_eq(log[0].attribute("a_color").unwrap(), &buffer));
    }

    /// Test that vector glyphs read device-written vectors and positions.
    #[test]
    fn test_vector_external_update() {
        let engine = HeadlessEngine::new();
        let mut cloud = cloud();
        let quantity = cloud
            .add_vector_quantity("v", vec![Vec3::ZERO; 3], VectorType::Ambient)
            .unwrap();
        quantity.set_enabled(true);
        let vectors = quantity.render_buffer(&engine).unwrap();
        vectors.set_data(&[Vec3::Z; 3]).unwrap();
        quantity.mark_render_buffer_updated().unwrap();
        assert!(quantity.vectors().is_empty());
        assert_eq!(quantity.data_size().unwrap(), 3);

        cloud.points_render_buffer(&engine).unwrap();
        cloud.mark_points_updated().unwrap();
        draw(&mut cloud, &engine);
        let log = engine.draw_log();
        let segments = log[1].attribute("a_position").unwrap().get_data::<Vec3>().unwrap();
        assert_eq!(segments[2], Vec3::X);
        assert_eq!(segments[3], Vec3::X + Vec3::Z);
    }

    /// Test the chaining forms of the structure setters.
    #[test]
    fn test_structure_setters_chain() {
        let mut cloud = cloud();
        cloud
            .set_transform(Mat4::from_scale(Vec3::splat(2.0)))
            .set_point_radius(0.5)
            .set_enabled(false);
        assert!(!cloud.is_enabled());
        assert_eq!(cloud.bounding_box(), Some((Vec3::ZERO, Vec3::new(2.0, 4.0, 0.0))));
        cloud.reset_transform().center_bounding_box();
        assert_eq!(
            cloud.bounding_box(),
            Some((Vec3::new(-0.5, -1.0, 0.0), Vec3::new(0.5, 1.0, 0.0)))
        );
    }

    /// Test position updates refresh the bounds and the render buffer.
    #[test]
    fn test_update_point_positions() {
        let engine = HeadlessEngine::new();
        let mut cloud = cloud();
        let buffer = cloud.points_render_buffer(&engine).unwrap();
        cloud
            .update_point_positions(vec![Vec3::ONE, Vec3::ONE, Vec3::splat(3.0)])
            .unwrap();
        assert_eq!(buffer.get_value::<Vec3>(2).unwrap(), Vec3::splat(3.0));
        assert_eq!(cloud.bounding_box(), Some((Vec3::ONE, Vec3::splat(3.0))));
        assert!(cloud.update_point_positions(vec![Vec3::ONE]).is_err());

        cloud.mark_points_updated().unwrap();
        assert!(cloud.points().is_empty());
        assert_eq!(cloud.num_points(), 3);
        cloud.update_extents();
        assert_eq!(cloud.bounding_box(), Some((Vec3::ONE, Vec3::splat(3.0))));
    }
}
