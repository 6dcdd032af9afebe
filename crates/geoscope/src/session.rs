//! The application-facing session.

use geoscope_core::{
    Context, GeoscopeError, Options, PickResult, Result, Structure, StructureKind, UiBuilder,
};
use geoscope_render::{ColorMapRegistry, Engine, FrameBuffer, HeadlessEngine};
use geoscope_structures::{PointCloud, PointCloudKind, SurfaceMesh, SurfaceMeshKind};
use glam::{Mat4, Vec3};

/// One visualization session: an engine plus every registered structure.
///
/// Sessions are independent; nothing is shared between two of them.
pub struct Session<E: Engine = HeadlessEngine> {
    engine: E,
    context: Context,
}

impl Session<HeadlessEngine> {
    /// Creates a session drawing into host memory.
    pub fn new(options: Options) -> Self {
        Self::with_engine(HeadlessEngine::new(), options)
    }

    /// A host-memory session with default options.
    pub fn headless() -> Self {
        Self::new(Options::default())
    }
}

impl<E: Engine> Session<E> {
    pub fn with_engine(engine: E, options: Options) -> Self {
        crate::init_logging_with_level(options.log_level());
        log::info!(
            "session '{}' started on {} backend",
            options.program_name,
            engine.backend_name()
        );
        Self {
            engine,
            context: Context::new(options),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &Options {
        &self.context.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.context.options
    }

    /// Named color maps; register custom maps here before quantities use them.
    pub fn color_maps_mut(&mut self) -> &mut ColorMapRegistry {
        &mut self.context.color_maps
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    // === Registration

    /// Registers a surface mesh built from polygon faces.
    pub fn register_surface_mesh<F: AsRef<[u32]>>(
        &mut self,
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        faces: &[F],
    ) -> Result<&mut SurfaceMesh> {
        let mut mesh = SurfaceMesh::new(name, vertices, faces)?;
        mesh.set_default_colormap(self.context.options.default_colormap.clone());
        self.register(mesh)
    }

    /// Registers a point cloud.
    pub fn register_point_cloud(
        &mut self,
        name: impl Into<String>,
        points: Vec<Vec3>,
    ) -> Result<&mut PointCloud> {
        let mut cloud = PointCloud::new(name, points);
        cloud.set_default_colormap(self.context.options.default_colormap.clone());
        self.register(cloud)
    }

    /// Registers any structure, returning it as its concrete type.
    ///
    /// Fails with [`GeoscopeError::StructureExists`] when the type already has
    /// a structure of that name; the existing one is kept.
    pub fn register<T: Structure>(&mut self, structure: T) -> Result<&mut T> {
        let type_name = structure.type_name();
        let name = structure.name().to_string();
        self.context.registry.register(Box::new(structure))?;
        self.on_structures_changed();
        self.context
            .registry
            .get_mut_as::<T>(type_name, &name)
            .ok_or_else(|| {
                GeoscopeError::internal(format!(
                    "{type_name} '{name}' missing right after registration"
                ))
            })
    }

    pub fn get_surface_mesh(&self, name: &str) -> Option<&SurfaceMesh> {
        self.context.registry.get_as(SurfaceMeshKind::TYPE_NAME, name)
    }

    pub fn get_surface_mesh_mut(&mut self, name: &str) -> Option<&mut SurfaceMesh> {
        self.context
            .registry
            .get_mut_as(SurfaceMeshKind::TYPE_NAME, name)
    }

    pub fn has_surface_mesh(&self, name: &str) -> bool {
        self.context
            .registry
            .contains(SurfaceMeshKind::TYPE_NAME, name)
    }

    pub fn remove_surface_mesh(&mut self, name: &str) -> Result<()> {
        self.remove_typed(SurfaceMeshKind::TYPE_NAME, name)
    }

    pub fn get_point_cloud(&self, name: &str) -> Option<&PointCloud> {
        self.context.registry.get_as(PointCloudKind::TYPE_NAME, name)
    }

    pub fn get_point_cloud_mut(&mut self, name: &str) -> Option<&mut PointCloud> {
        self.context
            .registry
            .get_mut_as(PointCloudKind::TYPE_NAME, name)
    }

    pub fn has_point_cloud(&self, name: &str) -> bool {
        self.context.registry.contains(PointCloudKind::TYPE_NAME, name)
    }

    pub fn remove_point_cloud(&mut self, name: &str) -> Result<()> {
        self.remove_typed(PointCloudKind::TYPE_NAME, name)
    }

    /// Any structure by name, searching every type.
    pub fn get_structure(&self, name: &str) -> Option<&dyn Structure> {
        let type_name = *self.context.registry.types_of(name).first()?;
        self.context.registry.get(type_name, name)
    }

    pub fn get_structure_mut(&mut self, name: &str) -> Option<&mut dyn Structure> {
        let type_name = *self.context.registry.types_of(name).first()?;
        self.context.registry.get_mut(type_name, name)
    }

    /// Removes every structure named `name`, whatever its type.
    pub fn remove_structure(&mut self, name: &str) -> Result<()> {
        let types = self.context.registry.types_of(name);
        if types.is_empty() {
            return Err(GeoscopeError::StructureNotFound(name.to_string()));
        }
        for type_name in types {
            self.context.registry.remove(type_name, name)?;
        }
        self.on_structures_changed();
        Ok(())
    }

    pub fn remove_all_structures(&mut self) {
        self.context.registry.clear();
        log::info!("removed all structures");
        self.on_structures_changed();
    }

    /// Names of every registered structure, sorted.
    pub fn structure_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .context
            .registry
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn num_structures(&self) -> usize {
        self.context.registry.len()
    }

    fn remove_typed(&mut self, type_name: &str, name: &str) -> Result<()> {
        self.context.registry.remove(type_name, name)?;
        self.on_structures_changed();
        Ok(())
    }

    fn on_structures_changed(&mut self) {
        if self.context.options.auto_compute_scene_extents {
            self.context.update_extents();
        }
        self.engine.redraw_request().request();
    }

    // === Scene

    /// Recomputes the scene bounding box and length scale from every structure.
    pub fn update_scene_extents(&mut self) {
        for structure in self.context.registry.iter_mut() {
            structure.update_extents();
        }
        self.context.update_extents();
    }

    pub fn scene_bounding_box(&self) -> (Vec3, Vec3) {
        self.context.bounding_box
    }

    pub fn length_scale(&self) -> f32 {
        self.context.length_scale
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.context.view = view;
        self.engine.redraw_request().request();
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.context.projection = projection;
        self.engine.redraw_request().request();
    }

    // === Drawing

    /// Draws every enabled structure.
    pub fn draw(&mut self) -> Result<()> {
        self.context.draw(&self.engine)
    }

    /// Clears `target` to the background color and draws every enabled structure into it.
    pub fn draw_to(&mut self, target: &dyn FrameBuffer) -> Result<()> {
        self.context.draw_to(&self.engine, target)
    }

    /// Draws pick colors for every enabled structure, refreshing pick ranges.
    pub fn draw_pick(&mut self) -> Result<()> {
        self.context.draw_pick(&self.engine)
    }

    /// Decodes a global pick index from the last [`Self::draw_pick`].
    pub fn resolve_pick(&self, index: u32) -> Option<PickResult> {
        self.context.resolve_pick(index)
    }

    /// Returns whether anything asked for a redraw since the last call, and clears the flag.
    pub fn take_redraw_request(&self) -> bool {
        self.engine.redraw_request().take()
    }

    // === UI

    /// Builds every structure's panel, ordered by structure name.
    pub fn build_ui(&mut self, ui: &mut dyn UiBuilder) {
        let mut structures: Vec<_> = self.context.registry.iter_mut().collect();
        structures.sort_by(|a, b| a.name().cmp(b.name()));
        for structure in structures {
            structure.build_ui(ui);
        }
        if self.context.options.auto_compute_scene_extents {
            self.context.update_extents();
        }
    }

    /// Builds the detail panel for a resolved pick.
    pub fn build_pick_ui(&mut self, ui: &mut dyn UiBuilder, pick: &PickResult) -> Result<()> {
        let structure = self
            .context
            .registry
            .get_mut(pick.type_name, &pick.name)
            .ok_or_else(|| GeoscopeError::StructureNotFound(pick.name.clone()))?;
        structure.build_pick_ui(ui, pick.local_index);
        Ok(())
    }

    /// Shows the selection side panel for `pick` in an egui frame.
    pub fn show_selection_panel(&mut self, ctx: &egui::Context, pick: &PickResult) -> Result<()> {
        let structure = self
            .context
            .registry
            .get_mut(pick.type_name, &pick.name)
            .ok_or_else(|| GeoscopeError::StructureNotFound(pick.name.clone()))?;
        geoscope_ui::build_pick_panel(ctx, pick, |ui| {
            structure.build_pick_ui(ui, pick.local_index);
        });
        Ok(())
    }
}
