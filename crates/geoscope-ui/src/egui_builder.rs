//! egui implementation of [`UiBuilder`].

use egui::{Context, SidePanel, Ui};
use geoscope_core::{PickResult, UiBuilder};
use glam::Vec3;

/// Forwards [`UiBuilder`] calls to an egui [`Ui`].
pub struct EguiUi<'a> {
    ui: &'a mut Ui,
}

impl<'a> EguiUi<'a> {
    pub fn new(ui: &'a mut Ui) -> Self {
        Self { ui }
    }

    /// The wrapped egui `Ui`, for widgets the builder does not cover.
    pub fn inner(&mut self) -> &mut Ui {
        self.ui
    }
}

impl UiBuilder for EguiUi<'_> {
    fn tree_node(&mut self, label: &str, body: &mut dyn FnMut(&mut dyn UiBuilder)) {
        egui::CollapsingHeader::new(label)
            .default_open(true)
            .show(self.ui, |ui| body(&mut EguiUi::new(ui)));
    }

    fn horizontal(&mut self, body: &mut dyn FnMut(&mut dyn UiBuilder)) {
        self.ui.horizontal(|ui| body(&mut EguiUi::new(ui)));
    }

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool {
        self.ui.checkbox(value, label).changed()
    }

    fn button(&mut self, label: &str) -> bool {
        self.ui.button(label).clicked()
    }

    fn menu(&mut self, label: &str, body: &mut dyn FnMut(&mut dyn UiBuilder)) {
        self.ui
            .menu_button(label, |ui| body(&mut EguiUi::new(ui)));
    }

    fn menu_item(&mut self, label: &str) -> bool {
        let clicked = self.ui.button(label).clicked();
        if clicked {
            self.ui.close();
        }
        clicked
    }

    fn label(&mut self, text: &str) {
        self.ui.label(text);
    }

    fn separator(&mut self) {
        self.ui.separator();
    }

    fn slider_f32(&mut self, label: &str, value: &mut f32, min: f32, max: f32) -> bool {
        self.ui
            .add(egui::Slider::new(value, min..=max).text(label))
            .changed()
    }

    fn color_edit(&mut self, label: &str, color: &mut Vec3) -> bool {
        let mut rgb = color.to_array();
        let changed = self
            .ui
            .horizontal(|ui| {
                let changed = ui.color_edit_button_rgb(&mut rgb).changed();
                ui.label(label);
                changed
            })
            .inner;
        if changed {
            *color = Vec3::from_array(rgb);
        }
        changed
    }

    fn combo(&mut self, label: &str, selected: &mut usize, options: &[&str]) -> bool {
        let before = *selected;
        let current = options.get(before).copied().unwrap_or_default();
        egui::ComboBox::from_label(label)
            .selected_text(current)
            .show_ui(self.ui, |ui| {
                for (i, option) in options.iter().enumerate() {
                    ui.selectable_value(selected, i, *option);
                }
            });
        *selected != before
    }
}

/// Builds the selection panel on the right side for a resolved pick.
pub fn build_pick_panel(
    ctx: &Context,
    selection: &PickResult,
    build_structure_pick_ui: impl FnOnce(&mut dyn UiBuilder),
) {
    SidePanel::right("selection_panel")
        .default_width(300.0)
        .show(ctx, |ui| {
            ui.heading("Selection");
            ui.separator();
            ui.label(format!("{}: {}", selection.type_name, selection.name));
            ui.separator();
            build_structure_pick_ui(&mut EguiUi::new(ui));
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{CentralPanel, RawInput};

    fn run(mut body: impl FnMut(&mut EguiUi<'_>)) {
        let ctx = Context::default();
        let _ = ctx.run(RawInput::default(), |ctx| {
            CentralPanel::default().show(ctx, |ui| body(&mut EguiUi::new(ui)));
        });
    }

    /// Test that untouched widgets report no change.
    #[test]
    fn test_widgets_without_input() {
        run(|ui| {
            let mut enabled = true;
            assert!(!ui.checkbox("Enabled", &mut enabled));
            assert!(enabled);
            assert!(!ui.button("Reset"));
            let mut selected = 1;
            assert!(!ui.combo("Colormap", &mut selected, &["viridis", "coolwarm"]));
            assert_eq!(selected, 1);
            let mut color = Vec3::new(0.1, 0.2, 0.3);
            assert!(!ui.color_edit("Color", &mut color));
            assert_eq!(color, Vec3::new(0.1, 0.2, 0.3));
        });
    }

    /// Test that nested bodies run inside tree nodes.
    #[test]
    fn test_tree_node_runs_body() {
        run(|ui| {
            let mut visited = false;
            ui.tree_node("mesh", &mut |ui| {
                ui.horizontal(&mut |ui| ui.label("inside"));
                visited = true;
            });
            assert!(visited);
        });
    }
}
