//! The UI toolkit boundary.
//!
//! Structures and quantities build their panels against [`UiBuilder`], a small
//! immediate-mode surface (tree nodes, checkboxes, menus, a few value widgets).
//! The concrete toolkit lives behind it; [`RecordingUi`] is a scripted
//! implementation that logs every call.

use std::collections::HashSet;

use glam::Vec3;

/// Immediate-mode widget calls used by structure and quantity panels.
///
/// Widgets returning `bool` report whether the user changed or activated them
/// this frame. Container widgets run `body` only while open.
pub trait UiBuilder {
    fn tree_node(&mut self, label: &str, body: &mut dyn FnMut(&mut dyn UiBuilder));

    /// Lays out `body` on one row.
    fn horizontal(&mut self, body: &mut dyn FnMut(&mut dyn UiBuilder));

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool;

    fn button(&mut self, label: &str) -> bool;

    /// A popup or submenu opened from a button labelled `label`.
    fn menu(&mut self, label: &str, body: &mut dyn FnMut(&mut dyn UiBuilder));

    fn menu_item(&mut self, label: &str) -> bool;

    fn label(&mut self, text: &str);

    fn separator(&mut self);

    fn slider_f32(&mut self, label: &str, value: &mut f32, min: f32, max: f32) -> bool;

    fn color_edit(&mut self, label: &str, color: &mut Vec3) -> bool;

    /// A dropdown over `options`; `selected` indexes into it.
    fn combo(&mut self, label: &str, selected: &mut usize, options: &[&str]) -> bool;
}

/// One call made against a [`RecordingUi`].
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    TreeNode(String),
    TreePop,
    Horizontal,
    Checkbox(String, bool),
    Button(String),
    Menu(String),
    MenuEnd,
    MenuItem(String),
    Label(String),
    Separator,
    Slider(String, f32),
    ColorEdit(String),
    Combo(String, usize),
}

/// A [`UiBuilder`] that records calls and replays scripted input.
///
/// Every container is treated as open. Labels passed to [`Self::click`] are
/// reported as activated the next time a button or menu item with that label
/// is drawn; labels passed to [`Self::toggle`] flip the next checkbox drawn
/// with that label.
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Vec<UiEvent>,
    clicks: HashSet<String>,
    toggles: HashSet<String>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click(&mut self, label: &str) -> &mut Self {
        self.clicks.insert(label.to_string());
        self
    }

    pub fn toggle(&mut self, label: &str) -> &mut Self {
        self.toggles.insert(label.to_string());
        self
    }

    pub fn events(&self) -> &[UiEvent] {
        &self.events
    }

    /// Labels of every checkbox, button, menu, and menu item, in call order.
    pub fn labels(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                UiEvent::TreeNode(l)
                | UiEvent::Checkbox(l, _)
                | UiEvent::Button(l)
                | UiEvent::Menu(l)
                | UiEvent::MenuItem(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl UiBuilder for RecordingUi {
    fn tree_node(&mut self, label: &str, body: &mut dyn FnMut(&mut dyn UiBuilder)) {
        self.events.push(UiEvent::TreeNode(label.to_string()));
        body(self);
        self.events.push(UiEvent::TreePop);
    }

    fn horizontal(&mut self, body: &mut dyn FnMut(&mut dyn UiBuilder)) {
        self.events.push(UiEvent::Horizontal);
        body(self);
    }

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool {
        let toggled = self.toggles.remove(label);
        if toggled {
            *value = !*value;
        }
        self.events.push(UiEvent::Checkbox(label.to_string(), *value));
        toggled
    }

    fn button(&mut self, label: &str) -> bool {
        self.events.push(UiEvent::Button(label.to_string()));
        self.clicks.remove(label)
    }

    fn menu(&mut self, label: &str, body: &mut dyn FnMut(&mut dyn UiBuilder)) {
        self.events.push(UiEvent::Menu(label.to_string()));
        body(self);
        self.events.push(UiEvent::MenuEnd);
    }

    fn menu_item(&mut self, label: &str) -> bool {
        self.events.push(UiEvent::MenuItem(label.to_string()));
        self.clicks.remove(label)
    }

    fn label(&mut self, text: &str) {
        self.events.push(UiEvent::Label(text.to_string()));
    }

    fn separator(&mut self) {
        self.events.push(UiEvent::Separator);
    }

    fn slider_f32(&mut self, label: &str, value: &mut f32, min: f32, max: f32) -> bool {
        *value = value.clamp(min, max);
        self.events.push(UiEvent::Slider(label.to_string(), *value));
        false
    }

    fn color_edit(&mut self, label: &str, _color: &mut Vec3) -> bool {
        self.events.push(UiEvent::ColorEdit(label.to_string()));
        false
    }

    fn combo(&mut self, label: &str, selected: &mut usize, _options: &[&str]) -> bool {
        self.events.push(UiEvent::Combo(label.to_string(), *selected));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that scripted clicks fire once.
    #[test]
    fn test_clicks_are_consumed() {
        let mut ui = RecordingUi::new();
        ui.click("Go");
        assert!(ui.button("Go"));
        assert!(!ui.button("Go"));
    }

    /// Test that toggles flip the checkbox value and report a change.
    #[test]
    fn test_toggle_checkbox() {
        let mut ui = RecordingUi::new();
        ui.toggle("Enabled");
        let mut value = true;
        assert!(ui.checkbox("Enabled", &mut value));
        assert!(!value);
        assert!(!ui.checkbox("Enabled", &mut value));
        assert_eq!(
            ui.events(),
            &[
                UiEvent::Checkbox("Enabled".into(), false),
                UiEvent::Checkbox("Enabled".into(), false)
            ]
        );
    }
}
