//! UI layer for geoscope using egui.
//!
//! Structures and quantities describe their panels through
//! [`geoscope_core::UiBuilder`]; [`EguiUi`] turns those calls into egui widgets.

pub mod egui_builder;

pub use egui_builder::{build_pick_panel, EguiUi};
