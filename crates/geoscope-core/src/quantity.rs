//! Quantity trait and the per-structure quantity collection.
//!
//! A [`Quantity`] represents data associated with a structure, such as scalar values,
//! vector fields, or colors. Each structure kind names the interface its
//! quantities implement through [`StructureKind`], and stores them in a
//! [`QuantityMap`].

use std::any::Any;

use crate::error::{GeoscopeError, Result};
use crate::types::QuantityKind;
use crate::ui::UiBuilder;

/// State shared by every quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityBase {
    name: String,
    enabled: bool,
    dominates: bool,
}

impl QuantityBase {
    /// Dominating quantities start enabled so the newest one is displayed;
    /// everything else starts disabled.
    pub fn new(name: impl Into<String>, dominates: bool) -> Self {
        Self {
            name: name.into(),
            enabled: dominates,
            dominates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn dominates(&self) -> bool {
        self.dominates
    }
}

/// Data associated with a structure that can be visualized.
pub trait Quantity: Any {
    fn base(&self) -> &QuantityBase;

    fn base_mut(&mut self) -> &mut QuantityBase;

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the kind of this quantity.
    fn kind(&self) -> QuantityKind;

    /// Returns the number of data elements.
    ///
    /// Device-resident data is sized from its render buffer; an error means
    /// the quantity lost track of its data.
    fn data_size(&self) -> Result<usize>;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.base_mut().set_enabled(enabled);
    }

    fn dominates(&self) -> bool {
        self.base().dominates()
    }

    /// Decorated name used in headers, e.g. `"height (vertex scalar)"`.
    fn nice_name(&self) -> String {
        self.name().to_string()
    }

    /// Drops cached render state so it is rebuilt on the next draw.
    fn refresh(&mut self) {}

    fn build_custom_ui(&mut self, _ui: &mut dyn UiBuilder) {}

    /// Tree node with an enabled checkbox, then the quantity's own widgets.
    fn build_ui(&mut self, ui: &mut dyn UiBuilder) {
        let label = self.nice_name();
        ui.tree_node(&label, &mut |ui| {
            let mut enabled = self.is_enabled();
            if ui.checkbox("Enabled", &mut enabled) {
                self.set_enabled(enabled);
            }
            self.build_custom_ui(ui);
        });
    }
}

/// Pairs a structure type with the interface its quantities implement.
pub trait StructureKind: 'static {
    const TYPE_NAME: &'static str;

    type Quantity: ?Sized + Quantity;

    /// Whether `a` and `b` may not be displayed together.
    fn mutually_exclusive(a: &Self::Quantity, b: &Self::Quantity) -> bool {
        a.dominates() && b.dominates()
    }
}

/// Named quantities of one structure, kept in insertion order.
pub struct QuantityMap<K: StructureKind> {
    owner: String,
    entries: Vec<Box<K::Quantity>>,
}

impl<K: StructureKind> QuantityMap<K> {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|q| q.name() == name)
    }

    fn not_found(&self, name: &str) -> GeoscopeError {
        GeoscopeError::QuantityNotFound(name.to_string(), self.owner.clone())
    }

    /// Adds a quantity, replacing any quantity with the same name.
    ///
    /// An enabled dominating quantity disables every enabled sibling it is
    /// mutually exclusive with.
    pub fn insert(&mut self, quantity: Box<K::Quantity>) -> &mut K::Quantity {
        if let Some(i) = self.position(quantity.name()) {
            log::debug!("replacing quantity '{}' on '{}'", quantity.name(), self.owner);
            self.entries.remove(i);
        }
        self.entries.push(quantity);
        let index = self.entries.len() - 1;
        self.enforce_exclusivity(index);
        &mut *self.entries[index]
    }

    /// Inserts and returns the new quantity as its concrete type.
    pub fn insert_as<T: Quantity>(&mut self, quantity: Box<K::Quantity>) -> Result<&mut T> {
        let name = quantity.name().to_string();
        self.insert(quantity)
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| {
                GeoscopeError::internal(format!("quantity '{name}' has an unexpected type"))
            })
    }

    pub fn get(&self, name: &str) -> Option<&K::Quantity> {
        self.entries
            .iter()
            .find(|q| q.name() == name)
            .map(|q| &**q)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut K::Quantity> {
        self.entries
            .iter_mut()
            .find(|q| q.name() == name)
            .map(|q| &mut **q)
    }

    pub fn get_as<T: Quantity>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref::<T>()
    }

    pub fn get_mut_as<T: Quantity>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn remove(&mut self, name: &str) -> Result<Box<K::Quantity>> {
        let i = self.position(name).ok_or_else(|| self.not_found(name))?;
        Ok(self.entries.remove(i))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Enables or disables a quantity, applying dominance exclusivity on enable.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let i = self.position(name).ok_or_else(|| self.not_found(name))?;
        self.entries[i].set_enabled(enabled);
        if enabled {
            self.enforce_exclusivity(i);
        }
        Ok(())
    }

    /// The most recently added enabled dominating quantity.
    pub fn dominant(&self) -> Option<&K::Quantity> {
        self.entries
            .iter()
            .rev()
            .find(|q| q.is_enabled() && q.dominates())
            .map(|q| &**q)
    }

    pub fn iter(&self) -> impl Iterator<Item = &K::Quantity> {
        self.entries.iter().map(|q| &**q)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut K::Quantity> {
        self.entries.iter_mut().map(|q| &mut **q)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|q| q.name()).collect()
    }

    pub fn refresh_all(&mut self) {
        for quantity in &mut self.entries {
            quantity.refresh();
        }
    }

    /// Builds every quantity's UI, enforcing exclusivity for any the user enabled.
    pub fn build_ui(&mut self, ui: &mut dyn UiBuilder) {
        for i in 0..self.entries.len() {
            let was_enabled = self.entries[i].is_enabled();
            self.entries[i].build_ui(ui);
            if !was_enabled && self.entries[i].is_enabled() {
                self.enforce_exclusivity(i);
            }
        }
    }

    fn enforce_exclusivity(&mut self, index: usize) {
        let (before, rest) = self.entries.split_at_mut(index);
        let Some((winner, after)) = rest.split_first_mut() else {
            return;
        };
        if !winner.is_enabled() {
            return;
        }
        for other in before.iter_mut().chain(after.iter_mut()) {
            if other.is_enabled() && K::mutually_exclusive(&**winner, &**other) {
                log::debug!("'{}' disables '{}'", winner.name(), other.name());
                other.set_enabled(false);
            }
        }
    }
}
