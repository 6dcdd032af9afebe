//! Structure registry for managing registered structures.

use std::collections::BTreeMap;

use crate::error::{GeoscopeError, Result};
use crate::structure::Structure;

/// Registry of every structure in a session.
///
/// Structures are organized by type name and then by instance name. Iteration
/// is ordered by type name, then instance name.
#[derive(Default)]
pub struct Registry {
    structures: BTreeMap<&'static str, BTreeMap<String, Box<dyn Structure>>>,
}

impl Registry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a structure with the registry.
    ///
    /// Returns an error if a structure with the same type and name already exists;
    /// the existing structure is kept.
    pub fn register(&mut self, structure: Box<dyn Structure>) -> Result<&mut dyn Structure> {
        let type_map = self.structures.entry(structure.type_name()).or_default();
        let name = structure.name().to_string();
        if type_map.contains_key(&name) {
            return Err(GeoscopeError::StructureExists(name));
        }
        log::info!("registered {} '{name}'", structure.type_name());
        Ok(type_map.entry(name).or_insert(structure).as_mut())
    }

    /// Gets a reference to a structure by type and name.
    pub fn get(&self, type_name: &str, name: &str) -> Option<&dyn Structure> {
        self.structures
            .get(type_name)
            .and_then(|m| m.get(name))
            .map(AsRef::as_ref)
    }

    /// Gets a mutable reference to a structure by type and name.
    pub fn get_mut(&mut self, type_name: &str, name: &str) -> Option<&mut dyn Structure> {
        self.structures
            .get_mut(type_name)?
            .get_mut(name)
            .map(AsMut::as_mut)
    }

    /// Gets a structure by name as its concrete type.
    pub fn get_as<T: Structure>(&self, type_name: &str, name: &str) -> Option<&T> {
        self.get(type_name, name)?.as_any().downcast_ref::<T>()
    }

    pub fn get_mut_as<T: Structure>(&mut self, type_name: &str, name: &str) -> Option<&mut T> {
        self.get_mut(type_name, name)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Checks if a structure with the given type and name exists.
    pub fn contains(&self, type_name: &str, name: &str) -> bool {
        self.structures
            .get(type_name)
            .is_some_and(|m| m.contains_key(name))
    }

    /// Type names under which `name` is registered.
    pub fn types_of(&self, name: &str) -> Vec<&'static str> {
        self.structures
            .iter()
            .filter(|(_, m)| m.contains_key(name))
            .map(|(t, _)| *t)
            .collect()
    }

    /// Removes a structure by type and name.
    pub fn remove(&mut self, type_name: &str, name: &str) -> Result<Box<dyn Structure>> {
        let removed = self
            .structures
            .get_mut(type_name)
            .and_then(|m| m.remove(name))
            .ok_or_else(|| GeoscopeError::StructureNotFound(name.to_string()))?;
        log::info!("removed {type_name} '{name}'");
        Ok(removed)
    }

    /// Removes all structures of a given type.
    pub fn remove_all_of_type(&mut self, type_name: &str) {
        self.structures.remove(type_name);
    }

    /// Removes all structures from the registry.
    pub fn clear(&mut self) {
        self.structures.clear();
    }

    /// Returns an iterator over all structures.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Structure> {
        self.structures
            .values()
            .flat_map(BTreeMap::values)
            .map(AsRef::as_ref)
    }

    /// Returns a mutable iterator over all structures.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut dyn Structure> {
        self.structures
            .values_mut()
            .flat_map(BTreeMap::values_mut)
            .map(AsMut::as_mut)
    }

    /// Returns the total number of registered structures.
    pub fn len(&self) -> usize {
        self.structures.values().map(BTreeMap::len).sum()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.structures.values().all(BTreeMap::is_empty)
    }

    /// Returns all structures of a given type.
    pub fn get_all_of_type(&self, type_name: &str) -> impl Iterator<Item = &dyn Structure> {
        self.structures
            .get(type_name)
            .into_iter()
            .flat_map(BTreeMap::values)
            .map(AsRef::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureBase;
    use geoscope_render::RenderContext;
    use glam::Vec3;
    use std::any::Any;

    struct Marker {
        base: StructureBase,
        tag: u32,
    }

    impl Marker {
        fn boxed(name: &str, tag: u32) -> Box<dyn Structure> {
            Box::new(Self {
                base: StructureBase::new(name),
                tag,
            })
        }
    }

    impl Structure for Marker {
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
            "Marker"
        }
        fn object_space_bounds(&self) -> Option<(Vec3, Vec3)> {
            None
        }
        fn draw(&mut self, _ctx: &RenderContext<'_>) -> Result<()> {
            Ok(())
        }
        fn draw_pick(&mut self, _ctx: &RenderContext<'_>, _pick_start: u32) -> Result<()> {
            Ok(())
        }
    }

    /// Test that a duplicate name is rejected and the original kept.
    #[test]
    fn test_duplicate_registration_keeps_original() {
        let mut registry = Registry::new();
        registry.register(Marker::boxed("m", 1)).unwrap();
        let err = registry.register(Marker::boxed("m", 2)).err().unwrap();

        assert!(matches!(err, GeoscopeError::StructureExists(name) if name == "m"));
        assert!(registry.contains("Marker", "m"));
        assert_eq!(registry.get_as::<Marker>("Marker", "m").unwrap().tag, 1);
        assert_eq!(registry.len(), 1);
    }

    /// Test removal and name-ordered iteration.
    #[test]
    fn test_remove_and_iterate() {
        let mut registry = Registry::new();
        registry.register(Marker::boxed("b", 0)).unwrap();
        registry.register(Marker::boxed("a", 0)).unwrap();

        let names: Vec<_> = registry.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.types_of("a"), vec!["Marker"]);

        registry.remove("Marker", "a").unwrap();
        assert!(matches!(
            registry.remove("Marker", "a"),
            Err(GeoscopeError::StructureNotFound(_))
        ));
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }
}
