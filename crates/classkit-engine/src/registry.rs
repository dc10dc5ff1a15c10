//! Name-indexed class registry
//!
//! Classes are process-wide handles and need no registry to work; a registry
//! exists so declarations that name classes (JSON `mixins` entries) can be
//! resolved.

use rustc_hash::FxHashMap;

use crate::class::Class;

/// Registry of classes by name
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Classes in registration order
    classes: Vec<Class>,
    /// Class name to index mapping
    name_to_index: FxHashMap<String, usize>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its name, replacing any class of the same name.
    /// Returns the registration index.
    pub fn register_class(&mut self, class: Class) -> usize {
        let name = class.name().to_string();

        if let Some(&index) = self.name_to_index.get(&name) {
            self.classes[index] = class;
            return index;
        }

        let index = self.classes.len();
        self.classes.push(class);
        self.name_to_index.insert(name, index);
        index
    }

    /// Create `name` as a subclass of the registered class `parent` and
    /// register it
    pub fn extend(&mut self, parent: &str, name: &str) -> Option<Class> {
        let class = self.get_class_by_name(parent)?.extend(name);
        self.register_class(class.clone());
        Some(class)
    }

    /// Get class by name
    pub fn get_class_by_name(&self, name: &str) -> Option<Class> {
        self.name_to_index
            .get(name)
            .and_then(|index| self.classes.get(*index))
            .cloned()
    }

    /// Check if a class name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over registered classes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClassRegistry::new();
        let point = Class::base().extend("Point");

        assert_eq!(registry.register_class(point.clone()), 0);
        assert_eq!(registry.get_class_by_name("Point"), Some(point));
        assert!(registry.get_class_by_name("Circle").is_none());
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = ClassRegistry::new();
        let first = Class::base().extend("Point");
        let second = Class::base().extend("Point");

        registry.register_class(first);
        assert_eq!(registry.register_class(second.clone()), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_class_by_name("Point"), Some(second));
    }

    #[test]
    fn test_extend_registered_parent() {
        let mut registry = ClassRegistry::new();
        registry.register_class(Class::base().extend("Shape"));

        let circle = registry.extend("Shape", "Circle").unwrap();
        assert_eq!(circle.parent().map(|p| p.name().to_string()), Some("Shape".to_string()));
        assert!(registry.contains("Circle"));
        assert!(registry.extend("Missing", "Square").is_none());
        assert_eq!(registry.iter().count(), 2);
    }
}
