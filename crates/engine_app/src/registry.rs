//! System registry: the systems of the tick loop, in registration order,
//! together with the tick each one last ran at.

use std::fmt;

use engine_component::{QueryDescriptor, Tick};

use crate::system::System;

/// A registered system and its bookkeeping.
pub struct SystemEntry {
    /// The system's human-readable name.
    pub name: String,
    /// The system's data access requirements.
    pub access: QueryDescriptor,
    /// Tick of the system's previous run. [`Tick::ZERO`] before the first run.
    pub last_run: Tick,
    /// The system itself.
    pub system: Box<dyn System>,
}

impl fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemEntry")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("last_run", &self.last_run)
            .finish_non_exhaustive()
    }
}

/// Registry of all systems run by the tick loop.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    /// Systems in registration order.
    systems: Vec<SystemEntry>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Register a system. A system registered under an existing name
    /// replaces it in place, starting again from [`Tick::ZERO`].
    ///
    /// Returns the system's index.
    pub fn register(&mut self, system: Box<dyn System>) -> usize {
        let entry = SystemEntry {
            name: system.name().to_string(),
            access: system.access(),
            last_run: Tick::ZERO,
            system,
        };
        match self.systems.iter().position(|s| s.name == entry.name) {
            Some(index) => {
                self.systems[index] = entry;
                index
            }
            None => {
                self.systems.push(entry);
                self.systems.len() - 1
            }
        }
    }

    /// Remove a system by name.
    ///
    /// Returns `true` if the system was found and removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        if let Some(pos) = self.systems.iter().position(|s| s.name == name) {
            self.systems.remove(pos);
            return true;
        }
        false
    }

    /// Returns information about a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SystemEntry> {
        self.systems.iter().find(|s| s.name == name)
    }

    /// Returns a system by index, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SystemEntry> {
        self.systems.get_mut(index)
    }

    /// Returns an iterator over all registered systems.
    pub fn iter(&self) -> impl Iterator<Item = &SystemEntry> {
        self.systems.iter()
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentTypeId;

    use super::*;
    use crate::system::SystemContext;

    struct Named(&'static str, u64);

    impl System for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn access(&self) -> QueryDescriptor {
            QueryDescriptor::new().write(ComponentTypeId(self.1))
        }

        fn run(&mut self, _ctx: &mut SystemContext<'_>) {}
    }

    #[test]
    fn test_register_new_system() {
        let mut registry = SystemRegistry::new();
        assert_eq!(registry.register(Box::new(Named("physics", 1))), 0);
        assert_eq!(registry.system_count(), 1);
        let entry = registry.get("physics").unwrap();
        assert_eq!(entry.last_run, Tick::ZERO);
        assert_eq!(entry.access.writes, vec![ComponentTypeId(1)]);
    }

    #[test]
    fn test_registration_order_is_kept() {
        let mut registry = SystemRegistry::new();
        registry.register(Box::new(Named("physics", 1)));
        registry.register(Box::new(Named("ai", 2)));
        registry.register(Box::new(Named("movement", 3)));
        let names: Vec<&str> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["physics", "ai", "movement"]);
    }

    #[test]
    fn test_same_name_replaces_in_place() {
        let mut registry = SystemRegistry::new();
        registry.register(Box::new(Named("physics", 1)));
        registry.register(Box::new(Named("ai", 2)));
        registry.get_mut(0).unwrap().last_run = Tick(5);

        assert_eq!(registry.register(Box::new(Named("physics", 7))), 0);
        assert_eq!(registry.system_count(), 2);
        let entry = registry.get("physics").unwrap();
        assert_eq!(entry.last_run, Tick::ZERO);
        assert_eq!(entry.access.writes, vec![ComponentTypeId(7)]);
    }

    #[test]
    fn test_unregister() {
        let mut registry = SystemRegistry::new();
        registry.register(Box::new(Named("physics", 1)));
        assert!(registry.unregister("physics"));
        assert!(!registry.unregister("physics"));
        assert_eq!(registry.system_count(), 0);
    }
}
