//! Registry of platform definitions keyed by platform tag.

use indexmap::IndexMap;

use super::definition::PlatformDefinition;
use super::vendors;

/// Registry for platform definitions.
///
/// Owned by the fetcher that uses it; there is no process-wide instance.
#[derive(Debug, Default, Clone)]
pub struct PlatformRegistry {
    platforms: IndexMap<String, PlatformDefinition>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in platform.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for platform in vendors::builtin() {
            registry.register(platform);
        }
        registry
    }

    /// Register a platform definition, returning the one it replaced.
    pub fn register(&mut self, platform: PlatformDefinition) -> Option<PlatformDefinition> {
        self.platforms.insert(platform.name.clone(), platform)
    }

    /// Get a platform by tag.
    pub fn get(&self, name: &str) -> Option<&PlatformDefinition> {
        self.platforms.get(name)
    }

    /// Check if a platform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }

    /// Registered platform tags, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = PlatformRegistry::with_builtins();
        for tag in [
            "cisco_ios",
            "cisco_xe",
            "cisco_nxos",
            "cisco_asa",
            "arista_eos",
            "juniper_junos",
        ] {
            assert!(registry.contains(tag), "missing {}", tag);
        }
        assert!(!registry.contains("cisco_wlc"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = PlatformRegistry::with_builtins();
        let custom = PlatformDefinition::new("cisco_ios", "show startup-config");
        let previous = registry.register(custom).unwrap();
        assert_eq!(previous.show_config_command, "show running-config");
        assert_eq!(
            registry.get("cisco_ios").unwrap().show_config_command,
            "show startup-config"
        );
    }

    #[test]
    fn test_names_in_order() {
        let registry = PlatformRegistry::with_builtins();
        assert_eq!(registry.names().next(), Some("cisco_ios"));
    }
}
