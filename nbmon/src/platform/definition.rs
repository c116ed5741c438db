//! Platform definition for vendor-specific configurations.

use indexmap::IndexMap;
use regex::bytes::Regex;

use super::privilege_level::PrivilegeLevel;

/// Everything the SSH fetcher needs to know to pull a running configuration
/// from one kind of device.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform tag (e.g., "cisco_ios", "juniper_junos").
    pub name: String,

    /// Privilege levels for this platform, login level first.
    pub privilege_levels: IndexMap<String, PrivilegeLevel>,

    /// Level the configuration must be read from.
    pub config_privilege: String,

    /// Commands run once the config level is reached (paging, width).
    pub on_open_commands: Vec<String>,

    /// Command printing the running configuration.
    pub show_config_command: String,

    /// Output fragments meaning the device rejected a command.
    pub failed_when_contains: Vec<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create a new platform definition with minimal required fields.
    pub fn new(name: impl Into<String>, show_config_command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privilege_levels: IndexMap::new(),
            config_privilege: String::new(),
            on_open_commands: vec![],
            show_config_command: show_config_command.into(),
            failed_when_contains: vec![],
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Add a privilege level.
    pub fn with_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_levels.insert(level.name.clone(), level);
        self
    }

    /// Set the level the configuration is read from.
    pub fn with_config_privilege(mut self, name: impl Into<String>) -> Self {
        self.config_privilege = name.into();
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Regex matching the prompt of any privilege level.
    pub fn prompt_pattern(&self) -> Result<Regex, regex::Error> {
        let combined = self
            .privilege_levels
            .values()
            .map(|level| format!("(?:{})", level.pattern.as_str()))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&combined)
    }

    /// The privilege level a prompt belongs to.
    pub fn determine_privilege(&self, prompt: &str) -> Option<&PrivilegeLevel> {
        self.privilege_levels.values().find(|level| level.matches(prompt))
    }

    /// Levels to enter, in order, to get from `current` to the config level.
    ///
    /// Empty when `current` already is the config level; `None` when the
    /// config level is not reachable by escalating from `current`.
    pub fn escalation_path(&self, current: &str) -> Option<Vec<&PrivilegeLevel>> {
        let mut path = Vec::new();
        let mut level = self.privilege_levels.get(&self.config_privilege)?;

        while level.name != current {
            path.push(level);
            let parent = level.previous_priv.as_deref()?;
            level = self.privilege_levels.get(parent)?;
        }

        path.reverse();
        Some(path)
    }

    /// First failure pattern found in command output.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .map(String::as_str)
    }
}
