//! Privilege level definition.

use regex::bytes::Regex;

/// A privilege level of a network device CLI.
///
/// Levels form a chain through `previous_priv`; escalating into a level means
/// sending its `escalate_command` from the parent level, optionally answering
/// an authentication prompt with the device's privileged secret.
#[derive(Debug, Clone)]
pub struct PrivilegeLevel {
    /// Name of this privilege level (e.g., "exec", "privilege_exec").
    pub name: String,

    /// Regex pattern matching the prompt of this level.
    pub pattern: Regex,

    /// Name of the parent privilege level (None for the login level).
    pub previous_priv: Option<String>,

    /// Command that enters this level from the parent.
    pub escalate_command: Option<String>,

    /// Password prompt shown after `escalate_command`, if escalation asks for one.
    pub escalate_prompt: Option<Regex>,

    /// Strings that must NOT be in the prompt for this level to match.
    pub not_contains: Vec<String>,
}

impl PrivilegeLevel {
    /// Create a new privilege level with minimal required fields.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            previous_priv: None,
            escalate_command: None,
            escalate_prompt: None,
            not_contains: vec![],
        })
    }

    /// Set the parent privilege level and the command that leaves it for this one.
    pub fn with_escalation(mut self, parent: impl Into<String>, command: impl Into<String>) -> Self {
        self.previous_priv = Some(parent.into());
        self.escalate_command = Some(command.into());
        self
    }

    /// Require a password after the escalation command.
    pub fn with_auth(mut self, prompt_pattern: &str) -> Result<Self, regex::Error> {
        self.escalate_prompt = Some(Regex::new(prompt_pattern)?);
        Ok(self)
    }

    /// Add a not_contains pattern.
    pub fn with_not_contains(mut self, pattern: impl Into<String>) -> Self {
        self.not_contains.push(pattern.into());
        self
    }

    /// Check if this privilege level matches a prompt.
    pub fn matches(&self, prompt: &str) -> bool {
        if self.not_contains.iter().any(|nc| prompt.contains(nc.as_str())) {
            return false;
        }
        self.pattern.is_match(prompt.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_contains_disambiguates() {
        let level = PrivilegeLevel::new("privilege_exec", r"(?m)^[\w.\-]+#\s?$")
            .unwrap()
            .with_not_contains("(config");
        assert!(level.matches("router#"));
        assert!(!level.matches("router(config)#"));
    }

    #[test]
    fn test_escalation_fields() {
        let level = PrivilegeLevel::new("privilege_exec", r"#$")
            .unwrap()
            .with_escalation("exec", "enable")
            .with_auth(r"(?mi)^password:\s?$")
            .unwrap();
        assert_eq!(level.previous_priv.as_deref(), Some("exec"));
        assert_eq!(level.escalate_command.as_deref(), Some("enable"));
        assert!(level.escalate_prompt.unwrap().is_match(b"Password: "));
    }
}
