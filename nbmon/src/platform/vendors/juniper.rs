//! Juniper JUNOS platform definition.
//!
//! Operational mode (`>`) is enough to read the configuration, so there is no
//! escalation step and the privileged secret is never sent.
//!
//! ```text
//! user@router>              # exec mode
//! {master:0}                # routing-engine indicator (separate line)
//! user@router>              # exec prompt on next line
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

/// Create the Juniper JUNOS platform definition.
pub fn platform() -> PlatformDefinition {
    let exec = PrivilegeLevel::new(
        "exec",
        r"(?mi)^(\{\w+(:(\w+)?\d)?\}\n)?[\w\-@()/:\.]{1,63}>\s?$",
    )
    .unwrap();

    PlatformDefinition::new("juniper_junos", "show configuration | display set | no-more")
        .with_privilege(exec)
        .with_config_privilege("exec")
        .with_failure_pattern("is ambiguous")
        .with_failure_pattern("No valid completions")
        .with_failure_pattern("unknown command")
        .with_failure_pattern("syntax error")
        .with_on_open_command("set cli screen-length 0")
        .with_on_open_command("set cli screen-width 511")
        .with_on_open_command("set cli complete-on-space off")
        .with_terminal_size(511, 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_juniper_platform() {
        let platform = platform();
        assert_eq!(platform.name, "juniper_junos");
        assert!(platform.escalation_path("exec").unwrap().is_empty());
    }

    #[test]
    fn test_exec_prompt_match() {
        let platform = platform();
        let exec = platform.privilege_levels.get("exec").unwrap();
        assert!(exec.pattern.is_match(b"user@router>"));
        assert!(exec.pattern.is_match(b"user@router> "));
        assert!(exec.pattern.is_match(b"{master:0}\nuser@router>"));
        assert!(!exec.pattern.is_match(b"user@router#"));
    }
}
