//! Cisco platform definitions (IOS, IOS-XE, NX-OS, ASA).
//!
//! All four share the `exec` (`>`) / `privilege_exec` (`#`) split reached with
//! `enable`. The running configuration is only readable from `privilege_exec`.
//!
//! Prompt patterns are adapted from [scrapli](https://github.com/carlmontanari/scrapli).
//!
//! # Prompt Examples
//!
//! ```text
//! router>                  # exec
//! Password:                # enable secret prompt
//! router#                  # privilege_exec
//! router(config)#          # configuration (never entered by nbmon)
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

const EXEC_PROMPT: &str = r"(?mi)^[\w.\-@/:]{1,63}>\s?$";
const PRIVILEGE_EXEC_PROMPT: &str = r"(?mi)^[\w.\-@/:]{1,63}#\s?$";
const ENABLE_PASSWORD_PROMPT: &str = r"(?mi)^(?:enable\s)?password:\s?$";

fn base(name: &str) -> PlatformDefinition {
    let exec = PrivilegeLevel::new("exec", EXEC_PROMPT).unwrap();

    let privilege_exec = PrivilegeLevel::new("privilege_exec", PRIVILEGE_EXEC_PROMPT)
        .unwrap()
        .with_escalation("exec", "enable")
        .with_auth(ENABLE_PASSWORD_PROMPT)
        .unwrap()
        .with_not_contains("(conf");

    PlatformDefinition::new(name, "show running-config")
        .with_privilege(exec)
        .with_privilege(privilege_exec)
        .with_config_privilege("privilege_exec")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Unknown command")
}

/// Cisco IOS.
pub fn ios() -> PlatformDefinition {
    base("cisco_ios")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 512")
        .with_terminal_size(512, 24)
}

/// Cisco IOS-XE.
pub fn iosxe() -> PlatformDefinition {
    base("cisco_xe")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 512")
        .with_terminal_size(512, 24)
}

/// Cisco NX-OS. Logins usually land directly in `privilege_exec`.
pub fn nxos() -> PlatformDefinition {
    base("cisco_nxos")
        .with_failure_pattern("% Invalid command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
        .with_terminal_size(511, 24)
}

/// Cisco ASA.
pub fn asa() -> PlatformDefinition {
    base("cisco_asa")
        .with_failure_pattern("ERROR: ")
        .with_on_open_command("terminal pager 0")
        .with_terminal_size(511, 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ios_platform() {
        let platform = ios();
        assert_eq!(platform.name, "cisco_ios");
        assert_eq!(platform.show_config_command, "show running-config");
        assert_eq!(platform.config_privilege, "privilege_exec");
        assert_eq!(
            platform.on_open_commands,
            vec!["terminal length 0", "terminal width 512"]
        );
    }

    #[test]
    fn test_prompts() {
        let platform = ios();
        assert_eq!(platform.determine_privilege("edge-1>").unwrap().name, "exec");
        assert_eq!(
            platform.determine_privilege("edge-1#").unwrap().name,
            "privilege_exec"
        );
        assert!(platform.determine_privilege("edge-1(config)#").is_none());
    }

    #[test]
    fn test_enable_requires_secret() {
        let platform = ios();
        let path = platform.escalation_path("exec").unwrap();
        assert_eq!(path.len(), 1);
        let enable = path[0];
        assert_eq!(enable.escalate_command.as_deref(), Some("enable"));
        let auth = enable.escalate_prompt.as_ref().unwrap();
        assert!(auth.is_match(b"Password: "));
        assert!(auth.is_match(b"Enable Password:"));
    }

    #[test]
    fn test_asa_paging() {
        let platform = asa();
        assert_eq!(platform.on_open_commands, vec!["terminal pager 0"]);
        assert!(platform.detect_failure("ERROR: % Invalid input detected").is_some());
    }
}
