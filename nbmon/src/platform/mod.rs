//! Platform definitions for multi-vendor support.
//!
//! A platform tag on a device selects one of these definitions: prompt
//! patterns, how to reach the privilege level the configuration is readable
//! from, paging commands, and the show-configuration command itself.

mod definition;
mod privilege_level;
mod registry;
pub mod vendors;

pub use definition::PlatformDefinition;
pub use privilege_level::PrivilegeLevel;
pub use registry::PlatformRegistry;
