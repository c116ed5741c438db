//! Built-in vendor platform definitions.

pub mod arista;
pub mod cisco;
pub mod juniper;

use super::PlatformDefinition;

/// Every built-in platform, in the order the registry lists them.
pub fn builtin() -> Vec<PlatformDefinition> {
    vec![
        cisco::ios(),
        cisco::iosxe(),
        cisco::nxos(),
        cisco::asa(),
        arista::platform(),
        juniper::platform(),
    ]
}
