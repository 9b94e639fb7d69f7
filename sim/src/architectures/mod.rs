//! Built-in designs, selectable by name on the command line.

pub mod echo;

pub use echo::EchoTile;

use crate::framework::HostModel;

/// Names accepted by [`create_model`].
pub const ARCH_NAMES: [&str; 2] = ["echo", "echo_stall"];

/// `echo_stall` drops inbound ready on every third host cycle.
pub const STALL_PERIOD: u64 = 3;

/// Parameters shared by the built-in designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchOption {
    /// host port width in bits
    pub width: u32,
    /// simulation steps per host clock cycle
    pub divider: u32,
    pub reset_stages: usize,
}

impl Default for ArchOption {
    fn default() -> Self {
        Self {
            width: 16,
            divider: 2,
            reset_stages: 2,
        }
    }
}

/// Get all architecture names
pub fn arch_names() -> Vec<&'static str> {
    ARCH_NAMES.to_vec()
}

pub fn create_model(name: &str, opt: ArchOption) -> Option<Box<dyn HostModel>> {
    let tile = EchoTile::new(opt.width, opt.divider, opt.reset_stages);
    match name {
        "echo" => Some(Box::new(tile)),
        "echo_stall" => Some(Box::new(tile.with_stall_every(STALL_PERIOD))),
        _ => None,
    }
}
