pub mod architectures;
pub mod config;
mod emulator;
pub mod framework;
pub mod host;
pub mod report;
pub mod trace;
mod utils;

#[cfg(test)]
mod test;

pub use config::{RunConfig, TraceTarget};
pub use emulator::{Emulator, RESET_HOST_EDGES};
pub use host::{HostEndpoint, LoopbackHost, StopToken};
pub use report::{Outcome, RunReport};
pub use utils::{get_u64, payload_bytes, put_u64};
