pub mod executor;
pub mod target;

pub use executor::{ProbeExecutor, ProbeResult};
pub use target::{ProbeScheme, ProbeTarget, TargetError, DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT};
