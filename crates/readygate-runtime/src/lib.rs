// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod api_client;
pub mod controller;
pub mod error;
pub mod mock;
pub mod probes;
pub mod queue;
pub mod reconciler;
pub mod traits;

// Re-export primary types
pub use error::{Result, RuntimeError};
pub use mock::MockPodClient;
pub use traits::PodClient;

// Re-export probe types
pub use probes::{ProbeExecutor, ProbeResult, ProbeScheme, ProbeTarget, TargetError};

// Re-export controller types
pub use api_client::{ApiClient, ApiClientConfig};
pub use controller::{ControllerConfig, ReadinessGateController};
pub use queue::WorkQueue;
pub use reconciler::{ReconcileOutcome, Reconciler};
