//! Readygate Core - Pod readiness-gate decision logic
//!
//! This crate provides:
//! - The readiness-gate marker this controller owns
//! - Eligibility checks deciding whether a Pod is owed a probe
//! - Condition merging that preserves transition timestamps
//! - Error types with miette diagnostics
//! - YAML/JSON decoding of Pod manifests

pub mod conditions;
pub mod eligibility;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use conditions::{find_pod_condition, readiness_condition, set_pod_condition};
pub use eligibility::{check_eligibility, Eligibility, SkipReason};
pub use error::{ReadyGateError, Result};
pub use types::{ConditionStatus, PodKey, ProbeOutcome};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};

/// Condition type that both declares opt-in (spec.readinessGates) and records
/// the probe outcome (status.conditions)
pub const READINESS_GATE_CONDITION: &str = "kubernetes-router.tsuru.io/probe-200-only";

/// Reason recorded on the condition when the probe fails
pub const PROBE_FAILED_REASON: &str = "Failed";

/// Deserialize a resource from YAML
///
/// JSON is a subset of YAML, so this also accepts JSON manifests.
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        ReadyGateError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}
