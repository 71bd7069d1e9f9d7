use crate::types::ConditionStatus;
use crate::READINESS_GATE_CONDITION;
use k8s_openapi::api::core::v1::Pod;
use std::fmt;

/// Why a Pod does not need a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The Pod declares no readiness gates at all
    NoReadinessGates,
    /// The marker condition is already True
    AlreadyReady,
    /// The Pod declares readiness gates, but not ours
    NotOptedIn,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoReadinessGates => write!(f, "no readiness gates declared"),
            SkipReason::AlreadyReady => write!(f, "readiness gate already satisfied"),
            SkipReason::NotOptedIn => write!(f, "readiness gate not declared"),
        }
    }
}

/// Result of the eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Process,
    Skip(SkipReason),
}

/// Decide whether a Pod is owed a probe.
///
/// Checks run in order: no gates, already satisfied, not opted in.
pub fn check_eligibility(pod: &Pod) -> Eligibility {
    let has_gates = pod
        .spec
        .as_ref()
        .and_then(|s| s.readiness_gates.as_ref())
        .is_some();
    if !has_gates {
        return Eligibility::Skip(SkipReason::NoReadinessGates);
    }

    if already_marked(pod) {
        return Eligibility::Skip(SkipReason::AlreadyReady);
    }

    if !declares_readiness_gate(pod) {
        return Eligibility::Skip(SkipReason::NotOptedIn);
    }

    Eligibility::Process
}

/// True when the marker condition is present with status True
pub fn already_marked(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.type_ == READINESS_GATE_CONDITION
                    && ConditionStatus::parse(&c.status) == ConditionStatus::True
            })
        })
        .unwrap_or(false)
}

/// True when the Pod lists the marker among its readiness gates
pub fn declares_readiness_gate(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|s| s.readiness_gates.as_ref())
        .map(|gates| {
            gates
                .iter()
                .any(|g| g.condition_type == READINESS_GATE_CONDITION)
        })
        .unwrap_or(false)
}
