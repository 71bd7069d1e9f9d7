use crate::types::{ConditionStatus, ProbeOutcome};
use crate::{PROBE_FAILED_REASON, READINESS_GATE_CONDITION};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Build the marker condition for a probe outcome observed at `now`.
///
/// Both timestamps are set to `now`; [`set_pod_condition`] carries the old
/// transition time over when the status did not change.
pub fn readiness_condition(outcome: &ProbeOutcome, now: DateTime<Utc>) -> PodCondition {
    let (status, reason, message) = match outcome {
        ProbeOutcome::Success => (ConditionStatus::True, None, None),
        ProbeOutcome::Failure(detail) => (
            ConditionStatus::False,
            Some(PROBE_FAILED_REASON.to_string()),
            Some(detail.clone()),
        ),
    };

    PodCondition {
        type_: READINESS_GATE_CONDITION.to_string(),
        status: status.as_str().to_string(),
        last_probe_time: Some(Time(now)),
        last_transition_time: Some(Time(now)),
        reason,
        message,
    }
}

/// Find the condition of the given type, with its index
pub fn find_pod_condition<'a>(
    conditions: &'a [PodCondition],
    condition_type: &str,
) -> Option<(usize, &'a PodCondition)> {
    conditions
        .iter()
        .enumerate()
        .find(|(_, c)| c.type_ == condition_type)
}

/// Merge `condition` into the status, keeping at most one entry per type.
///
/// - absent: appended
/// - same status: replaced, but the existing last-transition time is kept
/// - different status: replaced entirely
///
/// Other conditions keep their position. Returns true when anything other than
/// the last-probe time changed.
pub fn set_pod_condition(status: &mut PodStatus, mut condition: PodCondition) -> bool {
    let conditions = status.conditions.get_or_insert_with(Vec::new);

    let Some(index) = conditions.iter().position(|c| c.type_ == condition.type_) else {
        conditions.push(condition);
        return true;
    };

    let existing = &conditions[index];
    if existing.status == condition.status {
        condition.last_transition_time = existing.last_transition_time.clone();
    }

    let changed = !same_except_probe_time(existing, &condition);
    conditions[index] = condition;
    changed
}

fn same_except_probe_time(a: &PodCondition, b: &PodCondition) -> bool {
    a.type_ == b.type_
        && a.status == b.status
        && a.reason == b.reason
        && a.message == b.message
        && a.last_transition_time == b.last_transition_time
}
