use crate::error::{Result, RuntimeError};
use crate::probes::ProbeExecutor;
use crate::traits::PodClient;
use k8s_openapi::api::core::v1::PodStatus;
use readygate_core::{
    check_eligibility, readiness_condition, set_pod_condition, ConditionStatus, Eligibility,
    PodKey, ProbeOutcome, SkipReason,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a single reconciliation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The Pod no longer exists
    PodGone,
    /// The Pod needs no probe
    Skipped(SkipReason),
    /// The marker condition was written with this status
    Updated {
        status: ConditionStatus,
        /// Whether anything besides the probe time changed
        changed: bool,
    },
}

/// Reads one Pod, probes it when owed, and writes the marker condition back
pub struct Reconciler {
    client: Arc<dyn PodClient>,
    executor: Arc<ProbeExecutor>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn PodClient>, executor: Arc<ProbeExecutor>) -> Self {
        Self { client, executor }
    }

    /// Reconcile a single Pod.
    ///
    /// Probe failures are recorded on the Pod and are not errors. Only the
    /// status write (or a failed read other than NotFound) returns `Err`.
    pub async fn reconcile(&self, key: &PodKey) -> Result<ReconcileOutcome> {
        let mut pod = match self.client.get_pod(&key.namespace, &key.name).await {
            Ok(pod) => pod,
            Err(RuntimeError::PodNotFound { .. }) => {
                debug!("Pod {} no longer exists, nothing to do", key);
                return Ok(ReconcileOutcome::PodGone);
            }
            Err(e) => return Err(e),
        };

        if let Eligibility::Skip(reason) = check_eligibility(&pod) {
            debug!("Skipping pod {}: {}", key, reason);
            return Ok(ReconcileOutcome::Skipped(reason));
        }

        let result = self.executor.probe_pod(&pod).await;
        match &result.outcome {
            ProbeOutcome::Success => {
                debug!("Probe of pod {} succeeded in {:?}", key, result.duration)
            }
            ProbeOutcome::Failure(message) => {
                warn!("Probe of pod {} failed: {}", key, message)
            }
        }

        let condition = readiness_condition(&result.outcome, result.timestamp);
        let status = ConditionStatus::parse(&condition.status);
        let changed = set_pod_condition(
            pod.status.get_or_insert_with(PodStatus::default),
            condition,
        );

        self.client
            .update_pod_status(&key.namespace, &key.name, &pod)
            .await?;

        if changed {
            info!("Pod {} readiness gate set to {}", key, status);
        } else {
            debug!("Pod {} readiness gate still {}", key, status);
        }

        Ok(ReconcileOutcome::Updated { status, changed })
    }
}
