use crate::error::Result;
use crate::probes::ProbeExecutor;
use crate::queue::WorkQueue;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::traits::PodClient;
use futures_util::stream::{self, StreamExt};
use readygate_core::{check_eligibility, Eligibility, PodKey};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the readiness-gate controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Only reconcile pods in this namespace (all namespaces when `None`)
    pub namespace: Option<String>,
    /// Interval between full resyncs of every Pod
    pub resync_interval: Duration,
    /// Upper bound on reconciliations in flight at once
    pub max_concurrent_reconciles: usize,
    /// Delay before retrying a Pod whose reconciliation failed
    pub requeue_after: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval: Duration::from_secs(10),
            max_concurrent_reconciles: 100,
            requeue_after: Duration::from_secs(5),
        }
    }
}

/// Delivers reconcile requests for Pods to the [`Reconciler`]
///
/// A resync loop lists Pods on an interval and feeds the work queue; up to
/// `max_concurrent_reconciles` workers drain it. Failed reconciliations are
/// requeued after `requeue_after`.
pub struct ReadinessGateController {
    client: Arc<dyn PodClient>,
    reconciler: Reconciler,
    queue: Arc<WorkQueue>,
    config: ControllerConfig,
}

impl ReadinessGateController {
    pub fn new(
        client: Arc<dyn PodClient>,
        executor: Arc<ProbeExecutor>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(client.clone(), executor),
            client,
            queue: Arc::new(WorkQueue::new()),
            config,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Run the controller until the token is cancelled
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting readiness gate controller (namespace: {}, resync: {:?}, workers: {})",
            self.config.namespace.as_deref().unwrap_or("<all>"),
            self.config.resync_interval,
            self.config.max_concurrent_reconciles
        );

        let queue = self.queue.clone();
        let shutdown_token = token.clone();
        let shutdown = async move {
            shutdown_token.cancelled().await;
            queue.shutdown().await;
        };

        tokio::join!(self.resync_loop(token), self.process_queue(), shutdown);

        info!("Readiness gate controller stopped");
        Ok(())
    }

    /// Enqueue every Pod on each tick until cancelled
    async fn resync_loop(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.resync_interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Resync loop shutting down");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.enqueue_all().await {
                        error!("Pod resync failed: {}", e);
                    }
                }
            }
        }
    }

    /// List Pods and queue a reconcile request for each one still owed a probe
    ///
    /// The listed copies are fresh enough to filter on; the reconciler checks
    /// eligibility again against the Pod it reads back.
    pub async fn enqueue_all(&self) -> Result<usize> {
        let pods = self.client.list_pods(self.config.namespace.as_deref()).await?;

        let mut queued = 0;
        for pod in &pods {
            if let Eligibility::Skip(_) = check_eligibility(pod) {
                continue;
            }
            match PodKey::from_pod(pod) {
                Ok(key) => {
                    self.queue.add(key).await;
                    queued += 1;
                }
                Err(e) => warn!("Ignoring pod from list: {}", e),
            }
        }

        debug!("Resync queued {} of {} pods", queued, pods.len());
        Ok(queued)
    }

    /// Drain the queue with bounded concurrency until it shuts down
    async fn process_queue(&self) {
        let keys = stream::unfold(self.queue.clone(), |queue| async move {
            queue.get().await.map(|key| (key, queue))
        });

        keys.for_each_concurrent(self.config.max_concurrent_reconciles.max(1), |key| {
            self.process_key(key)
        })
        .await;
    }

    async fn process_key(&self, key: PodKey) {
        match self.reconciler.reconcile(&key).await {
            Ok(ReconcileOutcome::Updated { status, .. }) => {
                debug!("Reconciled pod {} ({})", key, status);
            }
            Ok(_) => {}
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        "Reconcile of pod {} failed, retrying in {:?}: {}",
                        key, self.config.requeue_after, e
                    );
                } else {
                    error!(
                        "Reconcile of pod {} failed, retrying in {:?}: {}",
                        key, self.config.requeue_after, e
                    );
                }
                self.queue.add_after(key.clone(), self.config.requeue_after);
            }
        }
        self.queue.done(&key).await;
    }
}
