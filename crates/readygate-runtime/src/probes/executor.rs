use crate::error::{Result, RuntimeError};
use crate::probes::target::ProbeTarget;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use readygate_core::ProbeOutcome;
use reqwest::{Client, NoProxy, Proxy, StatusCode, Url};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long an idle pooled connection is kept before it is closed
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on idle pooled connections per Pod endpoint
const MAX_IDLE_CONNECTIONS: usize = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
/// Body bytes read back before the response is dropped
const MAX_DRAINED_BODY_BYTES: usize = 64 * 1024;

/// Result of a probe execution with timing metadata
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub outcome: ProbeOutcome,
    pub duration: Duration,
    /// Wall-clock time the probe started, recorded as the condition's probe time
    pub timestamp: DateTime<Utc>,
}

/// Issues HTTP probes against Pod IPs over one pooled client.
///
/// Build it once per process and share it behind an `Arc`. The client skips
/// TLS certificate verification because in-cluster endpoints are commonly
/// self-signed; do not reuse it for anything but Pod probes.
pub struct ProbeExecutor {
    client: Client,
}

impl ProbeExecutor {
    pub fn new() -> Result<Self> {
        let builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE);

        let builder = match EnvProxy::from_env() {
            Some(proxy) => {
                debug!("Probe requests honour environment proxies");
                builder.proxy(proxy.into_proxy())
            }
            None => builder.no_proxy(),
        };

        let client = builder.build().map_err(|e| {
            RuntimeError::internal_error(format!("Failed to build probe client: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Derive the Pod's probe target and probe it once
    pub async fn probe_pod(&self, pod: &Pod) -> ProbeResult {
        let timestamp = Utc::now();
        let start = Instant::now();

        let outcome = match ProbeTarget::from_pod(pod) {
            Ok(target) => self.execute(&target).await,
            Err(e) => ProbeOutcome::Failure(e.to_string()),
        };

        ProbeResult {
            outcome,
            duration: start.elapsed(),
            timestamp,
        }
    }

    /// Issue a single GET and classify it: only 200 is a success
    pub async fn execute(&self, target: &ProbeTarget) -> ProbeOutcome {
        let url = target.url();
        debug!("Probing {} (timeout {:?})", url, target.timeout);

        let mut response = match self.client.get(&url).timeout(target.timeout).send().await {
            Ok(r) => r,
            Err(e) => return ProbeOutcome::Failure(error_chain(&e)),
        };

        let status = response.status();

        // Short bodies are read to the end so the connection can be pooled;
        // anything longer is cut off and the connection dropped
        let mut drained = 0usize;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    drained += chunk.len();
                    if drained >= MAX_DRAINED_BODY_BYTES {
                        debug!(
                            "Probe response from {} exceeds {} bytes, dropping it",
                            url, drained
                        );
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Failed to drain probe response body from {}: {}", url, e);
                    break;
                }
            }
        }
        drop(response);

        if status == StatusCode::OK {
            ProbeOutcome::Success
        } else {
            ProbeOutcome::Failure(format!("unexpected status code {}", status.as_u16()))
        }
    }
}

/// Proxies named by `HTTP_PROXY` and `HTTPS_PROXY` (or their lowercase forms).
/// `NO_PROXY` is honoured and loopback targets always go direct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EnvProxy {
    http: Option<String>,
    https: Option<String>,
}

impl EnvProxy {
    fn from_env() -> Option<Self> {
        let proxy = Self {
            http: env_value(&["HTTP_PROXY", "http_proxy"]),
            https: env_value(&["HTTPS_PROXY", "https_proxy"]),
        };
        (proxy.http.is_some() || proxy.https.is_some()).then_some(proxy)
    }

    fn select(&self, url: &Url) -> Option<String> {
        if is_loopback(url) {
            return None;
        }
        match url.scheme() {
            "https" => self.https.clone(),
            _ => self.http.clone(),
        }
    }

    fn into_proxy(self) -> Proxy {
        Proxy::custom(move |url: &Url| self.select(url)).no_proxy(NoProxy::from_env())
    }
}

fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

/// Render an error with its sources, e.g. "error sending request ...: connection refused"
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
