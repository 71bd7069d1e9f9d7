use k8s_openapi::api::core::v1::{Container, Pod, Probe};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Port probed when the first container declares none
pub const DEFAULT_PROBE_PORT: u16 = 8888;

/// Timeout used when the selected probe has none configured
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// URL scheme of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeScheme {
    Http,
    Https,
}

impl ProbeScheme {
    /// `HTTPS` in any case selects https; everything else is http
    fn from_k8s(scheme: Option<&str>) -> Self {
        match scheme {
            Some(s) if s.eq_ignore_ascii_case("HTTPS") => ProbeScheme::Https,
            _ => ProbeScheme::Http,
        }
    }
}

impl fmt::Display for ProbeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeScheme::Http => write!(f, "http"),
            ProbeScheme::Https => write!(f, "https"),
        }
    }
}

/// Why a probe target could not be derived from a Pod
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("pod has no containers")]
    NoContainers,
    #[error("pod has no IP address assigned")]
    NoPodIp,
}

/// Where and how to probe a Pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub scheme: ProbeScheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout: Duration,
}

impl ProbeTarget {
    /// Derive the target from the Pod's IP and its first container.
    ///
    /// The port is the container's first declared port, not the probe's port.
    /// Path and scheme come from the readiness probe when it exists, otherwise
    /// from the liveness probe.
    pub fn from_pod(pod: &Pod) -> Result<Self, TargetError> {
        let container = pod
            .spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .ok_or(TargetError::NoContainers)?;

        let host = pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.as_deref())
            .filter(|ip| !ip.is_empty())
            .ok_or(TargetError::NoPodIp)?;

        let mut target = Self::for_container(container);
        target.host = host.to_string();
        Ok(target)
    }

    fn for_container(container: &Container) -> Self {
        let port = container
            .ports
            .as_ref()
            .and_then(|ports| ports.first())
            .and_then(|p| u16::try_from(p.container_port).ok())
            .unwrap_or(DEFAULT_PROBE_PORT);

        let mut target = Self {
            scheme: ProbeScheme::Http,
            host: String::new(),
            port,
            path: "/".to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        };

        let Some(probe) = selected_probe(container) else {
            return target;
        };

        if let Some(secs) = probe.timeout_seconds.filter(|s| *s > 0) {
            target.timeout = Duration::from_secs(secs as u64);
        }

        if let Some(http) = &probe.http_get {
            target.scheme = ProbeScheme::from_k8s(http.scheme.as_deref());
            target.path = match http.path.as_deref() {
                None | Some("") => "/".to_string(),
                Some(p) if p.starts_with('/') => p.to_string(),
                Some(p) => format!("/{}", p),
            };
        }

        target
    }

    /// `scheme://host:port/path`, with IPv6 hosts bracketed
    pub fn url(&self) -> String {
        let host = match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{}]", v6),
            _ => self.host.clone(),
        };
        format!("{}://{}:{}{}", self.scheme, host, self.port, self.path)
    }
}

/// Readiness probe if declared, else liveness probe
fn selected_probe(container: &Container) -> Option<&Probe> {
    container
        .readiness_probe
        .as_ref()
        .or(container.liveness_probe.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerPort, ExecAction, HTTPGetAction, PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    fn http_probe(scheme: Option<&str>, path: Option<&str>, timeout: Option<i32>) -> Probe {
        Probe {
            http_get: Some(HTTPGetAction {
                path: path.map(str::to_string),
                port: IntOrString::Int(1234),
                scheme: scheme.map(str::to_string),
                ..Default::default()
            }),
            timeout_seconds: timeout,
            ..Default::default()
        }
    }

    fn pod(container: Container, ip: Option<&str>) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers: vec![container],
                ..Default::default()
            }),
            status: Some(PodStatus {
                pod_ip: ip.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn with_port(port: i32) -> Option<Vec<ContainerPort>> {
        Some(vec![ContainerPort {
            container_port: port,
            ..Default::default()
        }])
    }

    #[test]
    fn test_https_readiness_probe() {
        let container = Container {
            name: "web".to_string(),
            ports: with_port(9000),
            readiness_probe: Some(http_probe(Some("HTTPS"), Some("/health"), Some(3))),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("10.0.0.7"))).unwrap();

        assert_eq!(target.url(), "https://10.0.0.7:9000/health");
        assert_eq!(target.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_defaults_without_probes_or_ports() {
        let container = Container {
            name: "bare".to_string(),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("10.0.0.7"))).unwrap();

        assert_eq!(target.url(), "http://10.0.0.7:8888/");
        assert_eq!(target.timeout, DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn test_liveness_probe_used_when_no_readiness_probe() {
        let container = Container {
            name: "web".to_string(),
            liveness_probe: Some(http_probe(None, Some("/livez"), Some(5))),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("10.0.0.7"))).unwrap();

        assert_eq!(target.url(), "http://10.0.0.7:8888/livez");
        assert_eq!(target.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_readiness_without_http_get_does_not_fall_back() {
        let container = Container {
            name: "web".to_string(),
            ports: with_port(8080),
            readiness_probe: Some(Probe {
                exec: Some(ExecAction {
                    command: Some(vec!["true".to_string()]),
                }),
                timeout_seconds: Some(2),
                ..Default::default()
            }),
            liveness_probe: Some(http_probe(Some("HTTPS"), Some("/livez"), Some(9))),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("10.0.0.7"))).unwrap();

        assert_eq!(target.url(), "http://10.0.0.7:8080/");
        assert_eq!(target.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_probe_port_is_ignored_in_favor_of_container_port() {
        let container = Container {
            name: "web".to_string(),
            ports: with_port(8080),
            readiness_probe: Some(http_probe(None, Some("/ready"), None)),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("10.0.0.7"))).unwrap();
        assert_eq!(target.port, 8080);
        assert_eq!(target.timeout, DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn test_empty_and_relative_paths() {
        let empty = Container {
            readiness_probe: Some(http_probe(None, Some(""), None)),
            ..Default::default()
        };
        assert_eq!(
            ProbeTarget::from_pod(&pod(empty, Some("10.0.0.7"))).unwrap().path,
            "/"
        );

        let relative = Container {
            readiness_probe: Some(http_probe(None, Some("ready"), None)),
            ..Default::default()
        };
        assert_eq!(
            ProbeTarget::from_pod(&pod(relative, Some("10.0.0.7")))
                .unwrap()
                .path,
            "/ready"
        );
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let container = Container {
            readiness_probe: Some(http_probe(None, None, Some(0))),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("10.0.0.7"))).unwrap();
        assert_eq!(target.timeout, DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let container = Container {
            ports: with_port(80),
            ..Default::default()
        };
        let target = ProbeTarget::from_pod(&pod(container, Some("fd00::12"))).unwrap();
        assert_eq!(target.url(), "http://[fd00::12]:80/");
    }

    #[test]
    fn test_missing_containers_or_ip() {
        let no_containers = Pod {
            spec: Some(PodSpec::default()),
            ..Default::default()
        };
        assert_eq!(
            ProbeTarget::from_pod(&no_containers),
            Err(TargetError::NoContainers)
        );

        let no_ip = pod(Container::default(), None);
        assert_eq!(ProbeTarget::from_pod(&no_ip), Err(TargetError::NoPodIp));
    }
}
