use crate::error::{Result, RuntimeError};
use crate::traits::PodClient;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Connection settings for the Kubernetes API server
#[derive(Debug, Clone, Default)]
pub struct ApiClientConfig {
    /// API server URL (e.g., "https://kubernetes.default.svc")
    pub base_url: String,
    /// Bearer token sent on every request
    pub bearer_token: Option<String>,
    /// PEM bundle of the cluster CA, added to the trusted roots
    pub ca_cert_pem: Option<Vec<u8>>,
}

/// HTTP client for the Pod endpoints of the Kubernetes API server
pub struct ApiClient {
    base_url: String,
    bearer_token: Option<String>,
    client: Client,
}

/// Minimal PodList envelope; only `items` is needed
#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
            client: Client::new(),
        }
    }

    /// Build a client with authentication and an optional cluster CA
    pub fn from_config(config: &ApiClientConfig) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(pem) = &config.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                RuntimeError::invalid_config(
                    format!("Failed to parse cluster CA certificate: {}", e),
                    "Pass a PEM encoded CA bundle, e.g. /var/run/secrets/kubernetes.io/serviceaccount/ca.crt",
                )
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|e| {
            RuntimeError::internal_error(format!("Failed to build API client: {}", e))
        })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config
                .bearer_token
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn pod_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/api/v1/namespaces/{}/pods/{}",
            self.base_url, namespace, name
        )
    }
}

/// Map a non-success response to the matching error
async fn check_response(
    resp: Response,
    operation: &str,
    namespace: &str,
    name: &str,
) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND if !name.is_empty() => {
            Err(RuntimeError::pod_not_found(namespace, name))
        }
        StatusCode::CONFLICT => Err(RuntimeError::conflict(namespace, name, body)),
        _ => Err(RuntimeError::api_request_failed(
            operation,
            status.as_u16(),
            body,
        )),
    }
}

#[async_trait]
impl PodClient for ApiClient {
    /// GET /api/v1/namespaces/{namespace}/pods/{name}
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let url = self.pod_url(namespace, name);
        debug!("GET {}", url);

        let resp = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| RuntimeError::transport(e.to_string()))?;
        let resp = check_response(resp, "GET pod", namespace, name).await?;

        resp.json::<Pod>()
            .await
            .map_err(|e| RuntimeError::internal_error(format!("Failed to parse pod: {}", e)))
    }

    /// GET /api/v1/pods or /api/v1/namespaces/{namespace}/pods
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        let url = match namespace {
            Some(ns) => format!("{}/api/v1/namespaces/{}/pods", self.base_url, ns),
            None => format!("{}/api/v1/pods", self.base_url),
        };
        debug!("GET {}", url);

        let resp = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| RuntimeError::transport(e.to_string()))?;
        let resp = check_response(resp, "LIST pods", namespace.unwrap_or_default(), "").await?;

        let list = resp.json::<PodList>().await.map_err(|e| {
            RuntimeError::internal_error(format!("Failed to parse pod list: {}", e))
        })?;
        Ok(list.items)
    }

    /// PUT /api/v1/namespaces/{namespace}/pods/{name}/status
    async fn update_pod_status(&self, namespace: &str, name: &str, pod: &Pod) -> Result<Pod> {
        let url = format!("{}/status", self.pod_url(namespace, name));
        debug!("PUT {}", url);

        let resp = self
            .request(Method::PUT, &url)
            .json(pod)
            .send()
            .await
            .map_err(|e| RuntimeError::transport(e.to_string()))?;
        let resp = check_response(resp, "PUT pod status", namespace, name).await?;

        resp.json::<Pod>()
            .await
            .map_err(|e| RuntimeError::internal_error(format!("Failed to parse pod: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    fn stored_pod(namespace: &str, name: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "resourceVersion": "7"
            },
            "spec": { "containers": [{ "name": "web" }] }
        })
    }

    async fn get_pod_handler(
        Path((namespace, name)): Path<(String, String)>,
    ) -> (AxumStatus, Json<Value>) {
        if name == "web" {
            (AxumStatus::OK, Json(stored_pod(&namespace, &name)))
        } else {
            (
                AxumStatus::NOT_FOUND,
                Json(json!({"kind": "Status", "reason": "NotFound", "code": 404})),
            )
        }
    }

    async fn put_status_handler(
        Path((_namespace, _name)): Path<(String, String)>,
        Json(pod): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        if pod["metadata"]["resourceVersion"] == "7" {
            let mut updated = pod.clone();
            updated["metadata"]["resourceVersion"] = json!("8");
            (AxumStatus::OK, Json(updated))
        } else {
            (
                AxumStatus::CONFLICT,
                Json(json!({"kind": "Status", "reason": "Conflict", "code": 409})),
            )
        }
    }

    async fn list_all_handler() -> Json<Value> {
        Json(json!({
            "kind": "PodList",
            "apiVersion": "v1",
            "metadata": { "resourceVersion": "10" },
            "items": [stored_pod("a", "web"), stored_pod("b", "web")]
        }))
    }

    async fn list_namespaced_handler(
        headers: HeaderMap,
        Path(namespace): Path<String>,
    ) -> (AxumStatus, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "Bearer s3cret")
            .unwrap_or(false);
        if !authorized {
            return (
                AxumStatus::UNAUTHORIZED,
                Json(json!({"kind": "Status", "code": 401})),
            );
        }
        (
            AxumStatus::OK,
            Json(json!({"kind": "PodList", "items": [stored_pod(&namespace, "web")]})),
        )
    }

    async fn spawn_fake_api_server() -> String {
        let router = Router::new()
            .route("/api/v1/pods", get(list_all_handler))
            .route(
                "/api/v1/namespaces/{namespace}/pods",
                get(list_namespaced_handler),
            )
            .route(
                "/api/v1/namespaces/{namespace}/pods/{name}",
                get(get_pod_handler),
            )
            .route(
                "/api/v1/namespaces/{namespace}/pods/{name}/status",
                put(put_status_handler),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://127.0.0.1:6443/");
        assert_eq!(client.base_url(), "http://127.0.0.1:6443");
    }

    #[test]
    fn test_from_config_rejects_garbage_ca() {
        let config = ApiClientConfig {
            base_url: "https://kubernetes.default.svc".to_string(),
            bearer_token: None,
            ca_cert_pem: Some(b"not a certificate".to_vec()),
        };
        assert!(matches!(
            ApiClient::from_config(&config),
            Err(RuntimeError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_pod() {
        let client = ApiClient::new(&spawn_fake_api_server().await);
        let pod = client.get_pod("apps", "web").await.unwrap();
        assert_eq!(pod.metadata.namespace.as_deref(), Some("apps"));
        assert_eq!(pod.metadata.resource_version.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_get_missing_pod_is_not_found() {
        let client = ApiClient::new(&spawn_fake_api_server().await);
        let err = client.get_pod("apps", "gone").await.unwrap_err();
        assert!(matches!(err, RuntimeError::PodNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_status_with_current_version() {
        let client = ApiClient::new(&spawn_fake_api_server().await);
        let pod = client.get_pod("apps", "web").await.unwrap();
        let updated = client.update_pod_status("apps", "web", &pod).await.unwrap();
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("8"));
    }

    #[tokio::test]
    async fn test_update_status_with_stale_version_conflicts() {
        let client = ApiClient::new(&spawn_fake_api_server().await);
        let mut pod = client.get_pod("apps", "web").await.unwrap();
        pod.metadata.resource_version = Some("6".to_string());

        let err = client
            .update_pod_status("apps", "web", &pod)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Conflict { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_list_all_pods() {
        let client = ApiClient::new(&spawn_fake_api_server().await);
        let pods = client.list_pods(None).await.unwrap();
        assert_eq!(pods.len(), 2);
    }

    #[tokio::test]
    async fn test_list_namespaced_pods_sends_bearer_token() {
        let base_url = spawn_fake_api_server().await;

        let anonymous = ApiClient::new(&base_url);
        let err = anonymous.list_pods(Some("apps")).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::ApiRequestFailed { status: 401, .. }
        ));

        let authed = ApiClient::from_config(&ApiClientConfig {
            base_url,
            bearer_token: Some("s3cret\n".to_string()),
            ca_cert_pem: None,
        })
        .unwrap();
        let pods = authed.list_pods(Some("apps")).await.unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].metadata.namespace.as_deref(), Some("apps"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:1");
        let err = client.get_pod("apps", "web").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Transport { .. }));
    }
}
