mod health;

use clap::{Args, Parser, Subcommand, ValueEnum};
use health::HealthServer;
use readygate_core::{from_yaml, Pod, ProbeOutcome};
use readygate_runtime::{
    ApiClient, ApiClientConfig, ControllerConfig, PodClient, ProbeExecutor, ProbeTarget,
    ReadinessGateController,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

#[derive(Parser)]
#[command(
    name = "readygate",
    about = "Readiness gate controller that marks Pods ready once an HTTP probe returns 200"
)]
struct Cli {
    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "READYGATE_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller against a Kubernetes API server
    Run(RunArgs),
    /// Probe a single Pod manifest once and print the outcome
    Probe {
        /// Pod manifest (YAML or JSON)
        pod_file: PathBuf,
        /// Only print the derived probe target
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Kubernetes API server URL
    #[arg(long, env = "READYGATE_API_URL", default_value = "https://kubernetes.default.svc")]
    api_url: String,
    /// Bearer token file; skipped when it does not exist
    #[arg(long, env = "READYGATE_TOKEN_FILE", default_value = SERVICE_ACCOUNT_TOKEN)]
    token_file: PathBuf,
    /// Cluster CA bundle; skipped when it does not exist
    #[arg(long, env = "READYGATE_CA_CERT", default_value = SERVICE_ACCOUNT_CA)]
    ca_cert: PathBuf,
    /// Only reconcile Pods in this namespace
    #[arg(long, env = "READYGATE_NAMESPACE")]
    namespace: Option<String>,
    /// Seconds between full Pod resyncs
    #[arg(long, env = "READYGATE_RESYNC_INTERVAL_SECS", default_value_t = 10)]
    resync_interval_secs: u64,
    /// Upper bound on concurrent reconciliations
    #[arg(long, env = "READYGATE_MAX_CONCURRENT_RECONCILES", default_value_t = 100)]
    max_concurrent_reconciles: usize,
    /// Seconds before a failed reconciliation is retried
    #[arg(long, env = "READYGATE_REQUEUE_AFTER_SECS", default_value_t = 5)]
    requeue_after_secs: u64,
    /// Address for the /healthz, /livez and /readyz endpoints
    #[arg(long, env = "READYGATE_HEALTH_BIND", default_value = "0.0.0.0:9444")]
    health_bind: String,
}

impl RunArgs {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            namespace: self.namespace.clone(),
            resync_interval: Duration::from_secs(self.resync_interval_secs.max(1)),
            max_concurrent_reconciles: self.max_concurrent_reconciles.max(1),
            requeue_after: Duration::from_secs(self.requeue_after_secs),
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_format);

    match cli.command {
        Commands::Run(args) => run_controller(args).await,
        Commands::Probe { pod_file, dry_run } => run_probe(&pod_file, dry_run).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Run the controller and the health server until ctrl-c
async fn run_controller(args: RunArgs) -> miette::Result<()> {
    info!("Starting readygate controller against {}", args.api_url);

    let health_addr: std::net::SocketAddr = args.health_bind.parse().map_err(|e| {
        miette::miette!("Invalid health bind address '{}': {}", args.health_bind, e)
    })?;

    let bearer_token = read_optional_file(&args.token_file)
        .await?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    let ca_cert_pem = read_optional_file(&args.ca_cert).await?;

    let api_client = ApiClient::from_config(&ApiClientConfig {
        base_url: args.api_url.clone(),
        bearer_token,
        ca_cert_pem,
    })?;
    let client: Arc<dyn PodClient> = Arc::new(api_client);

    // One pooled probe client for the whole process
    let executor = Arc::new(ProbeExecutor::new()?);

    let token = CancellationToken::new();

    // 1. Spawn health server
    let health_server = HealthServer::new(health_addr);
    let health_handle = tokio::spawn(run_health_server(health_server, token.clone()));

    // 2. Spawn controller
    let controller = ReadinessGateController::new(client, executor, args.controller_config());
    let controller_token = token.clone();
    let controller_handle = tokio::spawn(async move {
        if let Err(e) = controller.run(controller_token).await {
            error!("Controller error: {}", e);
        }
    });

    info!("All components started. Health endpoints on {}", health_addr);

    // Wait for shutdown signal, or for a component to give up
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;
            info!("Shutting down gracefully...");
        }
        _ = token.cancelled() => {
            error!("A component stopped unexpectedly, shutting down");
        }
    }
    token.cancel();

    // In-flight probes are bounded by their own timeout; don't wait longer than this
    let shutdown_timeout = Duration::from_secs(5);
    let joined = tokio::time::timeout(shutdown_timeout, async {
        tokio::join!(health_handle, controller_handle)
    })
    .await;

    info!("Shutdown complete");

    match joined {
        Ok((Ok(Err(e)), _)) => Err(miette::miette!("Health server failed: {}", e)),
        _ => Ok(()),
    }
}

/// Serve health endpoints; if the server fails, cancel `token` so the
/// controller stops with it
async fn run_health_server(
    server: HealthServer,
    token: CancellationToken,
) -> std::io::Result<()> {
    let result = server.run(token.clone()).await;
    if let Err(e) = &result {
        error!("Health server error: {}", e);
        token.cancel();
    }
    result
}

/// Probe a Pod manifest once, outside of any cluster
async fn run_probe(pod_file: &Path, dry_run: bool) -> miette::Result<()> {
    let manifest = tokio::fs::read_to_string(pod_file)
        .await
        .map_err(|e| miette::miette!("Failed to read '{}': {}", pod_file.display(), e))?;
    let pod: Pod = from_yaml(&manifest)?;

    let target = ProbeTarget::from_pod(&pod)
        .map_err(|e| miette::miette!("Cannot derive probe target: {}", e))?;
    println!("target: {} (timeout {:?})", target.url(), target.timeout);

    if dry_run {
        return Ok(());
    }

    let executor = ProbeExecutor::new()?;
    match executor.execute(&target).await {
        ProbeOutcome::Success => {
            println!("outcome: success");
            Ok(())
        }
        ProbeOutcome::Failure(message) => Err(miette::miette!("probe failed: {}", message)),
    }
}

/// Read a file if it exists; a missing file is `None`
async fn read_optional_file(path: &Path) -> miette::Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} not found, continuing without it", path.display());
            Ok(None)
        }
        Err(e) => Err(miette::miette!("Failed to read '{}': {}", path.display(), e)),
    }
}
