//! Command-line front end for running a Hourglass node.
//!
//! One process runs one role: a performer, an executor relay, or the
//! compute-with-verification service. Configuration is layered: TOML file,
//! then `HOURGLASS_*` environment variables, then command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hourglass::client::HttpAggregatorClient;
use hourglass::config::Config;
use hourglass::lifecycle::LifecycleManager;
use hourglass::logging::LogFormat;
use hourglass::server::{performer_server, ExecutorRelay, ExecutorServer, Performer};
use hourglass::worker::WorkerKind;
use hourglass_compute::{compute_server, MockAttestor, ResultStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Hourglass task runtime node
#[derive(Debug, Parser)]
#[command(name = "hourglass-node")]
#[command(about = "Run an Hourglass performer, executor relay or compute service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, env = "HOURGLASS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogStyle::Pretty, global = true)]
    pub log_format: LogStyle,

    /// Role to run
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogStyle {
    /// Multi-field human-readable lines
    Pretty,
    /// Compact single lines
    Compact,
}

impl From<LogStyle> for LogFormat {
    fn from(style: LogStyle) -> Self {
        match style {
            LogStyle::Pretty => LogFormat::Pretty,
            LogStyle::Compact => LogFormat::Compact,
        }
    }
}

/// Listener flags shared by every role.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListenArgs {
    /// HTTP port (0 for ephemeral)
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
}

/// Roles.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve a worker over HTTP and JSON-RPC
    Performer {
        #[command(flatten)]
        listen: ListenArgs,

        /// RPC port (0 for ephemeral)
        #[arg(long)]
        rpc_port: Option<u16>,

        /// Built-in worker: square, hex-square, greeting
        #[arg(long)]
        worker: Option<WorkerKind>,

        /// Artificial delay before each task, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Relay task submissions to an aggregator
    Executor {
        #[command(flatten)]
        listen: ListenArgs,

        /// Operator address results are attributed to
        #[arg(long)]
        operator_address: Option<String>,

        /// Aggregator result-submission endpoint
        #[arg(long)]
        aggregator_url: Option<String>,

        /// Deliver results in the background
        #[arg(long)]
        detached: bool,
    },

    /// Serve the compute-with-verification API
    Compute {
        #[command(flatten)]
        listen: ListenArgs,
    },
}

impl Cli {
    /// Resolves the effective configuration for this invocation.
    pub fn resolve_config(&self) -> Result<Config> {
        self.resolve_config_with_env(std::env::vars())
    }

    /// Like [`resolve_config`](Self::resolve_config) with explicit environment.
    pub fn resolve_config_with_env<I>(&self, vars: I) -> Result<Config>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let base = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        let mut config = base.with_env(vars).context("reading environment")?;

        let listen = match &self.command {
            Command::Performer {
                listen,
                rpc_port,
                worker,
                delay_ms,
            } => {
                if let Some(port) = rpc_port {
                    config.server.rpc_port = *port;
                }
                if let Some(worker) = worker {
                    config.performer.worker = *worker;
                }
                if let Some(delay) = delay_ms {
                    config.performer.delay_ms = *delay;
                }
                listen
            },
            Command::Executor {
                listen,
                operator_address,
                aggregator_url,
                detached,
            } => {
                if let Some(address) = operator_address {
                    config.executor.operator_address = Some(address.clone());
                }
                if let Some(url) = aggregator_url {
                    config.executor.aggregator_url = Some(url.clone());
                }
                config.executor.detached_delivery |= *detached;
                listen
            },
            Command::Compute { listen } => listen,
        };
        if let Some(port) = listen.http_port {
            config.server.http_port = port;
        }
        if let Some(timeout) = listen.request_timeout_ms {
            config.server.request_timeout_ms = timeout;
        }
        Ok(config)
    }
}

/// Builds the lifecycle for `command` from `config`.
pub fn build(command: &Command, config: &Config, ctx: CancellationToken) -> Result<LifecycleManager> {
    let mut manager = LifecycleManager::with_context(ctx);
    match command {
        Command::Performer { .. } => {
            let worker = config.performer.worker.build(config.performer.delay());
            info!(worker = %config.performer.worker, "binding worker");
            manager.register(
                "performer",
                Arc::new(performer_server(Performer::from_arc(worker), &config.server)),
            );
        },
        Command::Executor { .. } => {
            let operator = config.executor.operator_address()?;
            let endpoint = config.executor.aggregator_url()?;
            let client = HttpAggregatorClient::new(endpoint, config.server.request_timeout())?;
            let relay = ExecutorRelay::new(operator, Arc::new(client))
                .detached(config.executor.detached_delivery);
            manager.register("executor", Arc::new(ExecutorServer::new(relay, &config.server)));
        },
        Command::Compute { .. } => {
            manager.register(
                "compute",
                Arc::new(compute_server(
                    Arc::new(ResultStore::new()),
                    Arc::new(MockAttestor::new()),
                    &config.server,
                )),
            );
        },
    }
    Ok(manager)
}

/// Runs the selected role until `shutdown` is cancelled.
pub async fn run(cli: Cli, shutdown: CancellationToken) -> Result<()> {
    let config = cli.resolve_config()?;
    run_with_config(&cli.command, &config, shutdown).await
}

/// Runs `command` with an already resolved configuration.
pub async fn run_with_config(command: &Command, config: &Config, shutdown: CancellationToken) -> Result<()> {
    let manager = build(command, config, shutdown.child_token())?;

    if let Err(err) = manager.start().await {
        error!(error = %err, "startup failed");
        if let Err(close_err) = manager.close().await {
            error!(error = %close_err, "cleanup after failed startup");
        }
        return Err(err.into());
    }
    info!("node running");

    shutdown.cancelled().await;
    info!(
        grace_ms = config.server.shutdown_grace_ms,
        "shutting down"
    );
    manager.close().await?;
    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM.
pub async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
        () = token.cancelled() => return,
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const OPERATOR: &str = "0x1111111111111111111111111111111111111111";

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hourglass-node").chain(args.iter().copied())).unwrap()
    }

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn flags_override_environment() {
        let cli = parse(&["performer", "--worker", "hex-square", "--http-port", "9000"]);
        let config = cli
            .resolve_config_with_env(vec![
                ("HOURGLASS_HTTP_PORT".to_string(), "7000".to_string()),
                ("HOURGLASS_RPC_PORT".to_string(), "7001".to_string()),
            ])
            .unwrap();
        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.server.rpc_port, 7001);
        assert_eq!(config.performer.worker, WorkerKind::HexSquare);
    }

    #[test]
    fn file_is_the_lowest_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            format!("[executor]\noperator_address = \"{OPERATOR}\"\naggregator_url = \"http://a:1\"\n"),
        )
        .unwrap();

        let cli = parse(&[
            "--config",
            path.to_str().unwrap(),
            "executor",
            "--aggregator-url",
            "http://b:2",
        ]);
        let config = cli.resolve_config_with_env(no_env()).unwrap();
        assert_eq!(config.executor.operator_address.as_deref(), Some(OPERATOR));
        assert_eq!(config.executor.aggregator_url.as_deref(), Some("http://b:2"));
    }

    #[test]
    fn executor_requires_aggregator() {
        let cli = parse(&["executor", "--operator-address", OPERATOR]);
        let config = cli.resolve_config_with_env(no_env()).unwrap();
        let err = build(&cli.command, &config, CancellationToken::new()).unwrap_err();
        assert!(err.to_string().contains("aggregator_url"), "{err}");
    }

    #[test]
    fn rejects_unknown_worker() {
        assert!(Cli::try_parse_from(["hourglass-node", "performer", "--worker", "cube"]).is_err());
    }

    #[tokio::test]
    async fn performer_runs_until_cancelled() {
        let cli = parse(&["performer", "--http-port", "0", "--rpc-port", "0"]);
        let config = cli.resolve_config_with_env(no_env()).unwrap();
        let shutdown = CancellationToken::new();
        let node = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { run_with_config(&cli.command, &config, shutdown).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!node.is_finished());
        shutdown.cancel();
        node.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port().to_string();
        let cli = parse(&["compute", "--http-port", &port]);
        let config = cli.resolve_config_with_env(no_env()).unwrap();
        let err = run_with_config(&cli.command, &config, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("compute"), "{err}");
    }
}
