// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian Vault Node
//!
//! Entry point for the `meridian-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the vault, and serves the
//! HTTP/WS API until told to stop.
//!
//! The binary supports four subcommands:
//!
//! - `run`    : start the node
//! - `init`   : write a default configuration file
//! - `status` : query a running node's status endpoint
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;
mod snapshot;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use meridian_contracts::{Vault, VaultService};
use meridian_protocol::clock::SystemClock;

use cli::{Commands, MeridianNodeCli};
use config::NodeConfig;
use logging::LogFormat;
use metrics::NodeMetrics;
use snapshot::Snapshot;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeridianNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds the vault from the snapshot if one exists, otherwise from the
/// genesis sections of the configuration.
fn open_vault(config: &NodeConfig, state_path: &std::path::Path) -> Result<api::NodeVault> {
    let permissions = Arc::new(config.role_table());
    let clock = Arc::new(SystemClock);

    match Snapshot::load(state_path)? {
        Some(snapshot) => {
            tracing::info!(path = %state_path.display(), "restoring vault from snapshot");
            Ok(Vault::from_state(snapshot.state, snapshot.ledger, permissions, clock))
        }
        None => {
            tracing::info!(signers = config.signers.len(), "no snapshot found, starting from genesis");
            let vault = Vault::new(
                &config.vault,
                config.signers.clone(),
                config.genesis_ledger()?,
                permissions,
                clock,
            )
            .context("failed to create vault from configuration")?;
            Ok(vault)
        }
    }
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVE, args.log_format);

    let config_path = args.config_path();
    let state_path = args.state_path();
    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        config = %config_path.display(),
        state = %state_path.display(),
        "starting meridian-node"
    );

    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        tracing::warn!(path = %config_path.display(), "config file not found, using devnet defaults");
        NodeConfig::default()
    };

    // --- Vault ---
    let vault = open_vault(&config, &state_path)?;
    let service = Arc::new(VaultService::new(vault));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: Arc::clone(&service),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    // --- Persist ---
    let vault = service.snapshot();
    Snapshot::capture(&vault).save(&state_path)?;
    tracing::info!(
        path = %state_path.display(),
        version = service.version(),
        "vault state saved, meridian-node stopped"
    );
    Ok(())
}

/// Writes a default configuration file into the data directory.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("meridian_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join("config.toml");
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }

    let config = NodeConfig::default();
    config.save(&config_path)?;
    tracing::info!(path = %config_path.display(), "default configuration written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config file    : {}", config_path.display());
    println!("  Signers        : {}", config.signers.len());
    println!("  Admins         : {}", config.roles.admins.len());

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Splits an `http://` URL into host, port and request target.
fn split_url(raw: &str) -> Result<(String, u16, String)> {
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid URL {}", raw))?;
    if parsed.scheme() != "http" {
        anyhow::bail!("only http:// URLs are supported: {}", raw);
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing host in URL {}", raw))?;
    let port = parsed.port_or_known_default().unwrap_or(80);
    let target = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };
    Ok((host.to_string(), port, target))
}

/// Plain HTTP/1.1 GET over a tokio TCP stream; returns the response body.
async fn http_get(url: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (host, port, path) = split_url(url)?;
    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());
    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("meridian-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc         {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_parts() {
        let (host, port, path) = split_url("http://127.0.0.1:9841/status").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 9841);
        assert_eq!(path, "/status");

        let (_, port, path) = split_url("http://localhost").unwrap();
        assert_eq!(port, 80);
        assert_eq!(path, "/");

        let (host, port, path) = split_url("HTTP://LocalHost:9841/withdrawals?owner=0x01").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 9841);
        assert_eq!(path, "/withdrawals?owner=0x01");

        let (host, port, path) = split_url("http://[::1]/status").unwrap();
        assert_eq!(host, "[::1]");
        assert_eq!(port, 80);
        assert_eq!(path, "/status");

        assert!(split_url("https://example.com/").is_err());
        assert!(split_url("http://:80/").is_err());
    }

    #[test]
    fn genesis_then_snapshot_restore() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let config = NodeConfig::default();

        let vault = open_vault(&config, &state_path).unwrap();
        assert_eq!(vault.governance().signers().len(), 3);
        Snapshot::capture(&vault).save(&state_path).unwrap();

        let restored = open_vault(&config, &state_path).unwrap();
        assert_eq!(restored.export_state(), vault.export_state());
    }
}
