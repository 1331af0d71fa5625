// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Foreground server
//!
//! Loads configuration, optionally installs the Prometheus exporter, and runs
//! the gateway until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

use nfs4d_core::application::NfsGatewayService;
use nfs4d_core::domain::server_config::ServerConfig;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listener address (overrides configuration)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Prometheus exporter address (overrides configuration)
    #[arg(long, value_name = "ADDR")]
    pub metrics: Option<String>,
}

pub async fn run(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(&args, config_path)?;

    if let Some(address) = &config.metrics_address {
        install_metrics(address)?;
    }

    if config.exports.is_empty() {
        println!(
            "{}",
            "WARNING: Started with NO exports configured.".yellow().bold()
        );
        println!("         Clients will only see an empty pseudo filesystem.");
    }

    let gateway =
        NfsGatewayService::from_config(&config).context("Failed to initialize NFS server")?;
    let addr = gateway
        .start_server()
        .await
        .context("Failed to start NFS server")?;

    info!(
        "nfs4d listening on {} ({} exports)",
        addr,
        config.exports.len()
    );

    shutdown_signal().await;

    gateway
        .stop_server()
        .await
        .context("Failed to stop NFS server")?;
    info!("nfs4d shut down");

    Ok(())
}

/// Configuration with command-line overrides applied, validated
pub fn load_config(args: &ServeArgs, config_path: Option<PathBuf>) -> Result<ServerConfig> {
    let mut config =
        ServerConfig::load_or_default(config_path).context("Failed to load configuration")?;

    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(metrics) = &args.metrics {
        config.metrics_address = Some(metrics.clone());
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn install_metrics(address: &str) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid metrics address {}", address))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Prometheus metrics exported on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
