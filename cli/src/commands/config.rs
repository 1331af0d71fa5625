// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use nfs4d_core::domain::server_config::ServerConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./nfs4d.yaml)
        #[arg(short, long, default_value = "./nfs4d.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ServerConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. NFS4D_CONFIG_PATH: {}",
            std::env::var("NFS4D_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./nfs4d.yaml");
        println!("  4. ~/.nfs4d/config.yaml");
        println!("  5. /etc/nfs4d/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Server:".bold());
    println!("  Bind address: {}", config.bind_address);
    println!(
        "  Lease lifetime: {}",
        humantime_display(config.lease_lifetime)
    );
    println!(
        "  Metrics: {}",
        config.metrics_address.as_deref().unwrap_or("(disabled)")
    );
    println!();

    println!("{}", "Sessions:".bold());
    println!("  Max operations: {}", config.session.max_operations);
    println!("  Slots: {}", config.session.max_requests);
    println!("  Max request size: {}", config.session.max_request_size);
    println!("  Max response size: {}", config.session.max_response_size);
    println!();

    println!("{}", "Exports:".bold());
    if config.exports.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for export in &config.exports {
        println!(
            "  {} {} → {} ({:?})",
            format!("[{}]", export.export_id).bold(),
            export.pseudo_path,
            export.path,
            export.access
        );
        if export.data_server {
            println!("    Data server: yes");
        }
        for client in &export.clients {
            println!("    {} → {:?}", client.hosts.join(", "), client.access);
        }
    }
    println!();

    Ok(())
}

fn humantime_display(duration: std::time::Duration) -> String {
    humantime_serde::re::humantime::format_duration(duration).to_string()
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ServerConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = sample_config(with_examples);

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}
