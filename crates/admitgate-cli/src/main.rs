#![deny(unsafe_code)]

//! admitgate CLI: loads configuration and runs the admission gateway.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use admitgate_config::{Config, Protocol, Secret};
use admitgate_core::Gateway;
use admitgate_core::build_info;

/// admitgate: admission control gateway for relay and mesh peers.
#[derive(Parser, Debug)]
#[command(name = "admitgate", version = build_info::LONG_VERSION, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file. Created with defaults if missing.
    #[arg(short, long, default_value = "./config.json")]
    config: PathBuf,

    /// Address to listen on (`host:port` or `:port`).
    #[arg(long)]
    listen_addr: Option<String>,

    /// Path of the control daemon socket.
    #[arg(long)]
    socket_addr: Option<String>,

    /// Shared secret required by the direct protocol.
    #[arg(long)]
    secret_key: Option<String>,

    /// Admission protocol to serve (`direct` or `callback`).
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Deadline for each trust source query, in milliseconds.
    #[arg(long)]
    upstream_timeout_ms: Option<u64>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Overlay flags onto values read from the config file.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(addr) = &self.listen_addr {
            config.listen_addr = addr.clone();
        }
        if let Some(socket) = &self.socket_addr {
            config.unix_sock_addr = socket.clone();
        }
        if let Some(secret) = &self.secret_key {
            config.secret_key = Some(Secret::new(secret.as_str()));
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(ms) = self.upstream_timeout_ms {
            config.upstream_timeout_ms = ms;
        }
    }

    /// Filter directive from `-v`, if given.
    fn verbosity_filter(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config file may carry the log level, so start at `info` and reload
    // once it has been read.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let explicit = env_filter.is_some() || cli.verbose > 0;
    let initial = env_filter
        .unwrap_or_else(|| EnvFilter::new(cli.verbosity_filter().unwrap_or("info")));
    let (filter, filter_handle) = reload::Layer::<_, Registry>::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let mut config = Config::load_or_create(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    if !explicit {
        let level = EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid logLevel {:?}", config.log_level))?;
        filter_handle
            .reload(level)
            .context("failed to apply logLevel")?;
    }

    info!(
        config = %cli.config.display(),
        protocol = %config.protocol,
        listen_addr = %config.listen_addr,
        "Configuration loaded"
    );

    let gateway = Gateway::new(config)?;
    gateway.run().await?;
    Ok(())
}
