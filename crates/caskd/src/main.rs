use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cask_store::factory::{AesOptions, Config, EcdheOptions, GzipOptions, RemoteOptions};

/// Storage daemon exposing a cask pipeline over HTTP.
#[derive(Debug, Parser)]
#[command(name = "caskd", version, about)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Backend pipeline URI, e.g. file:///usr/share/caskd or
    /// gzip+aes+file:///srv/data or cache://memory://,file:///srv/data
    #[arg(long, default_value = "file:///usr/share/caskd")]
    backend: String,

    /// Compression level for a gzip stage (0-9)
    #[arg(long)]
    gzip_level: Option<u32>,

    /// Passphrase for an aes stage
    #[arg(long)]
    aes_key: Option<String>,

    /// Path to a PEM public key for an ecdhe stage
    #[arg(long)]
    ecdhe_pubkey: Option<PathBuf>,

    /// Path to a PEM private key for an ecdhe stage
    #[arg(long)]
    ecdhe_privkey: Option<PathBuf>,

    /// Bearer token for storaged/sstoraged backends
    #[arg(long)]
    token: Option<String>,

    /// Log filter, e.g. "info" or "caskd=debug,cask_store=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::default();
    if let Some(level) = args.gzip_level {
        config.gzip = Some(GzipOptions { level });
    }
    if let Some(passphrase) = &args.aes_key {
        config.aes = Some(AesOptions {
            passphrase: passphrase.clone(),
        });
    }
    if args.ecdhe_pubkey.is_some() || args.ecdhe_privkey.is_some() {
        let read_pem = |path: &PathBuf| {
            std::fs::read_to_string(path)
                .with_context(|| format!("reading key file {}", path.display()))
        };
        config.ecdhe = Some(EcdheOptions {
            public_pem: args.ecdhe_pubkey.as_ref().map(read_pem).transpose()?,
            private_pem: args.ecdhe_privkey.as_ref().map(read_pem).transpose()?,
        });
    }
    if let Some(token) = &args.token {
        config.remote = Some(RemoteOptions {
            token: Some(token.clone()),
        });
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let config = build_config(&args)?;
    let store = cask_store::factory::open(&args.backend, &config)
        .await
        .with_context(|| format!("opening backend {}", args.backend))?;
    info!(backend = args.backend, "storage pipeline ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    cask_service::run(args.listen, Arc::from(store), shutdown_rx)
        .await
        .context("serving")?;
    Ok(())
}
