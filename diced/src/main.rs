//! diced - dice rolling server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use diced::rpc::{self, RpcHandler};
use diced::service::DiceService;
use diced::{Config, LogFormat, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dice rolling server for tabletop RPG agents
#[derive(Parser, Debug)]
#[command(name = "diced", version, about)]
struct Args {
    /// Serve JSON-RPC over stdin/stdout (the default)
    #[arg(long, conflicts_with = "http")]
    stdio: bool,

    /// Serve over HTTP instead of stdio
    #[arg(long)]
    http: bool,

    /// HTTP listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level for diced (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Seed for reproducible rolls
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

/// Logs always go to stderr; in stdio mode stdout is the protocol channel.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("diced={},tower_http=info", config.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);

    init_tracing(&config);

    if args.http && !args.stdio {
        let server = Arc::new(Server::new(config));
        let signal_server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_server.shutdown();
            }
        });
        server.run().await?;
    } else {
        let handler = RpcHandler::new(Arc::new(DiceService::new(config.seed)));
        rpc::stdio::run(&handler).await?;
    }

    Ok(())
}
