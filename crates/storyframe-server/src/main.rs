use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storyframe_contracts::config::CascadeConfig;
use storyframe_engine::IllustrationEngine;
use storyframe_server::{build_router, AppState};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "storyframe", version, about = "Illustration cascade service")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8001)]
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = CascadeConfig::from_env();
    tracing::info!(
        providers = ?config
            .providers
            .iter()
            .map(|spec| spec.id.as_str())
            .collect::<Vec<&str>>(),
        "cascade configured"
    );

    // The engine holds blocking HTTP clients, so it is built before
    // the async runtime starts.
    let engine = IllustrationEngine::new(config).context("failed to build engine")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(serve(args, engine))
}

async fn serve(args: Args, engine: IllustrationEngine) -> Result<()> {
    let router = build_router(AppState {
        engine: Arc::new(engine),
    });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "storyframe server started");

    axum::serve(listener, router)
        .await
        .context("server terminated")?;
    Ok(())
}
