mod alerts;
mod routes;
mod state;
mod tick_loop;

use anyhow::{Context, Result};
use clap::Parser;
use ops_control::OperatorMode;
use state::{AppState, DashboardSim};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "ops_daemon", about = "Ops dashboard simulation server")]
struct Cli {
    /// Seed for the load sampler and roster drift. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "./content")]
    content_dir: String,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Milliseconds between simulation ticks.
    #[arg(long, default_value_t = 2000)]
    tick_ms: u64,
    /// Milliseconds between wall-clock refreshes.
    #[arg(long, default_value_t = 1000)]
    clock_ms: u64,
    #[arg(long, default_value = "none", value_parser = ["none", "auto"])]
    operator: String,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Stop ticking after this many ticks; the server keeps answering.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Start with the tick loop paused.
    #[arg(long)]
    paused: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ops_daemon=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    if cli.tick_ms == 0 || cli.clock_ms == 0 {
        anyhow::bail!("--tick-ms and --clock-ms must be positive");
    }
    let operator_mode = OperatorMode::from_name(&cli.operator)
        .with_context(|| format!("unknown operator mode: {}", cli.operator))?;
    let cors_origin: axum::http::HeaderValue = cli
        .cors_origin
        .parse()
        .with_context(|| format!("invalid --cors-origin: {}", cli.cors_origin))?;

    let content = ops_world::load_content(&cli.content_dir)?;
    let seed = cli.seed.unwrap_or_else(rand::random);
    let (state, rng) = ops_world::new_run(&content, seed)?;
    tracing::info!(
        seed,
        content_version = %content.content_version,
        staff = state.staff.len(),
        assets = state.assets.len(),
        "dashboard initialised"
    );

    let (frame_tx, _) = broadcast::channel(256);
    let app_state = AppState {
        sim: Arc::new(parking_lot::Mutex::new(DashboardSim::new(
            state,
            content,
            rng,
            operator_mode,
        ))),
        frame_tx,
        paused: Arc::new(AtomicBool::new(cli.paused)),
        tick_period: Duration::from_millis(cli.tick_ms),
    };

    tokio::spawn(tick_loop::run_tick_loop(app_state.clone(), cli.max_ticks));
    tokio::spawn(tick_loop::run_clock_loop(
        app_state.clone(),
        Duration::from_millis(cli.clock_ms),
    ));

    let router = routes::make_router_with_cors(app_state, cors_origin);
    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("ops_daemon listening on http://{addr}");
    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
