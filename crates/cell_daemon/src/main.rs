mod network;
mod routes;
mod state;
mod tick_loop;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cell_core::{Color, EventLevel, MatchMode};
use cell_world::{build_initial_state, load_content, match_rng, setup_for_mode};
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;

use crate::network::NetworkLink;
use crate::state::{AppState, SimState};
use crate::transport::{TcpTransport, Transport};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Play green against the AI planner.
    Single,
    /// Hot-seat: both sides share this daemon and alternate turns.
    Local,
    /// Wait for a peer on `--peer` and play green.
    Host,
    /// Connect to a hosting peer at `--peer` and play red.
    Join,
}

#[derive(Parser)]
#[command(name = "cell_daemon", about = "Cell Expansion War match server")]
struct Cli {
    #[arg(long, value_enum, default_value = "single")]
    mode: ModeArg,
    #[arg(long, default_value = "Level 1")]
    level: String,
    /// Peer address: bind address when hosting, host address when joining.
    #[arg(long, default_value = "127.0.0.1:7878")]
    peer: String,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "./content")]
    content_dir: String,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Defaults to real time as set by the content's tick length.
    #[arg(long)]
    ticks_per_sec: Option<f64>,
    #[arg(long)]
    max_ticks: Option<u64>,
    #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
    event_level: String,
    /// Write the match history here when the match ends.
    #[arg(long)]
    history_out: Option<PathBuf>,
}

/// Opens the peer link for host and join modes. A failed bind, accept or
/// connect is logged and yields `None`; the match then runs locally.
async fn connect_peer(mode: ModeArg, peer: &str) -> Option<Arc<dyn Transport>> {
    let peer = peer.to_string();
    let attempt = match mode {
        ModeArg::Single | ModeArg::Local => return None,
        ModeArg::Host => {
            tracing::info!("waiting for a peer on {peer}");
            tokio::task::spawn_blocking(move || TcpTransport::host(peer)).await
        }
        ModeArg::Join => {
            tracing::info!("joining {peer}");
            tokio::task::spawn_blocking(move || TcpTransport::join(peer)).await
        }
    };
    let transport = match attempt {
        Ok(Ok(transport)) => transport,
        Ok(Err(err)) => {
            tracing::warn!("connecting to peer failed: {err}");
            return None;
        }
        Err(err) => {
            tracing::warn!("peer connection task failed: {err}");
            return None;
        }
    };
    tracing::info!("peer connected: {}", transport.peer());
    let transport: Arc<dyn Transport> = Arc::new(transport);
    Some(transport)
}

/// Networked play without a peer falls back to hot-seat on this machine.
fn fallback_mode(requested: MatchMode, peer_connected: bool) -> MatchMode {
    match requested {
        MatchMode::Networked { .. } if !peer_connected => {
            tracing::warn!("no peer, starting a local two-player match");
            MatchMode::LocalTwoPlayer
        }
        other => other,
    }
}

fn match_mode(mode: ModeArg) -> MatchMode {
    match mode {
        ModeArg::Single => MatchMode::Single,
        ModeArg::Local => MatchMode::LocalTwoPlayer,
        ModeArg::Host => MatchMode::Networked {
            local: Color::Green,
        },
        ModeArg::Join => MatchMode::Networked { local: Color::Red },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let content = load_content(&cli.content_dir)?;
    let level = content
        .level(&cli.level)
        .with_context(|| format!("unknown level {:?}", cli.level))?
        .clone();
    let seed = cli.seed.unwrap_or_else(rand::random);
    let transport = connect_peer(cli.mode, &cli.peer).await;
    let mode = fallback_mode(match_mode(cli.mode), transport.is_some());

    let match_state = build_initial_state(
        &content,
        &level,
        setup_for_mode(mode),
        seed,
        &mut match_rng(seed),
    );
    let ticks_per_sec = cli
        .ticks_per_sec
        .unwrap_or(1000.0 / content.constants.tick_ms as f64);

    let mut sim = SimState::new(match_state, content);
    sim.event_level = if cli.event_level == "debug" {
        EventLevel::Debug
    } else {
        EventLevel::Normal
    };
    sim.history_out = cli.history_out;
    if let (Some(transport), MatchMode::Networked { local }) = (transport, mode) {
        sim.network = Some(NetworkLink::spawn(transport, local));
    }

    tracing::info!(
        level = %level.name,
        ?mode,
        seed,
        ticks_per_sec,
        "match ready"
    );

    let (event_tx, _) = tokio::sync::broadcast::channel(256);
    let app_state = AppState {
        sim: Arc::new(Mutex::new(sim)),
        event_tx: event_tx.clone(),
        ticks_per_sec,
    };

    let router = routes::make_router_with_cors(app_state.clone(), &cli.cors_origin)?;
    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");

    tokio::spawn(tick_loop::run_tick_loop(
        app_state.sim.clone(),
        event_tx,
        ticks_per_sec,
        cli.max_ticks,
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving http")?;

    if let Some(mut link) = app_state.sim.lock().network.take() {
        link.shutdown();
    }
    Ok(())
}
