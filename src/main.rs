use std::env;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;
use whale_core::STARTING_FEN;
use whale_engine::{Engine, EngineOptions};

const DEFAULT_MOVETIME_MS: u64 = 1000;

/// Usage: `whale [FEN] [MOVETIME_MS] [NETWORK]`.
///
/// Thread count and hash size come from `WHALE_THREADS` and `WHALE_HASH_MB`.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let fen = args.next().unwrap_or_else(|| STARTING_FEN.to_string());
    let movetime = match args.next() {
        Some(ms) => ms.parse().with_context(|| format!("invalid movetime `{ms}`"))?,
        None => DEFAULT_MOVETIME_MS,
    };
    let network_path = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        bail!("unexpected argument `{extra}`");
    }

    let mut options = EngineOptions {
        allow_nnue: network_path.is_some(),
        network_path,
        ..EngineOptions::default()
    };
    if let Some(threads) = env_usize("WHALE_THREADS")? {
        options.threads = threads;
    }
    if let Some(hash_mb) = env_usize("WHALE_HASH_MB")? {
        options.hash_mb = hash_mb;
    }

    let (tx, rx) = mpsc::channel();
    let mut engine = Engine::new(options, move |uci| {
        let _ = tx.send(uci);
    })?;
    engine.set_position(&fen)?;
    info!(fen = %fen, movetime, "thinking");
    println!("{}", engine.board_diagram());

    engine.think_timed(Duration::from_millis(movetime))?;
    let best = rx.recv().context("search thread stopped without a move")?;
    println!("bestmove {best}");

    engine.quit();
    Ok(())
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a number, got `{value}`")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).context(name.to_string()),
    }
}
