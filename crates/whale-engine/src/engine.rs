//! Engine front: game position, search thread and think timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use whale_core::{Move, Position};

use crate::error::EngineError;
use crate::eval::nnue::{self, Network};
use crate::options::{EngineOption, EngineOptions};
use crate::search::{SearchLimits, Searcher};
use crate::time::choose_think_time;

const SEARCH_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Callback receiving the chosen move in UCI notation (`0000` for none).
pub type MoveChosenCallback = Box<dyn FnMut(String) + Send>;

/// Requests drained by the search thread.
enum Command {
    Search(Position),
    NewGame,
    SetOption(EngineOption),
    Quit,
}

/// Think ids and the abort flag under one lock.
///
/// Starting a think and a timer firing both take the lock, so a timer left
/// over from an earlier think cannot abort a newer one.
#[derive(Debug)]
struct ThinkGate {
    current: Mutex<u64>,
    abort: Arc<AtomicBool>,
}

impl ThinkGate {
    fn new(abort: Arc<AtomicBool>) -> Self {
        Self {
            current: Mutex::new(0),
            abort,
        }
    }

    /// Clear the abort flag and return the id of the new think.
    fn begin(&self) -> u64 {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        self.abort.store(false, Ordering::Release);
        *current
    }

    /// Abort the search if think `id` is still the latest one.
    fn expire(&self, id: u64) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != id {
            return false;
        }
        self.abort.store(true, Ordering::Release);
        true
    }
}

/// A playing engine.
///
/// A long-running search thread owns the [`Searcher`] and handles one
/// command at a time, so option changes and new-game resets requested
/// during a search apply once it has finished.
pub struct Engine {
    position: Position,
    options: EngineOptions,
    tx: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
    abort: Arc<AtomicBool>,
    thinking: Arc<AtomicBool>,
    gate: Arc<ThinkGate>,
}

impl Engine {
    /// Start the engine. `on_move_chosen` runs on the search thread.
    pub fn new(
        options: EngineOptions,
        on_move_chosen: impl FnMut(String) + Send + 'static,
    ) -> Result<Self, EngineError> {
        let network = options.network_path.as_deref().and_then(|path| {
            match nnue::load(path) {
                Ok(net) => Some(Arc::new(net)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "network rejected");
                    None
                }
            }
        });
        Self::with_network(options, network, on_move_chosen)
    }

    /// Start the engine with an already loaded network.
    pub fn with_network(
        options: EngineOptions,
        network: Option<Arc<Network>>,
        on_move_chosen: impl FnMut(String) + Send + 'static,
    ) -> Result<Self, EngineError> {
        let mut options = options.clamped();
        let mut searcher = Searcher::from_options(&options, network);
        options.allow_nnue = searcher.allow_nnue();

        let abort = searcher.stop_handle();
        let thinking = Arc::new(AtomicBool::new(false));

        let mut on_move_chosen: MoveChosenCallback = Box::new(on_move_chosen);
        let done = Arc::clone(&thinking);
        searcher.set_on_search_complete(move |mv: Move| {
            done.store(false, Ordering::Release);
            let uci = if mv.is_null() { "0000".to_string() } else { mv.to_uci() };
            on_move_chosen(uci);
        });

        let (tx, rx) = mpsc::channel::<Command>();
        let handle = thread::Builder::new()
            .name("whale-search".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || search_thread(searcher, rx))
            .map_err(EngineError::SpawnFailed)?;

        info!(
            threads = options.threads,
            hash_mb = options.hash_mb,
            nnue = options.allow_nnue,
            "engine started"
        );

        Ok(Self {
            position: Position::startpos(),
            options,
            tx,
            handle: Some(handle),
            gate: Arc::new(ThinkGate::new(Arc::clone(&abort))),
            abort,
            thinking,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Clear the table and ordering history before the next search.
    pub fn notify_new_game(&mut self) -> Result<(), EngineError> {
        self.send(Command::NewGame)
    }

    pub fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.position = Position::from_fen(fen)?;
        Ok(())
    }

    /// Play `uci_move` on the current position.
    pub fn make_move(&mut self, uci_move: &str) -> Result<(), EngineError> {
        let mv = self.position.parse_uci_move(uci_move)?;
        self.position.make_move(mv);
        Ok(())
    }

    /// `SetOption(index, value)`: 0 = hash size, 1 = threads, 2 = allow NNUE.
    pub fn set_option(&mut self, index: u32, value: i64) -> Result<(), EngineError> {
        let Some(option) = EngineOption::from_index(index, value) else {
            warn!(index, value, "unknown option");
            return Ok(());
        };
        debug!(?option, "setting option");
        self.options.apply(option);
        self.send(Command::SetOption(option))
    }

    /// Think time for the side to move under the given clock.
    pub fn choose_think_time(
        &self,
        wtime: Duration,
        btime: Duration,
        winc: Duration,
        binc: Duration,
    ) -> Duration {
        choose_think_time(
            self.position.white_to_move(),
            wtime,
            btime,
            winc,
            binc,
            self.options.max_think_time,
        )
    }

    /// Search the current position for `think_time`, then report the move.
    pub fn think_timed(&mut self, think_time: Duration) -> Result<(), EngineError> {
        self.start_thinking(Some(think_time))
    }

    /// Search until [`stop_thinking`](Engine::stop_thinking).
    pub fn think_infinite(&mut self) -> Result<(), EngineError> {
        self.start_thinking(None)
    }

    pub fn stop_thinking(&self) {
        if self.is_thinking() {
            self.abort.store(true, Ordering::Release);
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking.load(Ordering::Acquire)
    }

    pub fn board_diagram(&self) -> String {
        self.position.diagram()
    }

    /// Abort any search and stop the search thread.
    pub fn quit(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.abort.store(true, Ordering::Release);
        let _ = self.tx.send(Command::Quit);
        if handle.join().is_err() {
            warn!("search thread panicked");
        }
        info!("engine stopped");
    }

    fn start_thinking(&mut self, think_time: Option<Duration>) -> Result<(), EngineError> {
        if self.is_thinking() {
            warn!("think requested while already thinking");
            return Ok(());
        }

        let id = self.gate.begin();
        self.thinking.store(true, Ordering::Release);
        if let Err(e) = self.send(Command::Search(self.position.clone())) {
            self.thinking.store(false, Ordering::Release);
            return Err(e);
        }
        debug!(id, ?think_time, "thinking");

        if let Some(think_time) = think_time {
            let gate = Arc::clone(&self.gate);
            let timer = thread::Builder::new()
                .name("whale-timer".to_string())
                .spawn(move || {
                    thread::sleep(think_time);
                    if gate.expire(id) {
                        debug!(id, "think time elapsed");
                    }
                });
            if let Err(e) = timer {
                self.abort.store(true, Ordering::Release);
                return Err(EngineError::SpawnFailed(e));
            }
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx.send(command).map_err(|_| EngineError::SearchThreadGone)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.quit();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("fen", &self.position.fen())
            .field("options", &self.options)
            .field("thinking", &self.is_thinking())
            .finish()
    }
}

fn search_thread(mut searcher: Searcher, rx: mpsc::Receiver<Command>) {
    for command in rx {
        match command {
            Command::Search(position) => {
                let outcome = searcher.start_search_with(&position, SearchLimits::default(), |_| {});
                debug!(
                    best_move = %outcome.best_move,
                    eval = outcome.eval,
                    depth = outcome.depth,
                    status = ?outcome.status,
                    "search finished"
                );
            }
            Command::NewGame => searcher.clear_for_new_position(),
            Command::SetOption(EngineOption::HashSize(mb)) => searcher.resize_transposition_table(mb),
            Command::SetOption(EngineOption::Threads(n)) => {
                searcher.set_thread_count(n);
            }
            Command::SetOption(EngineOption::AllowNnue(allow)) => {
                searcher.set_allow_nnue(allow);
            }
            Command::Quit => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineOptions::default(), |_| {}).unwrap()
    }

    #[test]
    fn set_position_rejects_bad_fen() {
        let mut engine = engine();
        assert!(matches!(
            engine.set_position("not a fen"),
            Err(EngineError::Position(_))
        ));
    }

    #[test]
    fn make_move_updates_the_position() {
        let mut engine = engine();
        engine.make_move("e2e4").unwrap();
        assert!(!engine.position().white_to_move());
        assert!(engine.make_move("e2e4").is_err());
    }

    #[test]
    fn unknown_option_is_ignored() {
        let mut engine = engine();
        engine.set_option(42, 1).unwrap();
        engine.set_option(1, 1000).unwrap();
        assert_eq!(engine.options().threads, 128);
    }

    #[test]
    fn stale_timer_cannot_abort_a_newer_think() {
        let abort = Arc::new(AtomicBool::new(true));
        let gate = ThinkGate::new(Arc::clone(&abort));
        let first = gate.begin();
        assert!(!abort.load(Ordering::Acquire));
        let second = gate.begin();

        assert!(!gate.expire(first));
        assert!(!abort.load(Ordering::Acquire));
        assert!(gate.expire(second));
        assert!(abort.load(Ordering::Acquire));
    }

    #[test]
    fn quit_is_idempotent() {
        let mut engine = engine();
        engine.quit();
        engine.quit();
        assert!(matches!(engine.notify_new_game(), Err(EngineError::SearchThreadGone)));
    }
}
