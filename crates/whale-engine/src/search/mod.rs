//! Search: Lazy SMP iterative deepening over a shared transposition table.

pub mod control;
pub mod heuristics;
pub mod negamax;
pub mod ordering;
pub mod pool;
pub mod repetition;
pub mod tt;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use whale_core::{BoardStatus, Move, Position, generate_moves};

use crate::eval::nnue::Network;
use crate::eval::nnue::simd::avx2_supported;
use crate::eval::{Evaluation, NnueBlend};
use crate::options::{EngineOptions, clamp_threads};

use control::SearchControl;
use negamax::{IMMEDIATE_MATE_SCORE, MAX_DEPTH, SearchDiagnostics, Worker};
use pool::{SearchInfo, run_lazy_smp};
use tt::TranspositionTable;

/// Callback fired with the chosen move at the end of every search.
pub type SearchCompleteCallback = Box<dyn FnMut(Move) + Send>;

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Worker 0 ran out of depth or found a mate.
    Completed,
    /// The abort flag was raised before worker 0 finished.
    Aborted,
    /// The side to move is checkmated; there is no move.
    Checkmated,
    /// The side to move is stalemated; there is no move.
    Stalemate,
}

/// Limits of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Deepest iteration, clamped to `1..=MAX_DEPTH`.
    pub max_depth: i32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { max_depth: MAX_DEPTH }
    }
}

impl SearchLimits {
    pub fn depth(max_depth: i32) -> Self {
        Self { max_depth }
    }
}

/// Result of a search, taken from worker 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Best move, or [`Move::NULL`] when the root has no legal move.
    pub best_move: Move,
    /// Score in centipawns from the side to move's perspective.
    pub eval: i32,
    /// Deepest completed iteration.
    pub depth: i32,
    pub pv: Vec<Move>,
    /// Nodes searched by all workers.
    pub nodes: u64,
    pub status: SearchStatus,
}

/// Multithreaded searcher.
///
/// Owns the transposition table and one [`Worker`] per thread. Searches
/// are cancelled through the shared abort flag, which this type never
/// clears on its own: call [`reset_abort`](Searcher::reset_abort) before
/// starting a search after [`end_search`](Searcher::end_search).
pub struct Searcher {
    tt: TranspositionTable,
    workers: Vec<Worker>,
    abort: Arc<AtomicBool>,
    allow_nnue: bool,
    network: Option<Arc<Network>>,
    blend: NnueBlend,
    on_search_complete: Option<SearchCompleteCallback>,
}

impl Searcher {
    /// Create a searcher and run a depth 1 warm-up search.
    pub fn new(threads: usize, hash_mb: usize) -> Self {
        let mut searcher = Self {
            tt: TranspositionTable::new(hash_mb),
            workers: Vec::new(),
            abort: Arc::new(AtomicBool::new(false)),
            allow_nnue: false,
            network: None,
            blend: NnueBlend::default(),
            on_search_complete: None,
        };
        searcher.set_thread_count(threads);
        searcher.warm_up();
        searcher
    }

    /// Create a searcher from `options`, using `network` when NNUE is
    /// allowed and supported.
    pub fn from_options(options: &EngineOptions, network: Option<Arc<Network>>) -> Self {
        let mut searcher = Self::new(options.threads, options.hash_mb);
        searcher.set_network(network, options.nnue_blend);
        searcher.set_allow_nnue(options.allow_nnue);
        searcher
    }

    fn warm_up(&mut self) {
        let root = Position::startpos();
        let _ = self.run(&root, SearchLimits::depth(1), &mut |_| {});
        self.tt.clear();
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Set the number of workers, clamped to 1..=128. Returns the count used.
    pub fn set_thread_count(&mut self, threads: usize) -> usize {
        let threads = clamp_threads(threads);
        if threads != self.workers.len() {
            debug!(threads, "setting thread count");
            self.workers.truncate(threads);
            while self.workers.len() < threads {
                let id = self.workers.len();
                self.workers.push(Worker::new(id, self.evaluation()));
            }
        }
        threads
    }

    pub fn hash_size_mb(&self) -> usize {
        self.tt.size_mb()
    }

    /// Reallocate the transposition table. Only possible between searches.
    pub fn resize_transposition_table(&mut self, mb: usize) {
        debug!(mb, "resizing transposition table");
        self.tt.resize(mb);
    }

    pub fn transposition_table(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Clear the table, killers and history, and reset the table age.
    pub fn clear_for_new_position(&mut self) {
        self.tt.clear();
        for worker in &mut self.workers {
            worker.clear_heuristics();
        }
    }

    /// Network used when NNUE is allowed.
    pub fn set_network(&mut self, network: Option<Arc<Network>>, blend: NnueBlend) {
        self.network = network;
        self.blend = blend;
        if self.network.is_none() {
            self.allow_nnue = false;
        }
        self.sync_evaluation();
    }

    /// Enable or disable NNUE. Stays off without AVX2 or without a
    /// network; returns the value in effect.
    pub fn set_allow_nnue(&mut self, allow: bool) -> bool {
        let mut effective = allow;
        if allow && !avx2_supported() {
            warn!("NNUE requested but the CPU lacks AVX2; using the classical evaluation");
            effective = false;
        } else if allow && self.network.is_none() {
            warn!("NNUE requested but no network is loaded; using the classical evaluation");
            effective = false;
        }
        debug!(allow_nnue = effective, "setting NNUE");
        self.allow_nnue = effective;
        self.sync_evaluation();
        effective
    }

    pub fn allow_nnue(&self) -> bool {
        self.allow_nnue
    }

    fn evaluation(&self) -> Evaluation {
        match (&self.network, self.allow_nnue) {
            (Some(net), true) => Evaluation::with_network(Arc::clone(net), self.blend),
            _ => Evaluation::classical(),
        }
    }

    fn sync_evaluation(&mut self) {
        let network = if self.allow_nnue { self.network.clone() } else { None };
        for worker in &mut self.workers {
            worker.evaluation_mut().set_network(network.clone(), self.blend);
        }
    }

    /// Register the callback fired once at the end of every search.
    pub fn set_on_search_complete(&mut self, callback: impl FnMut(Move) + Send + 'static) {
        self.on_search_complete = Some(Box::new(callback));
    }

    /// Handle to the abort flag, for stopping a search from another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Ask the running search to stop.
    pub fn end_search(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub fn reset_abort(&self) {
        self.abort.store(false, Ordering::Release);
    }

    /// Diagnostics of worker 0 for the last search.
    pub fn diagnostics(&self) -> SearchDiagnostics {
        self.workers
            .first()
            .map(|worker| worker.diagnostics().clone())
            .unwrap_or_default()
    }

    /// Search `root` until aborted or a mate is proven.
    pub fn start_search(&mut self, root: &Position) -> SearchOutcome {
        self.start_search_with(root, SearchLimits::default(), |_| {})
    }

    /// Search `root` within `limits`, reporting each iteration of worker 0.
    pub fn start_search_with(
        &mut self,
        root: &Position,
        limits: SearchLimits,
        mut on_iteration: impl FnMut(&SearchInfo),
    ) -> SearchOutcome {
        let outcome = self.run(root, limits, &mut on_iteration);
        if let Some(callback) = self.on_search_complete.as_mut() {
            callback(outcome.best_move);
        }
        outcome
    }

    fn run(
        &mut self,
        root: &Position,
        limits: SearchLimits,
        on_iteration: &mut dyn FnMut(&SearchInfo),
    ) -> SearchOutcome {
        let (status, eval) = match root.status() {
            BoardStatus::Ongoing => (None, 0),
            BoardStatus::Checkmate => (Some(SearchStatus::Checkmated), -IMMEDIATE_MATE_SCORE),
            BoardStatus::Stalemate => (Some(SearchStatus::Stalemate), 0),
        };
        if let Some(status) = status {
            debug!(?status, "no legal move at the root");
            return SearchOutcome {
                best_move: Move::NULL,
                eval,
                depth: 0,
                pv: Vec::new(),
                nodes: 0,
                status,
            };
        }
        let legal = generate_moves(root, false);

        for worker in &mut self.workers {
            worker.prepare(root);
        }
        debug!(
            threads = self.workers.len(),
            nnue = self.allow_nnue,
            max_depth = limits.max_depth,
            "search started"
        );

        let control = SearchControl::new(Arc::clone(&self.abort));
        let max_depth = limits.max_depth.clamp(1, MAX_DEPTH);
        let nodes = run_lazy_smp(&mut self.workers, &self.tt, &control, max_depth, on_iteration);

        let Some(main) = self.workers.first() else {
            return SearchOutcome {
                best_move: legal[0],
                eval: 0,
                depth: 0,
                pv: vec![legal[0]],
                nodes,
                status: SearchStatus::Aborted,
            };
        };
        let status = if control.is_aborted() {
            SearchStatus::Aborted
        } else {
            SearchStatus::Completed
        };

        let mut best_move = main.best_move;
        let mut pv = main.best_line.clone();
        if best_move.is_null() || !legal.contains(best_move) {
            warn!(fen = %root.fen(), "search produced no move; playing the first legal move");
            best_move = legal[0];
            pv = vec![best_move];
        }

        SearchOutcome {
            best_move,
            eval: main.best_eval,
            depth: main.diagnostics().completed_iterations,
            pv,
            nodes,
            status,
        }
    }
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("tt", &self.tt)
            .field("threads", &self.workers.len())
            .field("allow_nnue", &self.allow_nnue)
            .field("blend", &self.blend)
            .finish()
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(1, tt::DEFAULT_HASH_MB)
    }
}
