//! Lazy SMP: every worker deepens on its own over one shared table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{info, warn};
use whale_core::Move;

use crate::search::control::SearchControl;
use crate::search::negamax::{SearchContext, Worker, is_mate_score, ply_to_mate};
use crate::search::tt::TranspositionTable;

const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Progress of worker 0 after a completed iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInfo {
    pub depth: i32,
    /// Score in centipawns from the side to move's perspective.
    pub score: i32,
    /// Nodes searched by all workers so far.
    pub nodes: u64,
    pub nps: u64,
    pub elapsed_ms: u64,
    pub pv: Vec<Move>,
}

impl SearchInfo {
    /// Signed moves to mate when the score is a mate score.
    pub fn mate_in(&self) -> Option<i32> {
        if !is_mate_score(self.score) {
            return None;
        }
        let moves = (ply_to_mate(self.score) + 1) / 2;
        Some(if self.score > 0 { moves } else { -moves })
    }

    pub fn pv_string(&self) -> String {
        self.pv.iter().map(|mv| mv.to_uci()).collect::<Vec<_>>().join(" ")
    }
}

/// Iteration reporting of worker 0.
struct Progress<'a> {
    start: Instant,
    counters: &'a [AtomicU64],
    on_iteration: &'a mut dyn FnMut(&SearchInfo),
}

impl Progress<'_> {
    fn report(&mut self, depth: i32, score: i32, pv: &[Move]) {
        let nodes: u64 = self.counters.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        let elapsed = self.start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-3)) as u64;
        let info = SearchInfo {
            depth,
            score,
            nodes,
            nps,
            elapsed_ms,
            pv: pv.to_vec(),
        };
        info!(
            depth,
            score,
            nodes,
            nps,
            ms = elapsed_ms,
            pv = %info.pv_string(),
            "iteration complete"
        );
        (self.on_iteration)(&info);
    }
}

/// Run one search over `workers` and return the total node count.
///
/// Worker 0 runs on the calling thread and is the only one whose result
/// counts; the others run in scoped threads and only feed the table.
/// Helpers stop as soon as worker 0 is done.
pub(crate) fn run_lazy_smp(
    workers: &mut [Worker],
    tt: &TranspositionTable,
    control: &SearchControl,
    max_depth: i32,
    on_iteration: &mut dyn FnMut(&SearchInfo),
) -> u64 {
    let Some((main, helpers)) = workers.split_first_mut() else {
        return 0;
    };
    let counters: Vec<AtomicU64> = (0..=helpers.len()).map(|_| AtomicU64::new(0)).collect();
    let ctx = SearchContext { tt, control };

    thread::scope(|s| {
        for (helper, counter) in helpers.iter_mut().zip(&counters[1..]) {
            let id = helper.id();
            let spawned = thread::Builder::new()
                .name(format!("whale-worker-{id}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn_scoped(s, move || {
                    let start_depth = 1 + (id % 2) as i32;
                    run_deepening(helper, &ctx, start_depth, max_depth, counter, None);
                });
            if let Err(e) = spawned {
                warn!(worker = id, error = %e, "failed to spawn search worker");
            }
        }

        let mut progress = Progress {
            start: Instant::now(),
            counters: &counters,
            on_iteration,
        };
        run_deepening(main, &ctx, 1, max_depth, &counters[0], Some(&mut progress));
        control.finish_main();
    });

    counters.iter().map(|c| c.load(Ordering::Relaxed)).sum()
}

/// Line of an iteration cut short: the root PV while it still starts with
/// the move the iteration had settled on.
fn partial_line(worker: &Worker) -> Vec<Move> {
    match worker.pv.root_pv() {
        line @ [first, ..] if *first == worker.best_move_this_iteration => line.to_vec(),
        _ => vec![worker.best_move_this_iteration],
    }
}

/// Iterative deepening for one worker.
fn run_deepening(
    worker: &mut Worker,
    ctx: &SearchContext<'_>,
    start_depth: i32,
    max_depth: i32,
    counter: &AtomicU64,
    mut progress: Option<&mut Progress<'_>>,
) {
    let id = worker.id();
    for depth in start_depth..=max_depth {
        if ctx.control.should_stop(id) {
            break;
        }

        let value = worker.aspiration_search(ctx, depth, worker.best_eval);
        counter.store(worker.diagnostics.nodes, Ordering::Relaxed);

        if ctx.control.should_stop(id) {
            if worker.has_searched_one_move && !worker.best_move_this_iteration.is_null() {
                worker.best_move = worker.best_move_this_iteration;
                worker.best_eval = worker.best_eval_this_iteration;
                worker.best_line = partial_line(worker);
                worker.diagnostics.partial = true;
            }
            break;
        }

        if !worker.best_move_this_iteration.is_null() {
            worker.best_move = worker.best_move_this_iteration;
        }
        worker.best_eval = value;
        worker.best_line = match worker.pv.root_pv() {
            [] => vec![worker.best_move],
            line => line.to_vec(),
        };
        worker.diagnostics.completed_iterations = depth;

        if let Some(progress) = progress.as_deref_mut() {
            ctx.tt.advance_age();
            progress.report(depth, value, &worker.best_line);
        }

        if is_mate_score(value) && ply_to_mate(value) <= depth {
            break;
        }
    }

    worker.diagnostics.best_move = worker.best_move;
    worker.diagnostics.eval = worker.best_eval;
    counter.store(worker.diagnostics.nodes, Ordering::Relaxed);
}
