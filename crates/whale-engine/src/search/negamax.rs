//! Principal-variation alpha-beta search with quiescence.

use whale_core::{Move, Piece, Position, generate_moves};

use crate::eval::Evaluation;
use crate::eval::material::piece_value;
use crate::search::control::SearchControl;
use crate::search::heuristics::{HistoryTable, KillerTable};
use crate::search::ordering::{MovePicker, lmr_reduction};
use crate::search::repetition::RepetitionTable;
use crate::search::tt::{Bound, TranspositionTable};

/// Score of being checkmated at the root; mates further away score less.
pub const IMMEDIATE_MATE_SCORE: i32 = 100_000;

/// Bound wider than any reachable score.
pub const INFINITY: i32 = 9_999_999;

/// Scores within this many points of [`IMMEDIATE_MATE_SCORE`] are mates.
pub const MAX_MATE_DEPTH: i32 = 1000;

/// Total extensions allowed along one line.
pub const MAX_EXTENSIONS: i32 = 16;

/// Deepest iteration of iterative deepening.
pub const MAX_DEPTH: i32 = 220;

/// Size of every per-ply array.
pub const MAX_PLY: usize = 272;

const NULL_MOVE_VERIFY_DEPTH: i32 = 10;
const FUTILITY_MARGIN: i32 = 200;
const LMR_MIN_MOVE_INDEX: usize = 3;
const LMR_MIN_DEPTH: i32 = 3;

const ASPIRATION_BASE: i32 = 20;
const ASPIRATION_MAX: i32 = 1000;

pub fn is_mate_score(score: i32) -> bool {
    score.abs() > IMMEDIATE_MATE_SCORE - MAX_MATE_DEPTH
}

/// Plies until mate for a mate score.
pub fn ply_to_mate(score: i32) -> i32 {
    IMMEDIATE_MATE_SCORE - score.abs()
}

/// Triangular PV table for collecting principal variation lines.
///
/// Row `ply` holds the best line found from that ply onward.
pub struct PvTable {
    moves: Box<[[Move; MAX_PLY]]>,
    len: [usize; MAX_PLY],
}

impl PvTable {
    pub fn new() -> Self {
        Self {
            moves: vec![[Move::NULL; MAX_PLY]; MAX_PLY].into_boxed_slice(),
            len: [0; MAX_PLY],
        }
    }

    /// Clear the PV line at `ply` (called at the top of each node).
    pub fn clear_ply(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// Set `mv` as the best move at `ply` followed by the line from `ply + 1`.
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        self.moves[ply][0] = mv;

        let child_ply = ply + 1;
        if child_ply < MAX_PLY {
            let copy_len = self.len[child_ply].min(MAX_PLY - 1);
            let (top, bottom) = self.moves.split_at_mut(child_ply);
            top[ply][1..1 + copy_len].copy_from_slice(&bottom[0][..copy_len]);
            self.len[ply] = 1 + copy_len;
        } else {
            self.len[ply] = 1;
        }
    }

    /// The principal variation from the root.
    pub fn root_pv(&self) -> &[Move] {
        &self.moves[0][..self.len[0]]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for the last search of one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDiagnostics {
    pub completed_iterations: i32,
    pub positions_evaluated: u64,
    pub nodes: u64,
    pub cutoffs: u64,
    pub best_move: Move,
    pub eval: i32,
    /// The result came from an iteration that was aborted part way.
    pub partial: bool,
    /// Root re-searches after the score left the aspiration window.
    pub aspiration_researches: u32,
    /// Null move cutoffs that were re-checked by a reduced search.
    pub null_move_verifications: u64,
}

/// State shared by every worker for the duration of one search.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub control: &'a SearchControl,
}

/// Parameters shared by every search of one child node.
struct Child {
    ply: i32,
    extensions: i32,
    irreversible: bool,
}

/// Per-thread search state.
///
/// Everything except the transposition table is private to the worker:
/// its own position copy, evaluator, repetition stack and ordering tables.
pub struct Worker {
    id: usize,
    pub(crate) pos: Position,
    pub(crate) eval: Evaluation,
    repetition: RepetitionTable,
    killers: KillerTable,
    history: HistoryTable,
    pub(crate) pv: PvTable,
    pub(crate) diagnostics: SearchDiagnostics,
    nmp_min_ply: i32,
    root_delta: i32,
    pub(crate) best_move: Move,
    pub(crate) best_eval: i32,
    /// Principal variation of the last completed iteration.
    pub(crate) best_line: Vec<Move>,
    pub(crate) best_move_this_iteration: Move,
    pub(crate) best_eval_this_iteration: i32,
    pub(crate) has_searched_one_move: bool,
}

impl Worker {
    pub fn new(id: usize, eval: Evaluation) -> Self {
        Self {
            id,
            pos: Position::startpos(),
            eval,
            repetition: RepetitionTable::new(),
            killers: KillerTable::new(),
            history: HistoryTable::new(),
            pv: PvTable::new(),
            diagnostics: SearchDiagnostics::default(),
            nmp_min_ply: 0,
            root_delta: 1,
            best_move: Move::NULL,
            best_eval: 0,
            best_line: Vec::new(),
            best_move_this_iteration: Move::NULL,
            best_eval_this_iteration: 0,
            has_searched_one_move: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn diagnostics(&self) -> &SearchDiagnostics {
        &self.diagnostics
    }

    pub fn evaluation_mut(&mut self) -> &mut Evaluation {
        &mut self.eval
    }

    /// Load `root` and reset everything a new search starts from.
    pub fn prepare(&mut self, root: &Position) {
        self.pos = root.clone();
        self.repetition.init(&root.repetition_history());
        self.eval.refresh(&self.pos);
        self.diagnostics = SearchDiagnostics::default();
        self.nmp_min_ply = 0;
        self.best_move = Move::NULL;
        self.best_eval = 0;
        self.best_line.clear();
        self.best_move_this_iteration = Move::NULL;
        self.best_eval_this_iteration = 0;
        self.has_searched_one_move = false;
    }

    /// Forget killers and history.
    pub fn clear_heuristics(&mut self) {
        self.killers.clear();
        self.history.clear();
    }

    /// Search the root to `depth`, widening an aspiration window around
    /// `prev_eval` until the score falls inside it.
    pub fn aspiration_search(&mut self, ctx: &SearchContext<'_>, depth: i32, prev_eval: i32) -> i32 {
        let mut fails = 0u32;
        loop {
            let half_width = if depth <= 1 || is_mate_score(prev_eval) {
                None
            } else {
                ASPIRATION_BASE
                    .checked_shl(fails)
                    .filter(|&width| width < ASPIRATION_MAX)
            };
            let (alpha, beta) = match half_width {
                Some(width) => (prev_eval - width, prev_eval + width),
                None => (-INFINITY, INFINITY),
            };

            self.root_delta = beta - alpha;
            self.best_move_this_iteration = Move::NULL;
            self.has_searched_one_move = false;

            let value = self.search_moves(ctx, depth, 0, alpha, beta, 0, false, true);
            if ctx.control.should_stop(self.id) {
                return value;
            }
            if half_width.is_some() && (value <= alpha || value >= beta) {
                fails += 1;
                self.diagnostics.aspiration_researches += 1;
                continue;
            }
            return value;
        }
    }

    /// Fail-hard negamax over the current position.
    ///
    /// `irreversible` tells whether the move into this node was a capture,
    /// pawn move or null move; it starts a new repetition run.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search_moves(
        &mut self,
        ctx: &SearchContext<'_>,
        depth: i32,
        ply: i32,
        mut alpha: i32,
        mut beta: i32,
        num_extensions: i32,
        irreversible: bool,
        null_allowed: bool,
    ) -> i32 {
        if ctx.control.should_stop(self.id) {
            return 0;
        }
        self.pv.clear_ply(ply as usize);
        let pv_node = beta - alpha > 1;
        let key = self.pos.zobrist_key();

        if ply > 0 {
            if self.pos.fifty_move_counter() >= 100 || self.repetition.contains(key) {
                return 0;
            }

            // Mate distance pruning.
            alpha = alpha.max(-IMMEDIATE_MATE_SCORE + ply);
            beta = beta.min(IMMEDIATE_MATE_SCORE - ply);
            if alpha >= beta {
                return alpha;
            }
        }

        if ply as usize >= MAX_PLY - 1 {
            return self.evaluate();
        }

        if !pv_node
            && let Some(value) = ctx.tt.lookup(key, depth, ply, alpha, beta)
        {
            return value;
        }

        if depth <= 0 {
            return self.quiescence(ctx, ply, alpha, beta);
        }

        let in_check = self.pos.is_in_check();

        // Null move pruning
        if !pv_node && !in_check && null_allowed && ply >= self.nmp_min_ply {
            let reduction = depth / 3 + 4;
            if self.pos.make_null_move().is_ok() {
                let value = -self.search_moves(
                    ctx,
                    depth - reduction,
                    ply + 1,
                    -beta,
                    -beta + 1,
                    num_extensions,
                    true,
                    false,
                );
                self.pos.unmake_null_move();
                if ctx.control.should_stop(self.id) {
                    return 0;
                }

                if value >= beta {
                    if self.nmp_min_ply > 0 || depth < NULL_MOVE_VERIFY_DEPTH {
                        return beta;
                    }
                    self.diagnostics.null_move_verifications += 1;
                    self.nmp_min_ply = ply + 3 * (depth - reduction) / 4;
                    let verified = self.search_moves(
                        ctx,
                        depth - reduction,
                        ply,
                        beta - 1,
                        beta,
                        num_extensions,
                        irreversible,
                        false,
                    );
                    self.nmp_min_ply = 0;
                    if verified >= beta {
                        return beta;
                    }
                }
            }
        }

        let static_eval = if depth == 1 && !in_check && !pv_node {
            Some(self.evaluate())
        } else {
            None
        };

        let moves = generate_moves(&self.pos, false);
        if moves.is_empty() {
            return if in_check { -(IMMEDIATE_MATE_SCORE - ply) } else { 0 };
        }

        let hash_move = if ply == 0 && !self.best_move.is_null() {
            self.best_move
        } else {
            ctx.tt.stored_move(key)
        };
        let mut picker = MovePicker::new(
            &moves,
            self.pos.board(),
            hash_move,
            &self.killers,
            &self.history,
            ply as usize,
        );

        if ply > 0 {
            self.repetition.push(key, irreversible);
        }

        let colour = self.pos.move_colour_index();
        let mut bound = Bound::UpperBound;
        let mut best_move = Move::NULL;
        let mut index = 0usize;

        while let Some(mv) = picker.pick_next() {
            let i = index;
            index += 1;

            let board = *self.pos.board();
            let moved = board.piece_on(mv.start());
            let captured = if mv.is_en_passant() {
                Some(Piece::Pawn)
            } else {
                board.piece_on(mv.target())
            };
            let capture = captured.is_some();
            let child_irreversible = capture || moved == Some(Piece::Pawn);

            self.eval.on_make_move(&self.pos, mv);
            self.pos.make_move(mv);
            let gives_check = self.pos.is_in_check();

            if let Some(static_eval) = static_eval {
                let margin = FUTILITY_MARGIN + captured.map_or(0, piece_value);
                if static_eval + margin <= alpha && !mv.is_promotion() && !gives_check {
                    self.pos.unmake_move();
                    self.eval.on_unmake_move(&self.pos, mv);
                    continue;
                }
            }

            let target_rank = mv.target_index() / 8;
            let extension = if num_extensions < MAX_EXTENSIONS
                && (gives_check
                    || (moved == Some(Piece::Pawn) && (target_rank == 1 || target_rank == 6)))
            {
                1
            } else {
                0
            };
            let new_depth = depth - 1 + extension;

            let child = Child {
                ply: ply + 1,
                extensions: num_extensions + extension,
                irreversible: child_irreversible,
            };
            let value = if i == 0 {
                -self.search_child(ctx, &child, new_depth, -beta, -alpha)
            } else {
                let mut value = alpha + 1;
                if i >= LMR_MIN_MOVE_INDEX
                    && depth >= LMR_MIN_DEPTH
                    && extension == 0
                    && !capture
                    && !mv.is_promotion()
                    && !in_check
                {
                    let r = lmr_reduction(depth, i, beta - alpha, self.root_delta);
                    let reduced = (new_depth - r).clamp(1, new_depth.max(1));
                    value = -self.search_child(ctx, &child, reduced, -alpha - 1, -alpha);
                }
                if value > alpha {
                    value = -self.search_child(ctx, &child, new_depth, -alpha - 1, -alpha);
                    if pv_node && value > alpha && value < beta {
                        value = -self.search_child(ctx, &child, new_depth, -beta, -alpha);
                    }
                }
                value
            };

            self.pos.unmake_move();
            self.eval.on_unmake_move(&self.pos, mv);

            if ctx.control.should_stop(self.id) {
                if ply > 0 {
                    self.repetition.try_pop();
                }
                return 0;
            }
            self.diagnostics.nodes += 1;

            if value >= beta {
                ctx.tt.store(key, depth, ply, beta, Bound::LowerBound, mv, ctx.tt.generation());
                if !capture && !mv.is_promotion() {
                    self.killers.store(ply as usize, mv);
                    self.history.reward(colour, mv, depth);
                }
                if ply > 0 {
                    self.repetition.try_pop();
                } else {
                    self.best_move_this_iteration = mv;
                    self.best_eval_this_iteration = beta;
                    self.has_searched_one_move = true;
                }
                self.diagnostics.cutoffs += 1;
                return beta;
            }

            if value > alpha {
                bound = Bound::Exact;
                best_move = mv;
                alpha = value;
                self.pv.update(ply as usize, mv);
                if ply == 0 {
                    self.best_move_this_iteration = mv;
                    self.best_eval_this_iteration = value;
                }
            }

            if ply == 0 {
                self.has_searched_one_move = true;
            }
        }

        if ply > 0 {
            self.repetition.try_pop();
        }

        let store_move = if best_move.is_null() { hash_move } else { best_move };
        ctx.tt.store(key, depth, ply, alpha, bound, store_move, ctx.tt.generation());
        alpha
    }

    fn search_child(&mut self, ctx: &SearchContext<'_>, child: &Child, depth: i32, alpha: i32, beta: i32) -> i32 {
        self.search_moves(
            ctx,
            depth,
            child.ply,
            alpha,
            beta,
            child.extensions,
            child.irreversible,
            true,
        )
    }

    /// Capture-only search below the horizon.
    pub(crate) fn quiescence(&mut self, ctx: &SearchContext<'_>, ply: i32, mut alpha: i32, beta: i32) -> i32 {
        if ctx.control.should_stop(self.id) {
            return 0;
        }
        self.pv.clear_ply(ply as usize);

        if ply as usize >= MAX_PLY - 1 {
            return self.evaluate();
        }

        let key = self.pos.zobrist_key();
        if let Some(value) = ctx.tt.lookup(key, 0, ply, alpha, beta) {
            return value;
        }

        // Stand pat: the side to move can decline every capture.
        let stand_pat = self.evaluate();
        if stand_pat >= beta {
            return beta;
        }
        let original_alpha = alpha;
        alpha = alpha.max(stand_pat);

        let moves = generate_moves(&self.pos, true);
        let mut picker = MovePicker::new_quiescence(&moves, self.pos.board(), &self.history);
        let mut best_move = Move::NULL;

        while let Some(mv) = picker.pick_next() {
            self.eval.on_make_move(&self.pos, mv);
            self.pos.make_move(mv);
            let value = -self.quiescence(ctx, ply + 1, -beta, -alpha);
            self.pos.unmake_move();
            self.eval.on_unmake_move(&self.pos, mv);

            if ctx.control.should_stop(self.id) {
                return 0;
            }
            self.diagnostics.nodes += 1;

            if value >= beta {
                ctx.tt.store(key, 0, ply, beta, Bound::LowerBound, mv, ctx.tt.generation());
                self.diagnostics.cutoffs += 1;
                return beta;
            }
            if value > alpha {
                alpha = value;
                best_move = mv;
            }
        }

        let bound = if alpha > original_alpha { Bound::Exact } else { Bound::UpperBound };
        ctx.tt.store(key, 0, ply, alpha, bound, best_move, ctx.tt.generation());
        alpha
    }

    fn evaluate(&mut self) -> i32 {
        self.diagnostics.positions_evaluated += 1;
        self.eval.evaluate(&self.pos)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("fen", &self.pos.fen())
            .field("nnue", &self.eval.uses_nnue())
            .field("best_move", &self.best_move)
            .field("best_eval", &self.best_eval)
            .finish()
    }
}
