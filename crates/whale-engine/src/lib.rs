//! Search and evaluation for whale.

pub mod engine;
pub mod error;
pub mod eval;
pub mod options;
pub mod search;
pub mod time;

pub use engine::{Engine, MoveChosenCallback};
pub use error::{EngineError, NnueError};
pub use eval::nnue::{Network, NnueEvaluator};
pub use eval::{Evaluation, NnueBlend, evaluate_classical};
pub use options::{EngineOption, EngineOptions};
pub use search::control::SearchControl;
pub use search::negamax::{
    IMMEDIATE_MATE_SCORE, INFINITY, MAX_DEPTH, MAX_PLY, SearchDiagnostics, is_mate_score,
    ply_to_mate,
};
pub use search::pool::SearchInfo;
pub use search::tt::{Bound, TranspositionTable};
pub use search::{SearchCompleteCallback, SearchLimits, SearchOutcome, SearchStatus, Searcher};
pub use time::choose_think_time;
