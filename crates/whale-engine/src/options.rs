//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::eval::NnueBlend;
use crate::search::tt::{DEFAULT_HASH_MB, MAX_HASH_MB, MIN_HASH_MB};

pub const MIN_THREADS: usize = 1;
pub const MAX_THREADS: usize = 128;

/// Configuration knobs of the engine.
///
/// Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub threads: usize,
    /// Transposition table size in megabytes.
    pub hash_mb: usize,
    pub allow_nnue: bool,
    pub nnue_blend: NnueBlend,
    pub network_path: Option<PathBuf>,
    /// Upper bound for [`choose_think_time`](crate::choose_think_time).
    pub max_think_time: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: MIN_THREADS,
            hash_mb: DEFAULT_HASH_MB,
            allow_nnue: false,
            nnue_blend: NnueBlend::Replace,
            network_path: None,
            max_think_time: None,
        }
    }
}

impl EngineOptions {
    /// Clamp every numeric field into its supported range.
    pub fn clamped(mut self) -> Self {
        self.threads = clamp_threads(self.threads);
        self.hash_mb = clamp_hash_mb(self.hash_mb);
        self
    }

    /// Apply one front-end option change.
    pub fn apply(&mut self, option: EngineOption) {
        match option {
            EngineOption::HashSize(mb) => self.hash_mb = clamp_hash_mb(mb),
            EngineOption::Threads(n) => self.threads = clamp_threads(n),
            EngineOption::AllowNnue(allow) => self.allow_nnue = allow,
        }
    }
}

pub fn clamp_threads(threads: usize) -> usize {
    threads.clamp(MIN_THREADS, MAX_THREADS)
}

pub fn clamp_hash_mb(mb: usize) -> usize {
    mb.clamp(MIN_HASH_MB, MAX_HASH_MB)
}

/// A single option change, as sent by the front-end by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOption {
    /// Index 0.
    HashSize(usize),
    /// Index 1.
    Threads(usize),
    /// Index 2; any non-zero value enables.
    AllowNnue(bool),
}

impl EngineOption {
    /// Decode `SetOption(index, value)`. Unknown indices yield `None`.
    pub fn from_index(index: u32, value: i64) -> Option<Self> {
        let unsigned = value.max(0) as usize;
        match index {
            0 => Some(EngineOption::HashSize(unsigned)),
            1 => Some(EngineOption::Threads(unsigned)),
            2 => Some(EngineOption::AllowNnue(value != 0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_are_clamped() {
        let options = EngineOptions {
            threads: 0,
            hash_mb: 1,
            ..EngineOptions::default()
        }
        .clamped();
        assert_eq!(options.threads, 1);
        assert_eq!(options.hash_mb, 16);

        let options = EngineOptions {
            threads: 1000,
            hash_mb: 1 << 20,
            ..EngineOptions::default()
        }
        .clamped();
        assert_eq!(options.threads, 128);
        assert_eq!(options.hash_mb, 32_000);
    }

    #[test]
    fn options_decode_by_index() {
        assert_eq!(EngineOption::from_index(0, 256), Some(EngineOption::HashSize(256)));
        assert_eq!(EngineOption::from_index(1, -4), Some(EngineOption::Threads(0)));
        assert_eq!(EngineOption::from_index(2, 1), Some(EngineOption::AllowNnue(true)));
        assert_eq!(EngineOption::from_index(7, 1), None);
    }

    #[test]
    fn apply_clamps() {
        let mut options = EngineOptions::default();
        options.apply(EngineOption::Threads(500));
        options.apply(EngineOption::HashSize(0));
        assert_eq!(options.threads, MAX_THREADS);
        assert_eq!(options.hash_mb, MIN_HASH_MB);
    }
}
