//! NNUE accumulator for incremental feature updates.

use whale_core::Board;

use super::features::active_features;
use super::network::{HIDDEN, Network};
use super::simd::SimdDispatcher;

/// Accumulated feature-transformer output for one perspective.
#[derive(Clone, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct Accumulator {
    pub(crate) vals: [i16; HIDDEN],
}

impl Accumulator {
    pub const fn zeroed() -> Self {
        Self { vals: [0; HIDDEN] }
    }

    /// Full recompute: bias plus the rows of every active feature.
    pub fn refresh(board: &Board, perspective: usize, net: &Network) -> Self {
        let mut acc = Self::zeroed();
        acc.vals.copy_from_slice(net.transformer().bias());
        for idx in active_features(board, perspective) {
            acc.add_feature(idx, net);
        }
        acc
    }

    #[inline]
    pub fn add_feature(&mut self, idx: usize, net: &Network) {
        SimdDispatcher::add_weights(&mut self.vals, net.transformer().row(idx));
    }

    #[inline]
    pub fn remove_feature(&mut self, idx: usize, net: &Network) {
        SimdDispatcher::sub_weights(&mut self.vals, net.transformer().row(idx));
    }

    pub fn values(&self) -> &[i16; HIDDEN] {
        &self.vals
    }
}

impl std::fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accumulator")
            .field("head", &&self.vals[..8])
            .finish_non_exhaustive()
    }
}
