//! HalfKP network parameters and the quantised forward pass.

use crate::error::NnueError;

use super::accumulator::Accumulator;
use super::features::NUM_FEATURES;
use super::simd::SimdDispatcher;

/// Width of one perspective's accumulator.
pub const HIDDEN: usize = 256;

/// Neurons in each of the two hidden layers.
pub const LAYER_SIZE: usize = 32;

/// Right shift applied to every hidden layer's output.
pub const LOG2_WEIGHT_SCALE: u32 = 6;

/// Divisor turning the output neuron into centipawns.
pub const OUTPUT_SCALE: i32 = 16;

/// Sparse input layer: one `HIDDEN`-wide `i16` row per feature.
#[derive(Clone)]
pub struct FeatureTransformer {
    bias: Vec<i16>,
    weights: Vec<i16>,
}

impl FeatureTransformer {
    pub fn new(bias: Vec<i16>, weights: Vec<i16>) -> Result<Self, NnueError> {
        check_len("transformer bias", HIDDEN, bias.len())?;
        check_len("transformer weights", NUM_FEATURES * HIDDEN, weights.len())?;
        Ok(Self { bias, weights })
    }

    #[inline]
    pub fn bias(&self) -> &[i16] {
        &self.bias
    }

    /// Weight row of `feature`.
    #[inline]
    pub fn row(&self, feature: usize) -> &[i16] {
        &self.weights[feature * HIDDEN..(feature + 1) * HIDDEN]
    }
}

/// Dense layer with 8-bit weights and 32-bit biases, weights stored
/// row-major by output neuron.
#[derive(Debug, Clone)]
pub struct LinearLayer {
    inputs: usize,
    outputs: usize,
    bias: Vec<i32>,
    weights: Vec<i8>,
}

impl LinearLayer {
    pub fn new(
        inputs: usize,
        outputs: usize,
        bias: Vec<i32>,
        weights: Vec<i8>,
    ) -> Result<Self, NnueError> {
        check_len("layer bias", outputs, bias.len())?;
        check_len("layer weights", inputs * outputs, weights.len())?;
        Ok(Self {
            inputs,
            outputs,
            bias,
            weights,
        })
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn bias(&self) -> &[i32] {
        &self.bias
    }

    pub fn weights(&self) -> &[i8] {
        &self.weights
    }
}

fn check_len(block: &'static str, expected: usize, found: usize) -> Result<(), NnueError> {
    if expected == found {
        Ok(())
    } else {
        Err(NnueError::DimensionMismatch {
            block,
            expected,
            found,
        })
    }
}

/// A complete HalfKP network: `41024 → 256x2 → 32 → 32 → 1`.
///
/// Immutable once built; evaluators share it through an `Arc`.
#[derive(Clone)]
pub struct Network {
    transformer: FeatureTransformer,
    hidden1: LinearLayer,
    hidden2: LinearLayer,
    output: LinearLayer,
}

impl Network {
    pub fn new(
        transformer: FeatureTransformer,
        hidden1: LinearLayer,
        hidden2: LinearLayer,
        output: LinearLayer,
    ) -> Result<Self, NnueError> {
        check_shape("hidden1", &hidden1, 2 * HIDDEN, LAYER_SIZE)?;
        check_shape("hidden2", &hidden2, LAYER_SIZE, LAYER_SIZE)?;
        check_shape("output", &output, LAYER_SIZE, 1)?;
        Ok(Self {
            transformer,
            hidden1,
            hidden2,
            output,
        })
    }

    #[inline]
    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn hidden1(&self) -> &LinearLayer {
        &self.hidden1
    }

    pub fn hidden2(&self) -> &LinearLayer {
        &self.hidden2
    }

    pub fn output(&self) -> &LinearLayer {
        &self.output
    }

    /// Forward pass with the side to move's accumulator first.
    pub fn evaluate(&self, us: &Accumulator, them: &Accumulator) -> i32 {
        let mut input = [0u8; 2 * HIDDEN];
        let (own, other) = input.split_at_mut(HIDDEN);
        SimdDispatcher::crelu16(&us.vals, own);
        SimdDispatcher::crelu16(&them.vals, other);

        let mut sums = [0i32; LAYER_SIZE];
        let mut hidden1 = [0u8; LAYER_SIZE];
        SimdDispatcher::dense(
            &input,
            &self.hidden1.weights,
            &self.hidden1.bias,
            &mut sums,
            LOG2_WEIGHT_SCALE,
        );
        SimdDispatcher::crelu32(&sums, &mut hidden1);

        let mut hidden2 = [0u8; LAYER_SIZE];
        SimdDispatcher::dense(
            &hidden1,
            &self.hidden2.weights,
            &self.hidden2.bias,
            &mut sums,
            LOG2_WEIGHT_SCALE,
        );
        SimdDispatcher::crelu32(&sums, &mut hidden2);

        SimdDispatcher::output_neuron(&hidden2, &self.output.weights, self.output.bias[0]) / OUTPUT_SCALE
    }
}

fn check_shape(
    block: &'static str,
    layer: &LinearLayer,
    inputs: usize,
    outputs: usize,
) -> Result<(), NnueError> {
    check_len(block, inputs, layer.inputs)?;
    check_len(block, outputs, layer.outputs)
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("features", &NUM_FEATURES)
            .field("hidden", &HIDDEN)
            .field("hidden1", &(self.hidden1.inputs, self.hidden1.outputs))
            .field("hidden2", &(self.hidden2.inputs, self.hidden2.outputs))
            .field("output", &(self.output.inputs, self.output.outputs))
            .finish()
    }
}
