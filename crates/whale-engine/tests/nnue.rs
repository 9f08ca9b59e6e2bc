//! Integration tests for the NNUE evaluator on a seeded random network.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use whale_core::{Move, Position, generate_moves};
use whale_engine::eval::nnue::simd::{SimdDispatcher, scalar};
use whale_engine::eval::nnue::{
    Accumulator, FeatureTransformer, HIDDEN, LAYER_SIZE, LOG2_WEIGHT_SCALE, LinearLayer,
    NUM_FEATURES, Network, NnueEvaluator, read_from,
};
use whale_engine::{Evaluation, NnueBlend, NnueError, evaluate_classical};

fn random_layer(rng: &mut StdRng, inputs: usize, outputs: usize) -> LinearLayer {
    let bias = (0..outputs).map(|_| rng.random_range(-512..512)).collect();
    let weights = (0..inputs * outputs).map(|_| rng.random_range(-32..32)).collect();
    LinearLayer::new(inputs, outputs, bias, weights).unwrap()
}

fn random_network(seed: u64) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    let bias = (0..HIDDEN).map(|_| rng.random_range(0..64)).collect();
    let weights = (0..NUM_FEATURES * HIDDEN).map(|_| rng.random_range(-24..24)).collect();
    let transformer = FeatureTransformer::new(bias, weights).unwrap();
    let hidden1 = random_layer(&mut rng, 2 * HIDDEN, LAYER_SIZE);
    let hidden2 = random_layer(&mut rng, LAYER_SIZE, LAYER_SIZE);
    let output = random_layer(&mut rng, LAYER_SIZE, 1);
    Network::new(transformer, hidden1, hidden2, output).unwrap()
}

/// Serialise `net` in the on-disk layout.
fn network_bytes(net: &Network, architecture: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x7AF3_2F16u32.to_le_bytes());
    bytes.extend_from_slice(&0x3E5A_A6EEu32.to_le_bytes());
    bytes.extend_from_slice(&(architecture.len() as u32).to_le_bytes());
    bytes.extend_from_slice(architecture.as_bytes());

    bytes.extend_from_slice(&0x5D69_D7B8u32.to_le_bytes());
    for v in net.transformer().bias() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for feature in 0..NUM_FEATURES {
        for v in net.transformer().row(feature) {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }

    bytes.extend_from_slice(&0x6333_7156u32.to_le_bytes());
    for layer in [net.hidden1(), net.hidden2(), net.output()] {
        for v in layer.bias() {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend(layer.weights().iter().map(|&w| w as u8));
    }
    bytes
}

fn fresh_eval(net: &Arc<Network>, pos: &Position) -> i32 {
    let mut nnue = NnueEvaluator::new(Arc::clone(net));
    nnue.try_update_accumulators(pos.board(), true);
    nnue.evaluate(pos.move_colour_index())
}

fn random_move(rng: &mut StdRng, pos: &Position) -> Option<Move> {
    let moves = generate_moves(pos, false);
    if moves.is_empty() {
        return None;
    }
    Some(moves[rng.random_range(0..moves.len())])
}

#[test]
fn incremental_updates_match_a_refresh_over_random_games() {
    let net = Arc::new(random_network(1));
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..4 {
        let mut pos = Position::startpos();
        let mut eval = Evaluation::with_network(Arc::clone(&net), NnueBlend::Replace);
        eval.refresh(&pos);
        let mut played = Vec::new();

        for _ in 0..80 {
            let Some(mv) = random_move(&mut rng, &pos) else {
                break;
            };
            eval.on_make_move(&pos, mv);
            pos.make_move(mv);
            played.push(mv);

            assert_eq!(eval.evaluate(&pos), fresh_eval(&net, &pos), "after {mv} in {}", pos.fen());
            let nnue = eval.nnue().unwrap();
            for perspective in 0..2 {
                assert_eq!(
                    nnue.accumulator(perspective),
                    &Accumulator::refresh(pos.board(), perspective, &net)
                );
            }
        }

        while let Some(mv) = played.pop() {
            pos.unmake_move();
            eval.on_unmake_move(&pos, mv);
            if played.len() % 7 == 0 {
                assert_eq!(eval.evaluate(&pos), fresh_eval(&net, &pos), "undoing {mv}");
            }
        }
        assert_eq!(eval.evaluate(&pos), fresh_eval(&net, &Position::startpos()));
    }
}

#[test]
fn special_moves_update_the_accumulators() {
    let net = Arc::new(random_network(3));
    let lines: [(&str, &[&str]); 3] = [
        (
            "r3k2r/pppq1ppp/2np1n2/2b1p1B1/2B1P1b1/2NP1N2/PPPQ1PPP/R3K2R w KQkq - 0 1",
            &["e1g1", "e8c8"],
        ),
        ("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1", &["e5d6", "e8d7"]),
        ("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1", &["a7b8q", "e8e7"]),
    ];

    for (fen, moves) in lines {
        let mut pos = Position::from_fen(fen).unwrap();
        let mut eval = Evaluation::with_network(Arc::clone(&net), NnueBlend::Replace);
        eval.refresh(&pos);
        for uci in moves {
            let mv = pos.parse_uci_move(uci).unwrap();
            eval.on_make_move(&pos, mv);
            pos.make_move(mv);
            assert_eq!(eval.evaluate(&pos), fresh_eval(&net, &pos), "after {uci} from {fen}");
        }
    }
}

#[test]
fn augment_averages_with_the_classical_score() {
    let net = Arc::new(random_network(4));
    let pos = Position::from_fen("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3")
        .unwrap();
    let mut eval = Evaluation::with_network(Arc::clone(&net), NnueBlend::Augment);
    let expected = (fresh_eval(&net, &pos) + evaluate_classical(&pos)) / 2;
    assert_eq!(eval.evaluate(&pos), expected);

    eval.set_network(None, NnueBlend::Augment);
    assert!(!eval.uses_nnue());
    assert_eq!(eval.evaluate(&pos), evaluate_classical(&pos));
}

#[test]
fn dispatched_kernels_match_the_scalar_kernels() {
    let mut rng = StdRng::seed_from_u64(5);

    let acc: Vec<i16> = (0..HIDDEN).map(|_| rng.random()).collect();
    let row: Vec<i16> = (0..HIDDEN).map(|_| rng.random()).collect();
    let (mut expected, mut actual) = (acc.clone(), acc.clone());
    scalar::add_weights(&mut expected, &row);
    SimdDispatcher::add_weights(&mut actual, &row);
    assert_eq!(actual, expected);
    scalar::sub_weights(&mut expected, &row);
    SimdDispatcher::sub_weights(&mut actual, &row);
    assert_eq!(actual, expected);
    assert_eq!(actual, acc);

    let (mut expected, mut actual) = (vec![0u8; HIDDEN], vec![0u8; HIDDEN]);
    scalar::crelu16(&acc, &mut expected);
    SimdDispatcher::crelu16(&acc, &mut actual);
    assert_eq!(actual, expected);

    let sums: Vec<i32> = (0..LAYER_SIZE).map(|_| rng.random_range(-1000..1000)).collect();
    let (mut expected, mut actual) = (vec![0u8; LAYER_SIZE], vec![0u8; LAYER_SIZE]);
    scalar::crelu32(&sums, &mut expected);
    SimdDispatcher::crelu32(&sums, &mut actual);
    assert_eq!(actual, expected);

    let input: Vec<u8> = (0..2 * HIDDEN).map(|_| rng.random_range(0..128)).collect();
    let weights: Vec<i8> = (0..2 * HIDDEN * LAYER_SIZE).map(|_| rng.random()).collect();
    let bias: Vec<i32> = (0..LAYER_SIZE).map(|_| rng.random_range(-4096..4096)).collect();
    let (mut expected, mut actual) = (vec![0i32; LAYER_SIZE], vec![0i32; LAYER_SIZE]);
    scalar::dense(&input, &weights, &bias, &mut expected, LOG2_WEIGHT_SCALE);
    SimdDispatcher::dense(&input, &weights, &bias, &mut actual, LOG2_WEIGHT_SCALE);
    assert_eq!(actual, expected);

    let hidden: Vec<u8> = (0..LAYER_SIZE).map(|_| rng.random_range(0..128)).collect();
    let out_weights: Vec<i8> = (0..LAYER_SIZE).map(|_| rng.random()).collect();
    assert_eq!(
        SimdDispatcher::output_neuron(&hidden, &out_weights, 77),
        scalar::output_neuron(&hidden, &out_weights, 77)
    );
}

#[test]
fn serialised_network_loads_back() {
    let net = random_network(6);
    let bytes = network_bytes(&net, "HalfKP(Friend)[41024->256x2]->32->32->1");

    let (header, loaded) = read_from(bytes.as_slice()).unwrap();
    assert_eq!(header.version, 0x7AF3_2F16);
    assert_eq!(header.hash, 0x3E5A_A6EE);
    assert_eq!(header.architecture, "HalfKP(Friend)[41024->256x2]->32->32->1");
    assert_eq!(loaded.transformer().bias(), net.transformer().bias());
    assert_eq!(loaded.output().weights(), net.output().weights());

    let net = Arc::new(net);
    let loaded = Arc::new(loaded);
    let pos = Position::from_fen("rnbqkb1r/pp2pppp/3p1n2/8/3NP3/8/PPP2PPP/RNBQKB1R w KQkq - 1 5").unwrap();
    assert_eq!(fresh_eval(&loaded, &pos), fresh_eval(&net, &pos));
}

#[test]
fn network_file_loads_from_disk() {
    let net = random_network(7);
    let path = std::env::temp_dir().join(format!("whale-test-{}.nnue", std::process::id()));
    std::fs::write(&path, network_bytes(&net, "test")).unwrap();

    let loaded = whale_engine::eval::nnue::load(&path);
    std::fs::remove_file(&path).unwrap();
    let loaded = Arc::new(loaded.unwrap());
    let pos = Position::startpos();
    assert_eq!(fresh_eval(&loaded, &pos), fresh_eval(&Arc::new(net), &pos));
}

#[test]
fn truncated_network_is_rejected() {
    let net = random_network(8);
    let mut bytes = network_bytes(&net, "test");
    bytes.pop();
    assert!(matches!(read_from(bytes.as_slice()), Err(NnueError::Io(_))));
}
