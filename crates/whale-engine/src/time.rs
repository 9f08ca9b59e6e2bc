//! Time management: turn clock readings into a think time.

use std::time::Duration;

const MIN_THINK_TIME: Duration = Duration::from_millis(50);

/// Think time for the side to move.
///
/// Spends a fortieth of the remaining time plus most of the increment,
/// capped by `max_think_time`, and never less than 50 ms or a quarter of
/// the remaining time, whichever is smaller.
pub fn choose_think_time(
    white_to_move: bool,
    wtime: Duration,
    btime: Duration,
    winc: Duration,
    binc: Duration,
    max_think_time: Option<Duration>,
) -> Duration {
    let (remaining, increment) = if white_to_move { (wtime, winc) } else { (btime, binc) };

    let remaining_ms = remaining.as_millis() as f64;
    let increment_ms = increment.as_millis() as f64;

    let mut think_ms = remaining_ms / 40.0;
    if let Some(max) = max_think_time {
        think_ms = think_ms.min(max.as_millis() as f64);
    }
    if remaining_ms > increment_ms * 2.0 {
        think_ms += increment_ms * 0.8;
    }

    let floor_ms = (MIN_THINK_TIME.as_millis() as f64).min(remaining_ms * 0.25);
    Duration::from_millis(think_ms.max(floor_ms).ceil() as u64)
}
