//! Batch rolling

use super::params::RollParameters;
use super::pipeline::{roll, RollResult};
use super::source::DieSource;

/// Roll every entry of `rolls`, repeating the whole list `count` times.
///
/// Results come back in list order within each repetition:
/// `[a, b]` with `count = 2` yields `a, b, a, b`.
pub fn roll_batch<S: DieSource + ?Sized>(
    rolls: &[RollParameters],
    count: u32,
    source: &mut S,
) -> Vec<RollResult> {
    let mut results = Vec::with_capacity(rolls.len() * count as usize);
    for _ in 0..count {
        for params in rolls {
            results.push(roll(params, source));
        }
    }
    results
}
