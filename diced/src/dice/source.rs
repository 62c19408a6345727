//! Random sources for the roll pipeline

use std::collections::VecDeque;

use rand::Rng;

/// Supplies uniform draws in `1..=sides`
pub trait DieSource {
    fn roll(&mut self, sides: u32) -> u32;
}

impl<F> DieSource for F
where
    F: FnMut(u32) -> u32,
{
    fn roll(&mut self, sides: u32) -> u32 {
        self(sides)
    }
}

/// Adapts any `rand` generator
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<rand::rngs::ThreadRng> {
    /// Thread-local entropy, the default for live rolls
    pub fn thread() -> Self {
        Self::new(rand::rng())
    }
}

impl<R: Rng> DieSource for RngSource<R> {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Replays a fixed sequence of draws in order.
///
/// Used to reproduce a known roll. Draws are returned as given, without being
/// checked against the requested number of sides.
///
/// # Panics
///
/// Panics when asked for more draws than were supplied.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    draws: VecDeque<u32>,
}

impl ScriptedSource {
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
        }
    }

    /// Draws not yet consumed
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl DieSource for ScriptedSource {
    fn roll(&mut self, sides: u32) -> u32 {
        match self.draws.pop_front() {
            Some(draw) => draw,
            None => panic!("scripted source exhausted (requested a d{})", sides),
        }
    }
}
