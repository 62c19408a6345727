//! Roll pipeline
//!
//! Turns validated [`RollParameters`] and a [`DieSource`] into a fully traced
//! [`RollResult`]. Stages always run in the same order:
//!
//! 1. initial roll
//! 2. reroll (initial draw only, at most once)
//! 3. explode (chained on maximum draws, capped)
//! 4. minimum value (floors the latest raw draw)
//! 5. keep/drop
//! 6. finalize per-die values
//! 7. aggregate into a sum or a success count
//!
//! Changing the order changes outcomes. In particular the minimum floor looks
//! at the last raw draw, so an exploded die whose final draw is under the
//! floor ends up worth exactly the floor.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::notation::{describe, notation};
use super::params::{RollParameters, Selection};
use super::source::DieSource;

/// Most extra draws a single die may take from exploding
pub const MAX_EXPLOSIONS: usize = 10;

/// Which special rule fired for a die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Rerolled,
    Exploded,
    /// Final value was raised to the floor
    MinimumFloor { value: u32 },
}

/// Working state of one die while the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DieState {
    /// 1-based position in the roll
    pub index: usize,
    pub sides: u32,
    /// Raw draws, initial roll first
    pub rolls: Vec<u32>,
    /// Unset until the minimum or finalize stage decides it
    pub final_value: Option<u32>,
    pub kept: bool,
    pub annotation: Option<Annotation>,
}

impl DieState {
    fn new(index: usize, sides: u32, draw: u32) -> Self {
        Self {
            index,
            sides,
            rolls: vec![draw],
            final_value: None,
            kept: true,
            annotation: None,
        }
    }

    fn initial(&self) -> u32 {
        self.rolls[0]
    }

    fn latest(&self) -> u32 {
        self.rolls[self.rolls.len() - 1]
    }

    /// Magnitude used to rank dice for keep/drop
    fn magnitude(&self) -> u32 {
        self.rolls.iter().copied().max().unwrap_or(0)
    }

    /// Value implied by the draws, ignoring any floor
    fn natural_value(&self) -> u32 {
        match self.annotation {
            Some(Annotation::Exploded) => self.rolls.iter().sum(),
            _ => self.latest(),
        }
    }

    fn snapshot(self) -> DieResult {
        let value = self.final_value.unwrap_or_else(|| self.natural_value());
        DieResult {
            index: self.index,
            sides: self.sides,
            rolls: self.rolls,
            value,
            kept: self.kept,
            annotation: self.annotation,
        }
    }
}

/// One die as reported in a [`RollResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieResult {
    pub index: usize,
    pub sides: u32,
    pub rolls: Vec<u32>,
    pub value: u32,
    pub kept: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

/// Outcome of one roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Sum of kept dice plus modifier, or the success count
    pub total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice_evaluated: Option<u32>,
    pub dice: Vec<DieResult>,
    pub notation: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RollResult {
    /// Dice that count toward the sum
    pub fn kept(&self) -> impl Iterator<Item = &DieResult> {
        self.dice.iter().filter(|d| d.kept)
    }

    pub fn is_success_count(&self) -> bool {
        self.successes.is_some()
    }
}

/// Roll once.
///
/// `params` must already have passed `validate`; the
/// pipeline has no error path of its own.
pub fn roll<S: DieSource + ?Sized>(params: &RollParameters, source: &mut S) -> RollResult {
    let mut dice = initial_roll(params, source);

    let reroll = params.reroll_values();
    if !reroll.is_empty() {
        apply_reroll(&mut dice, reroll, source);
    }
    if params.is_exploding() {
        apply_explode(&mut dice, params.dice_sides, source);
    }
    if let Some(min) = params.min_value {
        apply_minimum(&mut dice, min);
    }
    if let Some(selection) = params.selection() {
        apply_selection(&mut dice, selection);
    }
    finalize(&mut dice);

    let dice: Vec<DieResult> = dice.into_iter().map(DieState::snapshot).collect();

    let (total, successes, dice_evaluated) = match params.target_number {
        Some(target) => {
            let successes = count_successes(&dice, target);
            (i64::from(successes), Some(successes), Some(params.dice_count))
        }
        None => (sum_kept(&dice) + params.modifier_value(), None, None),
    };

    let notation = notation(params);
    trace!(%notation, total, "rolled");

    RollResult {
        total,
        successes,
        dice_evaluated,
        dice,
        notation,
        description: describe(params),
        label: params.label.clone(),
    }
}

fn initial_roll<S: DieSource + ?Sized>(params: &RollParameters, source: &mut S) -> Vec<DieState> {
    (1..=params.dice_count as usize)
        .map(|index| DieState::new(index, params.dice_sides, source.roll(params.dice_sides)))
        .collect()
}

fn apply_reroll<S: DieSource + ?Sized>(dice: &mut [DieState], values: &[u32], source: &mut S) {
    for die in dice.iter_mut() {
        if values.contains(&die.initial()) {
            die.rolls.push(source.roll(die.sides));
            die.annotation = Some(Annotation::Rerolled);
        }
    }
}

fn apply_explode<S: DieSource + ?Sized>(dice: &mut [DieState], sides: u32, source: &mut S) {
    for die in dice.iter_mut() {
        let mut explosions = 0;
        while die.latest() == sides && explosions < MAX_EXPLOSIONS {
            die.rolls.push(source.roll(sides));
            explosions += 1;
        }
        if explosions > 0 {
            die.annotation = Some(Annotation::Exploded);
        }
    }
}

fn apply_minimum(dice: &mut [DieState], min: u32) {
    for die in dice.iter_mut() {
        if die.latest() < min {
            die.final_value = Some(min);
            die.annotation = Some(Annotation::MinimumFloor { value: min });
        }
    }
}

/// Mark dice kept or dropped.
///
/// Dice are ranked by magnitude (greatest first for the "highest" variants,
/// smallest first otherwise). The first `n` of the ranking are the selected
/// dice. On equal magnitudes the earlier die always ends up kept: it ranks
/// first when the selection keeps, last when it drops.
fn apply_selection(dice: &mut [DieState], selection: Selection) {
    let keeps = selection.keeps_selected();
    let by_index = |a: usize, b: usize| if keeps { a.cmp(&b) } else { b.cmp(&a) };

    let mut ranking: Vec<usize> = (0..dice.len()).collect();
    if selection.ranks_highest() {
        ranking.sort_by(|&a, &b| {
            dice[b].magnitude().cmp(&dice[a].magnitude()).then(by_index(a, b))
        });
    } else {
        ranking.sort_by(|&a, &b| {
            dice[a].magnitude().cmp(&dice[b].magnitude()).then(by_index(a, b))
        });
    }

    let n = (selection.count() as usize).min(dice.len());
    for die in dice.iter_mut() {
        die.kept = !keeps;
    }
    for &i in &ranking[..n] {
        dice[i].kept = keeps;
    }
}

fn finalize(dice: &mut [DieState]) {
    for die in dice.iter_mut() {
        if die.final_value.is_none() {
            die.final_value = Some(die.natural_value());
        }
    }
}

/// Every die is counted, kept or not.
fn count_successes(dice: &[DieResult], target: u32) -> u32 {
    dice.iter().filter(|d| d.value >= target).count() as u32
}

fn sum_kept(dice: &[DieResult]) -> i64 {
    dice.iter().filter(|d| d.kept).map(|d| i64::from(d.value)).sum()
}
