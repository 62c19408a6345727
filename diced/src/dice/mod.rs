//! Dice resolution engine
//!
//! Implements parameterized rolls with:
//! - Keep/drop highest or lowest
//! - Single rerolls on chosen initial values
//! - Exploding dice (capped chains)
//! - Minimum die values
//! - Target-number success counting
//! - Notation and description rendering
//! - Batches of rolls

mod batch;
mod notation;
mod params;
mod pipeline;
mod source;
mod validate;

pub use batch::roll_batch;
pub use notation::{describe, notation};
pub use params::{
    RollParameters, Selection, MAX_DICE_COUNT, MAX_DICE_SIDES, MAX_MODIFIER, MIN_DICE_COUNT,
    MIN_DICE_SIDES,
};
pub use pipeline::{roll, Annotation, DieResult, RollResult, MAX_EXPLOSIONS};
pub use source::{DieSource, RngSource, ScriptedSource};
pub use validate::{
    validate, validate_batch, FieldError, ValidRange, ValidationErrors, MAX_BATCH_COUNT,
    MAX_BATCH_DICE, MAX_BATCH_ROLLS,
};
