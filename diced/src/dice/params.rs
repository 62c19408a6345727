//! Roll parameters
//!
//! The declarative description of a roll as it arrives over the wire.

use serde::{Deserialize, Serialize};

/// Fewest dice a single roll may use
pub const MIN_DICE_COUNT: u32 = 1;
/// Most dice a single roll may use
pub const MAX_DICE_COUNT: u32 = 1000;
/// Fewest sides a die may have
pub const MIN_DICE_SIDES: u32 = 1;
/// Most sides a die may have
pub const MAX_DICE_SIDES: u32 = 100;
/// Largest modifier magnitude accepted
pub const MAX_MODIFIER: i64 = 1_000_000;

/// Parameters for one roll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollParameters {
    /// Number of dice to roll
    pub dice_count: u32,
    /// Number of sides per die
    pub dice_sides: u32,
    /// Added to the sum after all other operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_highest: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_lowest: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_highest: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_lowest: Option<u32>,
    /// Initial values that trigger a single reroll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reroll: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploding: Option<bool>,
    /// Switches the result from a sum to a success count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<u32>,
    /// Opaque caller label, echoed back untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Which dice survive into the sum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    KeepHighest(u32),
    KeepLowest(u32),
    DropHighest(u32),
    DropLowest(u32),
}

impl Selection {
    /// Number of dice named by the selection
    pub fn count(&self) -> u32 {
        match *self {
            Selection::KeepHighest(n)
            | Selection::KeepLowest(n)
            | Selection::DropHighest(n)
            | Selection::DropLowest(n) => n,
        }
    }

    /// Whether the ranking runs from the greatest magnitude down
    pub fn ranks_highest(&self) -> bool {
        matches!(self, Selection::KeepHighest(_) | Selection::DropHighest(_))
    }

    /// Whether the ranked dice are the ones kept (as opposed to dropped)
    pub fn keeps_selected(&self) -> bool {
        matches!(self, Selection::KeepHighest(_) | Selection::KeepLowest(_))
    }
}

impl RollParameters {
    /// Create parameters for a plain `NdS` roll
    pub fn new(dice_count: u32, dice_sides: u32) -> Self {
        Self {
            dice_count,
            dice_sides,
            ..Default::default()
        }
    }

    pub fn with_modifier(mut self, modifier: i64) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn keep_highest(mut self, n: u32) -> Self {
        self.keep_highest = Some(n);
        self
    }

    pub fn keep_lowest(mut self, n: u32) -> Self {
        self.keep_lowest = Some(n);
        self
    }

    pub fn drop_highest(mut self, n: u32) -> Self {
        self.drop_highest = Some(n);
        self
    }

    pub fn drop_lowest(mut self, n: u32) -> Self {
        self.drop_lowest = Some(n);
        self
    }

    pub fn with_reroll(mut self, values: impl Into<Vec<u32>>) -> Self {
        self.reroll = Some(values.into());
        self
    }

    pub fn exploding(mut self) -> Self {
        self.exploding = Some(true);
        self
    }

    pub fn with_target(mut self, target: u32) -> Self {
        self.target_number = Some(target);
        self
    }

    pub fn with_min_value(mut self, min: u32) -> Self {
        self.min_value = Some(min);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The keep/drop operation, if any.
    ///
    /// Keep fields take precedence over drop fields; validated parameters
    /// never carry more than one.
    pub fn selection(&self) -> Option<Selection> {
        self.keep_highest
            .map(Selection::KeepHighest)
            .or(self.keep_lowest.map(Selection::KeepLowest))
            .or(self.drop_highest.map(Selection::DropHighest))
            .or(self.drop_lowest.map(Selection::DropLowest))
    }

    /// Reroll triggers, empty when none were given
    pub fn reroll_values(&self) -> &[u32] {
        self.reroll.as_deref().unwrap_or(&[])
    }

    pub fn is_exploding(&self) -> bool {
        self.exploding.unwrap_or(false)
    }

    /// Modifier with the default of zero applied
    pub fn modifier_value(&self) -> i64 {
        self.modifier.unwrap_or(0)
    }
}
