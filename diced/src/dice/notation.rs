//! Notation and description rendering
//!
//! Both strings depend on the parameters alone, never on what was rolled.

use super::params::{RollParameters, Selection};

/// Compact notation such as `4d6kh3!+5`
pub fn notation(params: &RollParameters) -> String {
    let mut out = format!("{}d{}", params.dice_count, params.dice_sides);

    if let Some(selection) = params.selection() {
        let (code, n) = match selection {
            Selection::KeepHighest(n) => ("kh", n),
            Selection::KeepLowest(n) => ("kl", n),
            Selection::DropHighest(n) => ("dh", n),
            Selection::DropLowest(n) => ("dl", n),
        };
        out.push_str(&format!("{}{}", code, n));
    }

    let reroll = params.reroll_values();
    if !reroll.is_empty() {
        out.push('r');
        for v in reroll {
            out.push_str(&v.to_string());
        }
    }

    if params.is_exploding() {
        out.push('!');
    }
    if let Some(min) = params.min_value {
        out.push_str(&format!("min{}", min));
    }
    if let Some(target) = params.target_number {
        out.push_str(&format!(">={}", target));
    }

    match params.modifier_value() {
        0 => {}
        m if m > 0 => out.push_str(&format!("+{}", m)),
        m => out.push_str(&m.to_string()),
    }

    out
}

/// English description such as `Rolled 4d6, keeping highest 3, adding 5`
pub fn describe(params: &RollParameters) -> String {
    let mut clauses = vec![format!("Rolled {}d{}", params.dice_count, params.dice_sides)];

    if let Some(selection) = params.selection() {
        clauses.push(match selection {
            Selection::KeepHighest(n) => format!("keeping highest {}", n),
            Selection::KeepLowest(n) => format!("keeping lowest {}", n),
            Selection::DropHighest(n) => format!("dropping highest {}", n),
            Selection::DropLowest(n) => format!("dropping lowest {}", n),
        });
    }

    let reroll = params.reroll_values();
    if !reroll.is_empty() {
        let values: Vec<String> = reroll.iter().map(|v| v.to_string()).collect();
        clauses.push(format!("rerolling {}s", values.join(", ")));
    }

    if params.is_exploding() {
        clauses.push(format!("exploding on {}s", params.dice_sides));
    }
    if let Some(min) = params.min_value {
        clauses.push(format!("minimum value {}", min));
    }
    if let Some(target) = params.target_number {
        clauses.push(format!("counting successes >= {}", target));
    }

    let modifier = params.modifier_value();
    if modifier > 0 {
        clauses.push(format!("adding {}", modifier));
    } else if modifier < 0 {
        clauses.push(format!("subtracting {}", modifier.unsigned_abs()));
    }

    clauses.join(", ")
}
