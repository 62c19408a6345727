//! Parameter validation
//!
//! Every rule the pipeline relies on is checked here, and every violation is
//! reported, not only the first one found.

use serde::Serialize;
use thiserror::Error;

use super::params::{
    RollParameters, MAX_DICE_COUNT, MAX_DICE_SIDES, MAX_MODIFIER, MIN_DICE_COUNT, MIN_DICE_SIDES,
};

/// Most entries a batch may list
pub const MAX_BATCH_ROLLS: usize = 50;
/// Most times a batch may be repeated
pub const MAX_BATCH_COUNT: u32 = 100;
/// Most dice one batch may roll across all entries and repeats
pub const MAX_BATCH_DICE: u64 = 10_000;

/// Inclusive numeric bounds for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidRange {
    pub min: i64,
    pub max: i64,
}

impl ValidRange {
    fn new(min: impl Into<i64>, max: impl Into<i64>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}

/// One offending parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub parameter: String,
    pub issue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<ValidRange>,
}

impl FieldError {
    fn new(parameter: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            issue: issue.into(),
            valid_range: None,
        }
    }

    fn with_range(mut self, range: ValidRange) -> Self {
        self.valid_range = Some(range);
        self
    }
}

/// All violations found in a request
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", summary(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn summary(errors: &[FieldError]) -> String {
    match errors.first() {
        Some(first) => {
            let mut msg = format!("invalid parameter {}: {}", first.parameter, first.issue);
            if let Some(range) = first.valid_range {
                msg.push_str(&format!(" (valid range {}-{})", range.min, range.max));
            }
            if errors.len() > 1 {
                msg.push_str(&format!(" (and {} more)", errors.len() - 1));
            }
            msg
        }
        None => "invalid parameters".to_string(),
    }
}

impl ValidationErrors {
    fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Check a single roll
pub fn validate(params: &RollParameters) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    check_roll(params, "", &mut errors);
    ValidationErrors { errors }.into_result()
}

/// Check a batch: the list bounds, the repeat count, and each entry
pub fn validate_batch(rolls: &[RollParameters], count: u32) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if rolls.is_empty() || rolls.len() > MAX_BATCH_ROLLS {
        errors.push(
            FieldError::new(
                "rolls",
                format!("must list between 1 and {} rolls", MAX_BATCH_ROLLS),
            )
            .with_range(ValidRange::new(1, MAX_BATCH_ROLLS as i64)),
        );
    }
    if !(1..=MAX_BATCH_COUNT).contains(&count) {
        errors.push(
            FieldError::new("count", format!("must be between 1 and {}", MAX_BATCH_COUNT))
                .with_range(ValidRange::new(1, MAX_BATCH_COUNT)),
        );
    }

    let bounds_ok = errors.is_empty();
    for (i, params) in rolls.iter().enumerate() {
        check_roll(params, &format!("rolls[{}].", i), &mut errors);
    }

    if bounds_ok {
        let per_list: u64 = rolls.iter().map(|r| u64::from(r.dice_count)).sum();
        if per_list > MAX_BATCH_DICE {
            errors.push(FieldError::new(
                "rolls",
                format!(
                    "lists {} dice in total, more than the batch limit of {}",
                    per_list, MAX_BATCH_DICE
                ),
            ));
        } else if per_list * u64::from(count) > MAX_BATCH_DICE {
            let max_count = (MAX_BATCH_DICE / per_list.max(1)).max(1) as i64;
            errors.push(
                FieldError::new(
                    "count",
                    format!(
                        "would roll {} dice, more than the batch limit of {}",
                        per_list * u64::from(count),
                        MAX_BATCH_DICE
                    ),
                )
                .with_range(ValidRange::new(1, max_count)),
            );
        }
    }

    ValidationErrors { errors }.into_result()
}

fn check_roll(params: &RollParameters, prefix: &str, errors: &mut Vec<FieldError>) {
    let name = |field: &str| format!("{}{}", prefix, field);
    let count = params.dice_count;
    let sides = params.dice_sides;

    let count_ok = (MIN_DICE_COUNT..=MAX_DICE_COUNT).contains(&count);
    if !count_ok {
        errors.push(
            FieldError::new(
                name("dice_count"),
                format!("must be between {} and {}", MIN_DICE_COUNT, MAX_DICE_COUNT),
            )
            .with_range(ValidRange::new(MIN_DICE_COUNT, MAX_DICE_COUNT)),
        );
    }
    let sides_ok = (MIN_DICE_SIDES..=MAX_DICE_SIDES).contains(&sides);
    if !sides_ok {
        errors.push(
            FieldError::new(
                name("dice_sides"),
                format!("must be between {} and {}", MIN_DICE_SIDES, MAX_DICE_SIDES),
            )
            .with_range(ValidRange::new(MIN_DICE_SIDES, MAX_DICE_SIDES)),
        );
    }

    let selection_fields = [
        ("keep_highest", params.keep_highest),
        ("keep_lowest", params.keep_lowest),
        ("drop_highest", params.drop_highest),
        ("drop_lowest", params.drop_lowest),
    ];
    let set: Vec<&str> = selection_fields
        .iter()
        .filter(|(_, v)| v.is_some())
        .map(|(field, _)| *field)
        .collect();
    if set.len() > 1 {
        errors.push(FieldError::new(
            name(set[1]),
            format!(
                "cannot be combined with {}; use only one keep or drop option",
                set[0]
            ),
        ));
    }

    for (field, value) in selection_fields {
        let Some(n) = value else { continue };
        let keeping = field.starts_with("keep");
        // keeping all dice is allowed, dropping all of them is not
        let max = if keeping { count } else { count.saturating_sub(1) };
        if n == 0 || (count_ok && n > max) {
            let issue = if keeping {
                "must be at least 1 and no more than dice_count"
            } else {
                "must be at least 1 and less than dice_count"
            };
            let mut err = FieldError::new(name(field), issue);
            if count_ok && max >= 1 {
                err = err.with_range(ValidRange::new(1, max));
            }
            errors.push(err);
        }
    }

    for v in params.reroll_values() {
        if *v == 0 || (sides_ok && *v > sides) {
            errors.push(
                FieldError::new(
                    name("reroll"),
                    format!("value {} must be between 1 and dice_sides", v),
                )
                .with_range(ValidRange::new(1, sides.max(1))),
            );
        }
    }

    if let Some(modifier) = params.modifier {
        if !(-MAX_MODIFIER..=MAX_MODIFIER).contains(&modifier) {
            errors.push(
                FieldError::new(
                    name("modifier"),
                    format!("must be between {} and {}", -MAX_MODIFIER, MAX_MODIFIER),
                )
                .with_range(ValidRange::new(-MAX_MODIFIER, MAX_MODIFIER)),
            );
        }
    }

    for (field, value) in [
        ("target_number", params.target_number),
        ("min_value", params.min_value),
    ] {
        let Some(v) = value else { continue };
        if v == 0 || (sides_ok && v > sides) {
            errors.push(
                FieldError::new(name(field), "must be between 1 and dice_sides")
                    .with_range(ValidRange::new(1, sides.max(1))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_of(errors: &ValidationErrors) -> Vec<&str> {
        errors.errors.iter().map(|e| e.parameter.as_str()).collect()
    }

    #[test]
    fn test_valid_rolls() {
        assert!(validate(&RollParameters::new(1, 1)).is_ok());
        assert!(validate(&RollParameters::new(1000, 100)).is_ok());
        assert!(validate(&RollParameters::new(4, 6).keep_highest(4)).is_ok());
        assert!(validate(&RollParameters::new(4, 6).drop_lowest(3)).is_ok());
        assert!(validate(
            &RollParameters::new(5, 10)
                .with_reroll([1, 10])
                .exploding()
                .with_min_value(10)
                .with_target(10)
                .with_modifier(-100)
        )
        .is_ok());
    }

    #[test]
    fn test_dice_count_range() {
        let err = validate(&RollParameters::new(0, 6)).unwrap_err();
        assert_eq!(params_of(&err), vec!["dice_count"]);
        assert_eq!(err.errors[0].valid_range, Some(ValidRange::new(1, 1000)));

        let err = validate(&RollParameters::new(1001, 6)).unwrap_err();
        assert_eq!(params_of(&err), vec!["dice_count"]);
        assert!(err.to_string().contains("dice_count"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_dice_sides_range() {
        let err = validate(&RollParameters::new(1, 101)).unwrap_err();
        assert_eq!(params_of(&err), vec!["dice_sides"]);
        assert_eq!(err.errors[0].valid_range, Some(ValidRange::new(1, 100)));
    }

    #[test]
    fn test_reports_every_violation() {
        let err = validate(&RollParameters::new(0, 0)).unwrap_err();
        assert_eq!(params_of(&err), vec!["dice_count", "dice_sides"]);
        assert!(err.to_string().contains("and 1 more"));
    }

    #[test]
    fn test_keep_bounds() {
        let err = validate(&RollParameters::new(4, 6).keep_highest(5)).unwrap_err();
        assert_eq!(params_of(&err), vec!["keep_highest"]);
        assert_eq!(err.errors[0].valid_range, Some(ValidRange::new(1, 4)));

        let err = validate(&RollParameters::new(4, 6).keep_lowest(0)).unwrap_err();
        assert_eq!(params_of(&err), vec!["keep_lowest"]);
    }

    #[test]
    fn test_drop_bounds() {
        let err = validate(&RollParameters::new(4, 6).drop_highest(4)).unwrap_err();
        assert_eq!(params_of(&err), vec!["drop_highest"]);
        assert_eq!(err.errors[0].valid_range, Some(ValidRange::new(1, 3)));

        // a single die can never drop anything
        let err = validate(&RollParameters::new(1, 6).drop_lowest(1)).unwrap_err();
        assert_eq!(params_of(&err), vec!["drop_lowest"]);
        assert_eq!(err.errors[0].valid_range, None);
    }

    #[test]
    fn test_selection_exclusive() {
        let err =
            validate(&RollParameters::new(4, 6).keep_highest(3).keep_lowest(1)).unwrap_err();
        assert_eq!(params_of(&err), vec!["keep_lowest"]);

        let err =
            validate(&RollParameters::new(4, 6).keep_highest(3).drop_lowest(1)).unwrap_err();
        assert_eq!(params_of(&err), vec!["drop_lowest"]);
        assert!(err.errors[0].issue.contains("keep_highest"));
    }

    #[test]
    fn test_reroll_values() {
        let err = validate(&RollParameters::new(2, 6).with_reroll([0, 3, 7])).unwrap_err();
        assert_eq!(params_of(&err), vec!["reroll", "reroll"]);
        assert!(err.errors[0].issue.contains('0'));
        assert!(err.errors[1].issue.contains('7'));
    }

    #[test]
    fn test_target_and_min_value() {
        let err = validate(&RollParameters::new(2, 6).with_target(7).with_min_value(0))
            .unwrap_err();
        assert_eq!(params_of(&err), vec!["target_number", "min_value"]);
        assert_eq!(err.errors[0].valid_range, Some(ValidRange::new(1, 6)));
    }

    #[test]
    fn test_target_with_selection_allowed() {
        assert!(validate(&RollParameters::new(4, 10).with_target(7).keep_highest(2)).is_ok());
    }

    #[test]
    fn test_batch_bounds() {
        let err = validate_batch(&[], 1).unwrap_err();
        assert_eq!(params_of(&err), vec!["rolls"]);

        let err = validate_batch(&[RollParameters::new(1, 6)], 0).unwrap_err();
        assert_eq!(params_of(&err), vec!["count"]);

        let err = validate_batch(&[RollParameters::new(1, 6)], MAX_BATCH_COUNT + 1).unwrap_err();
        assert_eq!(params_of(&err), vec!["count"]);

        let many = vec![RollParameters::new(1, 6); MAX_BATCH_ROLLS + 1];
        assert!(validate_batch(&many, 1).is_err());
    }

    #[test]
    fn test_batch_dice_limit() {
        // 20 x 1000 dice in one list
        let heavy = vec![RollParameters::new(1000, 100).exploding(); 20];
        let err = validate_batch(&heavy, 1).unwrap_err();
        assert_eq!(params_of(&err), vec!["rolls"]);
        assert!(err.errors[0].valid_range.is_none());

        // 2000 dice per list, so at most 5 repeats
        let rolls = vec![RollParameters::new(1000, 6), RollParameters::new(1000, 6)];
        assert!(validate_batch(&rolls, 5).is_ok());
        let err = validate_batch(&rolls, 6).unwrap_err();
        assert_eq!(params_of(&err), vec!["count"]);
        assert_eq!(err.errors[0].valid_range, Some(ValidRange::new(1, 5)));
        assert!(err.errors[0].issue.contains("12000"));
    }

    #[test]
    fn test_modifier_bounds() {
        assert!(validate(&RollParameters::new(1, 6).with_modifier(MAX_MODIFIER)).is_ok());
        assert!(validate(&RollParameters::new(1, 6).with_modifier(-MAX_MODIFIER)).is_ok());

        let err = validate(&RollParameters::new(1, 6).with_modifier(i64::MAX)).unwrap_err();
        assert_eq!(params_of(&err), vec!["modifier"]);
        assert_eq!(
            err.errors[0].valid_range,
            Some(ValidRange::new(-MAX_MODIFIER, MAX_MODIFIER))
        );

        let err = validate(&RollParameters::new(1, 6).with_modifier(i64::MIN)).unwrap_err();
        assert_eq!(params_of(&err), vec!["modifier"]);
    }

    #[test]
    fn test_batch_entry_prefix() {
        let rolls = [RollParameters::new(1, 6), RollParameters::new(2, 200)];
        let err = validate_batch(&rolls, 2).unwrap_err();
        assert_eq!(params_of(&err), vec!["rolls[1].dice_sides"]);
    }

    #[test]
    fn test_serialized_shape() {
        let err = validate(&RollParameters::new(0, 6)).unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["errors"][0]["parameter"], "dice_count");
        assert_eq!(json["errors"][0]["valid_range"]["max"], 1000);
    }
}
