//! Tool descriptors and `tools/call` dispatch

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::RpcError;
use crate::dice::{
    RollParameters, MAX_BATCH_COUNT, MAX_BATCH_ROLLS, MAX_DICE_COUNT, MAX_DICE_SIDES,
    MAX_MODIFIER, MIN_DICE_COUNT, MIN_DICE_SIDES,
};
use crate::service::DiceService;

pub const ROLL_DICE: &str = "roll_dice";
pub const ROLL_MULTIPLE_DICE: &str = "roll_multiple_dice";

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BatchArguments {
    rolls: Vec<RollParameters>,
    #[serde(default)]
    count: Option<u32>,
}

/// Handle a `tools/call` request
pub fn call(service: &DiceService, params: Option<&Value>) -> Result<Value, RpcError> {
    let call: ToolCall = parse(params.cloned().unwrap_or(Value::Null))?;
    let arguments = call.arguments.unwrap_or_else(|| json!({}));

    let envelope = match call.name.as_str() {
        ROLL_DICE => {
            let params: RollParameters = parse(arguments)?;
            to_value(&service.roll(params)?)?
        }
        ROLL_MULTIPLE_DICE => {
            let args: BatchArguments = parse(arguments)?;
            to_value(&service.roll_batch(args.rolls, args.count)?)?
        }
        other => return Err(RpcError::UnknownTool(other.to_string())),
    };

    let text = envelope.to_string();
    Ok(json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": envelope,
        "isError": false,
    }))
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::InvalidArguments(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|_| RpcError::Internal)
}

fn roll_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "dice_count": {
                "type": "integer", "minimum": MIN_DICE_COUNT, "maximum": MAX_DICE_COUNT,
                "description": "Number of dice to roll"
            },
            "dice_sides": {
                "type": "integer", "minimum": MIN_DICE_SIDES, "maximum": MAX_DICE_SIDES,
                "description": "Number of sides per die"
            },
            "modifier": {
                "type": "integer", "minimum": -MAX_MODIFIER, "maximum": MAX_MODIFIER,
                "description": "Added to the total after all other operations"
            },
            "keep_highest": { "type": "integer", "minimum": 1, "description": "Keep the N highest dice" },
            "keep_lowest": { "type": "integer", "minimum": 1, "description": "Keep the N lowest dice" },
            "drop_highest": { "type": "integer", "minimum": 1, "description": "Drop the N highest dice" },
            "drop_lowest": { "type": "integer", "minimum": 1, "description": "Drop the N lowest dice" },
            "reroll": {
                "type": "array", "items": { "type": "integer", "minimum": 1 },
                "description": "Initial values that are rerolled once"
            },
            "exploding": {
                "type": "boolean",
                "description": "Roll again whenever a die shows its maximum"
            },
            "target_number": {
                "type": "integer", "minimum": 1,
                "description": "Count dice meeting this value instead of summing"
            },
            "min_value": { "type": "integer", "minimum": 1, "description": "Lowest value any die can count as" },
            "label": { "type": "string", "description": "Free-form label echoed in the result" }
        },
        "required": ["dice_count", "dice_sides"]
    })
}

/// Descriptors returned by `tools/list`
pub fn descriptors() -> Value {
    json!([
        {
            "name": ROLL_DICE,
            "description": "Roll dice with optional keep/drop, rerolls, exploding dice, \
                            minimum values, target numbers and a modifier",
            "inputSchema": roll_schema(),
        },
        {
            "name": ROLL_MULTIPLE_DICE,
            "description": "Roll a list of dice expressions, optionally repeating the whole list",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "rolls": {
                        "type": "array", "minItems": 1, "maxItems": MAX_BATCH_ROLLS,
                        "items": roll_schema()
                    },
                    "count": {
                        "type": "integer", "minimum": 1, "maximum": MAX_BATCH_COUNT,
                        "description": "Times to repeat the whole list"
                    }
                },
                "required": ["rolls"]
            },
        }
    ])
}
