//! Dice service
//!
//! Validates requests, runs the engine against the process random source and
//! wraps results with the echoed parameters and a timestamp. Every transport
//! goes through here.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dice::{
    self, DieSource, RngSource, RollParameters, RollResult, ValidationErrors,
};

/// Single roll plus its request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollEnvelope {
    pub parameters: RollParameters,
    pub result: RollResult,
    pub timestamp: DateTime<Utc>,
}

/// Batch of rolls plus its request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub rolls: Vec<RollParameters>,
    pub count: u32,
    pub results: Vec<RollResult>,
    pub timestamp: DateTime<Utc>,
}

/// Random source shared by all requests
enum Entropy {
    Thread,
    Seeded(Mutex<StdRng>),
}

/// Entry point for rolling on behalf of a caller
pub struct DiceService {
    entropy: Entropy,
}

impl Default for DiceService {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DiceService {
    /// Create a service; a seed makes the sequence of rolls reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let entropy = match seed {
            Some(seed) => Entropy::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
            None => Entropy::Thread,
        };
        Self { entropy }
    }

    pub fn is_seeded(&self) -> bool {
        matches!(self.entropy, Entropy::Seeded(_))
    }

    fn with_source<T>(&self, f: impl FnOnce(&mut dyn DieSource) -> T) -> T {
        match &self.entropy {
            Entropy::Thread => f(&mut RngSource::thread()),
            Entropy::Seeded(rng) => {
                let mut rng = rng.lock();
                f(&mut RngSource::new(&mut *rng))
            }
        }
    }

    /// Validate and perform a single roll
    pub fn roll(&self, params: RollParameters) -> Result<RollEnvelope, ValidationErrors> {
        dice::validate(&params)?;

        let result = self.with_source(|source| dice::roll(&params, source));
        debug!(notation = %result.notation, total = result.total, "roll");

        Ok(RollEnvelope {
            parameters: params,
            result,
            timestamp: Utc::now(),
        })
    }

    /// Validate and perform a batch; `count` defaults to 1
    pub fn roll_batch(
        &self,
        rolls: Vec<RollParameters>,
        count: Option<u32>,
    ) -> Result<BatchEnvelope, ValidationErrors> {
        let count = count.unwrap_or(1);
        dice::validate_batch(&rolls, count)?;

        let results = self.with_source(|source| dice::roll_batch(&rolls, count, source));
        debug!(entries = rolls.len(), count, results = results.len(), "batch");

        Ok(BatchEnvelope {
            rolls,
            count,
            results,
            timestamp: Utc::now(),
        })
    }
}
