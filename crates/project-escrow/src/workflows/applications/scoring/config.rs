use serde::{Deserialize, Serialize};

use super::ScoringError;

/// Blend weights applied when folding signals into a final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Relative weight of the signal-derived auto score.
    pub auto_weight: f32,
    /// Relative weight of the portfolio review score.
    pub portfolio_weight: f32,
    /// Share (0-1) of the final score taken by manual reviewer scores when any are present.
    pub manual_weight: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            auto_weight: 0.7,
            portfolio_weight: 0.3,
            manual_weight: 0.4,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ScoringError> {
        for (name, weight) in [
            ("auto_weight", self.auto_weight),
            ("portfolio_weight", self.portfolio_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringError::InvalidWeight { name });
            }
        }
        if self.auto_weight + self.portfolio_weight <= 0.0 {
            return Err(ScoringError::InvalidWeight {
                name: "auto_weight + portfolio_weight",
            });
        }
        if !(0.0..=1.0).contains(&self.manual_weight) {
            return Err(ScoringError::InvalidWeight {
                name: "manual_weight",
            });
        }
        Ok(())
    }
}
