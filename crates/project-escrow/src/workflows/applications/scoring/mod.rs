//! Scoring model turning applicant signals into a single ranking value.

mod config;
mod rules;

pub use config::ScoringConfig;

use serde::{Deserialize, Serialize};

/// Raw signals supplied by the profile collaborator at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSignals {
    /// 0-100
    pub skill_match: f32,
    /// 0-100
    pub rating_score: f32,
    /// 0-1
    pub on_time_rate: f32,
    /// 0-1
    pub rework_rate: f32,
    /// 0-100
    pub portfolio_score: f32,
}

/// Score value object stored with every application.
///
/// Everything except the two manual fields is fixed at submission; each manual field may be
/// written once by its role, which recomputes `final_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub auto_score: f32,
    pub portfolio_score: f32,
    pub manual_partner_score: Option<f32>,
    pub manual_supervisor_score: Option<f32>,
    pub skill_match: f32,
    pub rating_score: f32,
    pub on_time_rate: f32,
    pub rework_rate: f32,
    pub final_score: f32,
}

impl Score {
    fn manual_scores(&self) -> Vec<f32> {
        self.manual_partner_score
            .into_iter()
            .chain(self.manual_supervisor_score)
            .collect()
    }
}

/// Which reviewer a manual score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualScorer {
    Partner,
    Supervisor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    SkillMatch,
    Rating,
    OnTimeDelivery,
    Rework,
    Portfolio,
    ManualReview,
}

/// Discrete contribution to a score, allowing transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub contribution: f32,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("{signal} must be between {min} and {max} (found {value})")]
    OutOfRange {
        signal: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{name} is not a usable weight")]
    InvalidWeight { name: &'static str },
    #[error("{0:?} manual score already recorded")]
    ManualScoreAlreadySet(ManualScorer),
}

/// Stateless evaluator applying the blend configuration.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Validate the signals and compute the initial score (no manual input yet).
    pub fn score(&self, signals: &ScoreSignals) -> Result<Score, ScoringError> {
        check_range("skill_match", signals.skill_match, 100.0)?;
        check_range("rating_score", signals.rating_score, 100.0)?;
        check_range("on_time_rate", signals.on_time_rate, 1.0)?;
        check_range("rework_rate", signals.rework_rate, 1.0)?;
        check_range("portfolio_score", signals.portfolio_score, 100.0)?;

        let (auto_score, _) = rules::auto_score(signals);
        let final_score =
            rules::final_score(&self.config, auto_score, signals.portfolio_score, &[]);

        Ok(Score {
            auto_score,
            portfolio_score: signals.portfolio_score,
            manual_partner_score: None,
            manual_supervisor_score: None,
            skill_match: signals.skill_match,
            rating_score: signals.rating_score,
            on_time_rate: signals.on_time_rate,
            rework_rate: signals.rework_rate,
            final_score,
        })
    }

    /// Record a reviewer's manual score; each reviewer role gets exactly one write.
    pub fn with_manual(
        &self,
        score: &Score,
        scorer: ManualScorer,
        value: f32,
    ) -> Result<Score, ScoringError> {
        check_range("manual_score", value, 100.0)?;

        let mut updated = score.clone();
        let slot = match scorer {
            ManualScorer::Partner => &mut updated.manual_partner_score,
            ManualScorer::Supervisor => &mut updated.manual_supervisor_score,
        };
        if slot.is_some() {
            return Err(ScoringError::ManualScoreAlreadySet(scorer));
        }
        *slot = Some(value);

        updated.final_score = rules::final_score(
            &self.config,
            updated.auto_score,
            updated.portfolio_score,
            &updated.manual_scores(),
        );
        Ok(updated)
    }

    /// Per-factor breakdown of a stored score for audit views.
    pub fn breakdown(&self, score: &Score) -> Vec<ScoreComponent> {
        let signals = ScoreSignals {
            skill_match: score.skill_match,
            rating_score: score.rating_score,
            on_time_rate: score.on_time_rate,
            rework_rate: score.rework_rate,
            portfolio_score: score.portfolio_score,
        };
        let (_, mut components) = rules::auto_score(&signals);
        components.push(ScoreComponent {
            factor: ScoreFactor::Portfolio,
            contribution: score.portfolio_score,
            notes: format!(
                "portfolio review weighted {:.2} against auto {:.2}",
                self.config.portfolio_weight, self.config.auto_weight
            ),
        });

        let manual = score.manual_scores();
        if !manual.is_empty() {
            let average = manual.iter().sum::<f32>() / manual.len() as f32;
            components.push(ScoreComponent {
                factor: ScoreFactor::ManualReview,
                contribution: average,
                notes: format!(
                    "{} manual score(s) carrying {:.0}% of the final score",
                    manual.len(),
                    self.config.manual_weight * 100.0
                ),
            });
        }
        components
    }
}

fn check_range(signal: &'static str, value: f32, max: f32) -> Result<(), ScoringError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(ScoringError::OutOfRange {
            signal,
            value,
            min: 0.0,
            max,
        })
    }
}
