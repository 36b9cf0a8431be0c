use super::config::ScoringConfig;
use super::{ScoreComponent, ScoreFactor, ScoreSignals};

const SKILL_WEIGHT: f32 = 0.40;
const RATING_WEIGHT: f32 = 0.25;
const ON_TIME_WEIGHT: f32 = 0.20;
const REWORK_WEIGHT: f32 = 0.15;

/// Fold the delivery signals into the 0-100 auto score, keeping each contribution.
pub(crate) fn auto_score(signals: &ScoreSignals) -> (f32, Vec<ScoreComponent>) {
    let components = vec![
        ScoreComponent {
            factor: ScoreFactor::SkillMatch,
            contribution: SKILL_WEIGHT * signals.skill_match,
            notes: format!("skill match {:.0}/100", signals.skill_match),
        },
        ScoreComponent {
            factor: ScoreFactor::Rating,
            contribution: RATING_WEIGHT * signals.rating_score,
            notes: format!("rating history {:.0}/100", signals.rating_score),
        },
        ScoreComponent {
            factor: ScoreFactor::OnTimeDelivery,
            contribution: ON_TIME_WEIGHT * signals.on_time_rate * 100.0,
            notes: format!("{:.0}% delivered on time", signals.on_time_rate * 100.0),
        },
        ScoreComponent {
            factor: ScoreFactor::Rework,
            contribution: REWORK_WEIGHT * (1.0 - signals.rework_rate) * 100.0,
            notes: format!("{:.0}% of deliveries reworked", signals.rework_rate * 100.0),
        },
    ];

    let total = components
        .iter()
        .map(|component| component.contribution)
        .sum::<f32>();
    (total.clamp(0.0, 100.0), components)
}

/// Combine auto, portfolio, and any manual scores into the ranking value.
pub(crate) fn final_score(
    config: &ScoringConfig,
    auto_score: f32,
    portfolio_score: f32,
    manual_scores: &[f32],
) -> f32 {
    let machine = (config.auto_weight * auto_score + config.portfolio_weight * portfolio_score)
        / (config.auto_weight + config.portfolio_weight);

    let blended = if manual_scores.is_empty() {
        machine
    } else {
        let manual = manual_scores.iter().sum::<f32>() / manual_scores.len() as f32;
        (1.0 - config.manual_weight) * machine + config.manual_weight * manual
    };

    round_tenth(blended.clamp(0.0, 100.0))
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
