use std::cmp::Ordering;

use super::domain::ApplicationRecord;

/// Order applications for review: highest final score first, earliest submission on ties.
pub fn rank(mut records: Vec<ApplicationRecord>) -> Vec<ApplicationRecord> {
    records.sort_by(compare);
    records
}

/// Advisory pick for assignment: the best-ranked application still competing.
pub fn default_candidate(records: &[ApplicationRecord]) -> Option<&ApplicationRecord> {
    records
        .iter()
        .filter(|record| record.status.is_candidate())
        .min_by(|left, right| compare(left, right))
}

fn compare(left: &ApplicationRecord, right: &ApplicationRecord) -> Ordering {
    right
        .score
        .final_score
        .total_cmp(&left.score.final_score)
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}
