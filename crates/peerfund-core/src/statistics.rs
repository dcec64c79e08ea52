//! Trimmed-mean scoring and proportional tier ranking.
//!
//! A team's score is the mean of the tokens invested in it after discarding
//! one lowest and one highest investment. Teams are then ranked by score and
//! split into thirds.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Tier;

/// Mean of the investments with one minimum and one maximum discarded.
///
/// Fewer than three values are averaged as-is. Returns `None` for an empty
/// slice. When several values tie at an extreme only one of them is dropped.
pub fn trimmed_mean(tokens: &[u32]) -> Option<f64> {
    let n = tokens.len();
    if n == 0 {
        return None;
    }

    let sum: u64 = tokens.iter().map(|&t| t as u64).sum();
    if n < 3 {
        return Some(sum as f64 / n as f64);
    }

    // Both extremes exist because n >= 3.
    let min = tokens.iter().copied().min().unwrap_or(0) as u64;
    let max = tokens.iter().copied().max().unwrap_or(0) as u64;
    Some((sum - min - max) as f64 / (n - 2) as f64)
}

/// How teams with equal averages are ordered before splitting into thirds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earlier submission first, then submission id.
    #[default]
    SubmissionOrder,
    /// Lexicographic team id.
    TeamId,
}

/// A team's score going into ranking.
#[derive(Debug, Clone)]
pub struct TeamScore {
    pub team_id: String,
    pub submission_id: String,
    pub submitted_at: DateTime<Utc>,
    /// `None` when nobody invested in the team.
    pub average: Option<f64>,
}

impl TieBreak {
    fn compare(self, a: &TeamScore, b: &TeamScore) -> Ordering {
        match self {
            TieBreak::SubmissionOrder => a
                .submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.submission_id.cmp(&b.submission_id)),
            TieBreak::TeamId => a.team_id.cmp(&b.team_id),
        }
    }
}

/// Tier for the team at `position` (0 = best) out of `ranked` teams.
///
/// Positions map to thirds via `position * 3 / ranked`, so with a count not
/// divisible by three the upper groups get the extra teams.
pub fn tier_for_position(position: usize, ranked: usize) -> Tier {
    if ranked == 0 {
        return Tier::Incomplete;
    }
    match position * 3 / ranked {
        0 => Tier::High,
        1 => Tier::Median,
        _ => Tier::Low,
    }
}

/// Assign a tier to every score, returned in input order.
///
/// Teams without an average are always `Incomplete` and do not take a rank
/// position.
pub fn assign_tiers(scores: &[TeamScore], tie_break: TieBreak) -> Vec<Tier> {
    let mut ranked: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.average.map(|avg| (i, avg)))
        .collect();

    ranked.sort_by(|(ia, a), (ib, b)| {
        b.total_cmp(a)
            .then_with(|| tie_break.compare(&scores[*ia], &scores[*ib]))
    });

    let mut tiers = vec![Tier::Incomplete; scores.len()];
    let count = ranked.len();
    for (position, (index, _)) in ranked.into_iter().enumerate() {
        tiers[index] = tier_for_position(position, count);
    }
    tiers
}
