//! Grading engine.
//!
//! Reduces the investments each submitted team received to a trimmed mean,
//! ranks teams against each other, and upserts one Grade per team.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::engine::ProgressReporter;
use crate::error::{EngineError, Result};
use crate::model::{Grade, Investment, Submission, Team, Tier};
use crate::statistics::{assign_tiers, trimmed_mean, TeamScore, TieBreak};
use crate::traits::Store;

/// Percentages per tier and the ranking tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingPolicy {
    pub tie_break: TieBreak,
    pub high_percentage: u32,
    pub median_percentage: u32,
    pub low_percentage: u32,
    pub incomplete_percentage: u32,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::default(),
            high_percentage: 100,
            median_percentage: 80,
            low_percentage: 60,
            incomplete_percentage: 0,
        }
    }
}

impl GradingPolicy {
    pub fn percentage(&self, tier: Tier) -> u32 {
        match tier {
            Tier::High => self.high_percentage,
            Tier::Median => self.median_percentage,
            Tier::Low => self.low_percentage,
            Tier::Incomplete => self.incomplete_percentage,
        }
    }
}

/// A batch item that was logged and skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub id: String,
    pub reason: String,
}

/// Outcome of grading one assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    pub assignment_id: String,
    /// Grades written in this run, in submission order.
    pub grades: Vec<Grade>,
    pub skipped: Vec<SkippedItem>,
}

impl GradingReport {
    pub fn graded(&self) -> usize {
        self.grades.len()
    }
}

/// Computes and stores team grades.
#[derive(Debug, Clone)]
pub struct GradingEngine {
    policy: GradingPolicy,
    parallelism: usize,
}

struct TeamInput<'s> {
    submission: &'s Submission,
    team: Team,
    investments: Vec<Investment>,
}

async fn read_team(
    store: &dyn Store,
    assignment_id: &str,
    team_id: &str,
) -> Result<(Team, Vec<Investment>)> {
    let team = store
        .team(team_id)
        .await?
        .ok_or_else(|| EngineError::TeamNotFound(team_id.to_string()))?;
    let investments = store.investments_in_team(assignment_id, team_id).await?;
    Ok((team, investments))
}

impl GradingEngine {
    pub fn new(policy: GradingPolicy, parallelism: usize) -> Self {
        Self {
            policy,
            parallelism: parallelism.max(1),
        }
    }

    /// Grade every team with a submitted submission for the assignment.
    ///
    /// A team whose data cannot be read is skipped and left out of the
    /// ranking; the rest of the batch continues. An unreachable store or an
    /// assignment without submissions fails the whole call.
    pub async fn grade_assignment(
        &self,
        store: &dyn Store,
        assignment_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<GradingReport> {
        let start = Instant::now();

        if store.assignment(assignment_id).await?.is_none() {
            return Err(EngineError::AssignmentNotFound(assignment_id.to_string()));
        }

        let submissions = latest_per_team(store.submitted_submissions(assignment_id).await?);
        if submissions.is_empty() {
            return Err(EngineError::EmptyBatch {
                operation: "grade",
                assignment_id: assignment_id.to_string(),
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut futures = FuturesUnordered::new();
        for submission in &submissions {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = read_team(store, assignment_id, &submission.team_id).await;
                (submission, result)
            });
        }

        let mut inputs = Vec::new();
        let mut skipped = Vec::new();
        while let Some((submission, result)) = futures.next().await {
            match result {
                Ok((team, investments)) => inputs.push(TeamInput {
                    submission,
                    team,
                    investments,
                }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("skipping team {} in {assignment_id}: {e}", submission.team_id);
                    progress.on_item_skipped(&submission.team_id, &e.to_string());
                    skipped.push(SkippedItem {
                        id: submission.team_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        drop(futures);

        inputs.sort_by(|a, b| {
            a.submission
                .submitted_at
                .cmp(&b.submission.submitted_at)
                .then_with(|| a.submission.id.cmp(&b.submission.id))
        });

        let mut scores = Vec::with_capacity(inputs.len());
        let mut counted = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let tokens: Vec<u32> = input
                .investments
                .iter()
                .filter(|i| !input.team.has_member(&i.investor_id))
                .map(|i| i.tokens)
                .collect();
            let ignored = input.investments.len() - tokens.len();
            if ignored > 0 {
                tracing::warn!(
                    "ignoring {ignored} self-investments in team {} for {assignment_id}",
                    input.team.id
                );
            }
            let flags = input
                .investments
                .iter()
                .filter(|i| i.incomplete && !input.team.has_member(&i.investor_id))
                .count();

            scores.push(TeamScore {
                team_id: input.team.id.clone(),
                submission_id: input.submission.id.clone(),
                submitted_at: input.submission.submitted_at,
                average: trimmed_mean(&tokens),
            });
            counted.push((tokens.len(), flags));
        }

        let tiers = assign_tiers(&scores, self.policy.tie_break);
        let graded_at = Utc::now();

        let mut grades = Vec::with_capacity(scores.len());
        for ((score, tier), (count, flags)) in scores.into_iter().zip(tiers).zip(counted) {
            let team_id = score.team_id.clone();
            let grade = Grade {
                assignment_id: assignment_id.to_string(),
                team_id: score.team_id,
                submission_id: score.submission_id,
                average_investment: score.average.unwrap_or(0.0),
                tier,
                percentage: self.policy.percentage(tier),
                investment_count: count,
                incomplete_flags: flags,
                review: None,
                graded_at,
            };
            match store.upsert_grade(grade).await {
                Ok(stored) => {
                    tracing::debug!(
                        "graded {team_id}: avg {:.2} -> {} ({}%)",
                        stored.average_investment,
                        stored.tier,
                        stored.percentage
                    );
                    progress.on_item_complete(&team_id);
                    grades.push(stored);
                }
                Err(e) => {
                    tracing::warn!("failed to store grade for {team_id}: {e}");
                    progress.on_item_skipped(&team_id, &e.to_string());
                    skipped.push(SkippedItem {
                        id: team_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        progress.on_batch_complete(grades.len() + skipped.len(), grades.len(), skipped.len(), elapsed);
        tracing::info!(
            "graded {} teams for {assignment_id} ({} skipped) in {}ms",
            grades.len(),
            skipped.len(),
            elapsed.as_millis()
        );

        Ok(GradingReport {
            assignment_id: assignment_id.to_string(),
            grades,
            skipped,
        })
    }
}

/// Keep one submission per team, the most recent one.
fn latest_per_team(mut submissions: Vec<Submission>) -> Vec<Submission> {
    submissions.sort_by(|a, b| {
        a.team_id
            .cmp(&b.team_id)
            .then_with(|| b.submitted_at.cmp(&a.submitted_at))
    });
    submissions.dedup_by(|later, earlier| later.team_id == earlier.team_id);
    submissions
}
