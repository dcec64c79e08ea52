//! Interest calculator.
//!
//! Each investment earns `tokens × rate`, where the rate depends on the tier
//! the invested team ended up in. Records are replaced on every run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::engine::ProgressReporter;
use crate::error::{EngineError, Result};
use crate::grading::SkippedItem;
use crate::model::{Grade, InterestRecord, Team, Tier};
use crate::traits::Store;

/// Interest rate per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestRates {
    pub high: Decimal,
    pub median: Decimal,
    pub low: Decimal,
    pub incomplete: Decimal,
}

impl Default for InterestRates {
    fn default() -> Self {
        Self {
            high: Decimal::new(20, 2),
            median: Decimal::new(10, 2),
            low: Decimal::new(5, 2),
            incomplete: Decimal::ZERO,
        }
    }
}

impl InterestRates {
    pub fn rate_for(&self, tier: Tier) -> Decimal {
        match tier {
            Tier::High => self.high,
            Tier::Median => self.median,
            Tier::Low => self.low,
            Tier::Incomplete => self.incomplete,
        }
    }
}

/// One student's interest for an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInterest {
    pub student_id: String,
    pub assignment_id: String,
    pub total_interest: Decimal,
    pub records: Vec<InterestRecord>,
}

/// Outcome of computing interest for a whole roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestReport {
    pub assignment_id: String,
    pub students: Vec<StudentInterest>,
    pub skipped: Vec<SkippedItem>,
}

impl InterestReport {
    pub fn total_interest(&self) -> Decimal {
        self.students.iter().map(|s| s.total_interest).sum()
    }
}

/// Grades and teams of an assignment, read once per run.
struct Standing {
    course_id: String,
    grades: HashMap<String, Grade>,
    teams: HashMap<String, Team>,
}

impl Standing {
    async fn load(store: &dyn Store, assignment_id: &str) -> Result<Self> {
        let assignment = store
            .assignment(assignment_id)
            .await?
            .ok_or_else(|| EngineError::AssignmentNotFound(assignment_id.to_string()))?;
        let grades = store
            .grades(assignment_id)
            .await?
            .into_iter()
            .map(|g| (g.team_id.clone(), g))
            .collect();
        let teams = store
            .teams(&assignment.course_id)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        Ok(Self {
            course_id: assignment.course_id,
            grades,
            teams,
        })
    }

    /// Tier used for interest; ungraded teams count as incomplete.
    fn tier_of(&self, team_id: &str) -> Tier {
        self.grades
            .get(team_id)
            .map(Grade::effective_tier)
            .unwrap_or(Tier::Incomplete)
    }

    fn is_member(&self, team_id: &str, student_id: &str) -> bool {
        self.teams
            .get(team_id)
            .is_some_and(|t| t.has_member(student_id))
    }
}

/// Computes and stores interest records.
#[derive(Debug, Clone)]
pub struct InterestCalculator {
    rates: InterestRates,
    parallelism: usize,
}

impl InterestCalculator {
    pub fn new(rates: InterestRates, parallelism: usize) -> Self {
        Self {
            rates,
            parallelism: parallelism.max(1),
        }
    }

    /// Compute and store interest for one student.
    pub async fn calculate_student_interest(
        &self,
        store: &dyn Store,
        student_id: &str,
        assignment_id: &str,
    ) -> Result<StudentInterest> {
        let standing = Standing::load(store, assignment_id).await?;
        self.student_interest(store, &standing, student_id, assignment_id, Utc::now())
            .await
    }

    /// Compute and store interest for every active student in the course.
    ///
    /// Students whose records cannot be read or written are skipped.
    pub async fn calculate_interest(
        &self,
        store: &dyn Store,
        assignment_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<InterestReport> {
        let start = Instant::now();
        let standing = Standing::load(store, assignment_id).await?;
        let students = store.active_students(&standing.course_id).await?;
        if students.is_empty() {
            return Err(EngineError::EmptyBatch {
                operation: "interest",
                assignment_id: assignment_id.to_string(),
            });
        }

        let now = Utc::now();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let standing = &standing;
        let mut futures = FuturesUnordered::new();
        for student_id in &students {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = self
                    .student_interest(store, standing, student_id, assignment_id, now)
                    .await;
                (student_id, result)
            });
        }

        let mut computed = Vec::with_capacity(students.len());
        let mut skipped = Vec::new();
        while let Some((student_id, result)) = futures.next().await {
            match result {
                Ok(interest) => {
                    progress.on_item_complete(student_id);
                    computed.push(interest);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("skipping interest for {student_id} in {assignment_id}: {e}");
                    progress.on_item_skipped(student_id, &e.to_string());
                    skipped.push(SkippedItem {
                        id: student_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        drop(futures);

        computed.sort_by(|a, b| a.student_id.cmp(&b.student_id));

        let elapsed = start.elapsed();
        progress.on_batch_complete(students.len(), computed.len(), skipped.len(), elapsed);
        tracing::info!(
            "computed interest for {} students in {assignment_id} ({} skipped) in {}ms",
            computed.len(),
            skipped.len(),
            elapsed.as_millis()
        );

        Ok(InterestReport {
            assignment_id: assignment_id.to_string(),
            students: computed,
            skipped,
        })
    }

    async fn student_interest(
        &self,
        store: &dyn Store,
        standing: &Standing,
        student_id: &str,
        assignment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StudentInterest> {
        let investments = store.investments_by(assignment_id, student_id).await?;

        let mut records = Vec::with_capacity(investments.len());
        for investment in &investments {
            if standing.is_member(&investment.team_id, student_id) {
                tracing::warn!(
                    "no interest for self-investment {} by {student_id}",
                    investment.id
                );
                continue;
            }
            let tier = standing.tier_of(&investment.team_id);
            let rate = self.rates.rate_for(tier);
            let record = InterestRecord {
                student_id: student_id.to_string(),
                assignment_id: assignment_id.to_string(),
                team_id: investment.team_id.clone(),
                tokens_invested: investment.tokens,
                tier,
                rate,
                interest: Decimal::from(investment.tokens) * rate,
                calculated_at: now,
            };
            store.replace_interest_record(record.clone()).await?;
            records.push(record);
        }

        let total_interest = records.iter().map(|r| r.interest).sum();
        tracing::debug!("{student_id} earned {total_interest} interest in {assignment_id}");
        Ok(StudentInterest {
            student_id: student_id.to_string(),
            assignment_id: assignment_id.to_string(),
            total_interest,
            records,
        })
    }
}
