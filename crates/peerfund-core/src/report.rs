//! Evaluation status report with JSON persistence.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ledger::BudgetPolicy;
use crate::model::EvaluationStatus;
use crate::traits::Store;

/// Evaluation progress of every active student in an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub assignment_id: String,
    /// When the report was created.
    pub generated_at: DateTime<Utc>,
    /// Token budget each student started with.
    pub budget: u32,
    pub students: Vec<StudentProgress>,
}

/// One student's row in a [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProgress {
    pub student_id: String,
    /// Evaluation assignments handed out.
    pub assigned: usize,
    /// Evaluation assignments completed by an investment.
    pub completed: usize,
    /// Distinct teams invested in.
    pub teams_invested: usize,
    pub tokens_spent: u32,
    pub tokens_remaining: u32,
}

impl StudentProgress {
    pub fn is_done(&self) -> bool {
        self.assigned > 0 && self.completed >= self.assigned
    }
}

impl StatusReport {
    /// Students who completed every assigned evaluation.
    pub fn finished(&self) -> usize {
        self.students.iter().filter(|s| s.is_done()).count()
    }

    pub fn tokens_spent(&self) -> u32 {
        self.students.iter().map(|s| s.tokens_spent).sum()
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: StatusReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[derive(Default)]
struct Tally<'a> {
    assigned: usize,
    completed: usize,
    teams: HashSet<&'a str>,
    tokens: u32,
}

/// Aggregate evaluation assignments and investments per active student.
pub async fn evaluation_status(
    store: &dyn Store,
    assignment_id: &str,
    budget: &BudgetPolicy,
) -> Result<StatusReport> {
    let assignment = store
        .assignment(assignment_id)
        .await?
        .ok_or_else(|| EngineError::AssignmentNotFound(assignment_id.to_string()))?;
    let students = store.active_students(&assignment.course_id).await?;
    let evaluations = store.evaluation_assignments(Some(assignment_id)).await?;
    let investments = store.investments(assignment_id).await?;

    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for e in &evaluations {
        let tally = tallies.entry(e.evaluator_id.as_str()).or_default();
        tally.assigned += 1;
        if e.status == EvaluationStatus::Completed {
            tally.completed += 1;
        }
    }
    for i in &investments {
        let tally = tallies.entry(i.investor_id.as_str()).or_default();
        tally.teams.insert(i.team_id.as_str());
        tally.tokens += i.tokens;
    }

    let students = students
        .iter()
        .map(|student_id| {
            let tally = tallies.remove(student_id.as_str()).unwrap_or_default();
            StudentProgress {
                student_id: student_id.clone(),
                assigned: tally.assigned,
                completed: tally.completed,
                teams_invested: tally.teams.len(),
                tokens_spent: tally.tokens,
                tokens_remaining: budget.budget.saturating_sub(tally.tokens),
            }
        })
        .collect();

    Ok(StatusReport {
        assignment_id: assignment_id.to_string(),
        generated_at: Utc::now(),
        budget: budget.budget,
        students,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::{course, evaluation, investment};

    #[tokio::test]
    async fn aggregates_per_student() {
        let mut data = course(3, 1);
        let mut done = evaluation("s1", "t2");
        done.status = EvaluationStatus::Completed;
        data.evaluation_assignments = vec![done, evaluation("s1", "t3"), evaluation("s2", "t1")];
        data.investments = vec![investment("s1", "t2", 40), investment("s1", "t3", 15)];
        let store = MemoryStore::from_dataset(data);

        let report = evaluation_status(&store, "a1", &BudgetPolicy::default())
            .await
            .unwrap();
        assert_eq!(report.students.len(), 3);

        let s1 = &report.students[0];
        assert_eq!(s1.assigned, 2);
        assert_eq!(s1.completed, 1);
        assert_eq!(s1.teams_invested, 2);
        assert_eq!(s1.tokens_spent, 55);
        assert_eq!(s1.tokens_remaining, 45);

        let s3 = &report.students[2];
        assert_eq!(s3.assigned, 0);
        assert_eq!(s3.tokens_remaining, 100);
        assert_eq!(report.finished(), 0);
    }

    #[tokio::test]
    async fn unknown_assignment() {
        let store = MemoryStore::from_dataset(course(2, 1));
        let err = evaluation_status(&store, "nope", &BudgetPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AssignmentNotFound(_)));
    }

    #[tokio::test]
    async fn json_roundtrip() {
        let store = MemoryStore::from_dataset(course(2, 1));
        let report = evaluation_status(&store, "a1", &BudgetPolicy::default())
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");

        report.save_json(&path).unwrap();
        let loaded = StatusReport::load_json(&path).unwrap();
        assert_eq!(loaded.assignment_id, "a1");
        assert_eq!(loaded.students, report.students);
    }
}
