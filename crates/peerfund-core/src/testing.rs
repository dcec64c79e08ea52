//! Shared fixtures for unit tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::ledger::{BudgetPolicy, InvestmentRequest};
use crate::memory::{Dataset, MemoryStore};
use crate::model::*;
use crate::traits::Store;

/// Course `c1` with assignment `a1`, `teams` teams of `per_team` students
/// (`s1`, `s2`, ...), each team with a submitted submission.
pub fn course(teams: usize, per_team: usize) -> Dataset {
    let mut data = Dataset {
        assignments: vec![Assignment {
            id: "a1".into(),
            course_id: "c1".into(),
            name: "Project 1".into(),
        }],
        ..Default::default()
    };

    let base = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    let mut student = 0;
    for t in 1..=teams {
        let mut members = Vec::new();
        for _ in 0..per_team {
            student += 1;
            let id = format!("s{student}");
            data.enrollments.push(Enrollment {
                course_id: "c1".into(),
                student_id: id.clone(),
                active: true,
            });
            members.push(id);
        }
        data.teams.push(Team {
            id: format!("t{t}"),
            course_id: "c1".into(),
            name: format!("Team {t}"),
            members,
        });
        data.submissions.push(Submission {
            id: format!("sub-t{t}"),
            assignment_id: "a1".into(),
            team_id: format!("t{t}"),
            status: SubmissionStatus::Submitted,
            submitted_at: base + Duration::minutes(t as i64),
        });
    }
    data
}

pub fn request(investor: &str, team: &str, tokens: u32) -> InvestmentRequest {
    InvestmentRequest {
        assignment_id: "a1".into(),
        investor_id: investor.into(),
        team_id: team.into(),
        tokens,
        incomplete: false,
        comment: String::new(),
    }
}

pub fn evaluation(evaluator: &str, team: &str) -> EvaluationAssignment {
    let now = Utc::now();
    EvaluationAssignment {
        id: Uuid::new_v4(),
        assignment_id: "a1".into(),
        evaluator_id: evaluator.into(),
        team_id: team.into(),
        status: EvaluationStatus::Assigned,
        start_at: now,
        due_at: now + Duration::days(7),
        created_at: now,
    }
}

pub fn investment(investor: &str, team: &str, tokens: u32) -> Investment {
    Investment {
        id: Uuid::new_v4(),
        assignment_id: "a1".into(),
        investor_id: investor.into(),
        team_id: team.into(),
        tokens,
        incomplete: false,
        comment: String::new(),
        created_at: Utc::now(),
    }
}

/// Wraps a [`MemoryStore`] and fails selected reads.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Teams whose investment reads fail.
    pub failing_teams: HashSet<String>,
    /// Students whose investment reads fail.
    pub failing_students: HashSet<String>,
    /// Every roster read fails as unreachable.
    pub unavailable: bool,
    /// Team lookups that fail as unreachable.
    pub unreachable_teams: HashSet<String>,
}

impl FlakyStore {
    pub fn new(data: Dataset) -> Self {
        Self {
            inner: MemoryStore::from_dataset(data),
            ..Default::default()
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(EngineError::StoreUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn assignment(&self, assignment_id: &str) -> Result<Option<Assignment>> {
        self.check_available()?;
        self.inner.assignment(assignment_id).await
    }

    async fn active_students(&self, course_id: &str) -> Result<Vec<String>> {
        self.check_available()?;
        self.inner.active_students(course_id).await
    }

    async fn teams(&self, course_id: &str) -> Result<Vec<Team>> {
        self.check_available()?;
        self.inner.teams(course_id).await
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>> {
        if self.unreachable_teams.contains(team_id) {
            return Err(EngineError::StoreUnavailable("connection reset".into()));
        }
        self.inner.team(team_id).await
    }

    async fn submitted_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>> {
        self.check_available()?;
        self.inner.submitted_submissions(assignment_id).await
    }

    async fn evaluation_assignments(
        &self,
        assignment_id: Option<&str>,
    ) -> Result<Vec<EvaluationAssignment>> {
        self.check_available()?;
        self.inner.evaluation_assignments(assignment_id).await
    }

    async fn insert_evaluation_assignments(
        &self,
        records: Vec<EvaluationAssignment>,
    ) -> Result<usize> {
        self.inner.insert_evaluation_assignments(records).await
    }

    async fn delete_evaluation_assignments(&self, ids: &[Uuid]) -> Result<usize> {
        self.inner.delete_evaluation_assignments(ids).await
    }

    async fn complete_evaluation(
        &self,
        assignment_id: &str,
        evaluator_id: &str,
        team_id: &str,
    ) -> Result<bool> {
        self.inner
            .complete_evaluation(assignment_id, evaluator_id, team_id)
            .await
    }

    async fn team_evaluations(&self) -> Result<Vec<TeamEvaluation>> {
        self.inner.team_evaluations().await
    }

    async fn delete_team_evaluations(&self, ids: &[Uuid]) -> Result<usize> {
        self.inner.delete_team_evaluations(ids).await
    }

    async fn investments(&self, assignment_id: &str) -> Result<Vec<Investment>> {
        self.inner.investments(assignment_id).await
    }

    async fn investments_in_team(
        &self,
        assignment_id: &str,
        team_id: &str,
    ) -> Result<Vec<Investment>> {
        if self.failing_teams.contains(team_id) {
            return Err(EngineError::Store(format!("read timed out for {team_id}")));
        }
        self.inner.investments_in_team(assignment_id, team_id).await
    }

    async fn investments_by(
        &self,
        assignment_id: &str,
        investor_id: &str,
    ) -> Result<Vec<Investment>> {
        if self.failing_students.contains(investor_id) {
            return Err(EngineError::Store(format!("read timed out for {investor_id}")));
        }
        self.inner.investments_by(assignment_id, investor_id).await
    }

    async fn append_investment(
        &self,
        investment: Investment,
        policy: &BudgetPolicy,
    ) -> Result<Investment> {
        self.inner.append_investment(investment, policy).await
    }

    async fn grades(&self, assignment_id: &str) -> Result<Vec<Grade>> {
        self.inner.grades(assignment_id).await
    }

    async fn grade(&self, assignment_id: &str, team_id: &str) -> Result<Option<Grade>> {
        self.inner.grade(assignment_id, team_id).await
    }

    async fn upsert_grade(&self, grade: Grade) -> Result<Grade> {
        self.inner.upsert_grade(grade).await
    }

    async fn replace_interest_record(&self, record: InterestRecord) -> Result<()> {
        self.inner.replace_interest_record(record).await
    }

    async fn interest_records(
        &self,
        assignment_id: &str,
        student_id: Option<&str>,
    ) -> Result<Vec<InterestRecord>> {
        self.inner.interest_records(assignment_id, student_id).await
    }
}
