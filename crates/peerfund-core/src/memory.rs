//! In-process store backed by a serializable [`Dataset`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::ledger::BudgetPolicy;
use crate::model::{
    Assignment, Enrollment, EvaluationAssignment, EvaluationStatus, Grade, InterestRecord,
    Investment, Submission, SubmissionStatus, Team, TeamEvaluation,
};
use crate::traits::Store;

/// Every record the engine reads or writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub assignments: Vec<Assignment>,
    pub enrollments: Vec<Enrollment>,
    pub teams: Vec<Team>,
    pub submissions: Vec<Submission>,
    pub evaluation_assignments: Vec<EvaluationAssignment>,
    pub team_evaluations: Vec<TeamEvaluation>,
    pub investments: Vec<Investment>,
    pub grades: Vec<Grade>,
    pub interest_records: Vec<InterestRecord>,
}

/// A [`Store`] holding everything in memory behind one lock.
///
/// Investment admission takes the write lock for both the budget check and
/// the insert.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Dataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(data: Dataset) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> Dataset {
        self.data.read().await.clone()
    }

    /// Swap in new contents wholesale.
    pub async fn replace(&self, data: Dataset) {
        *self.data.write().await = data;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn assignment(&self, assignment_id: &str) -> Result<Option<Assignment>> {
        let data = self.data.read().await;
        Ok(data
            .assignments
            .iter()
            .find(|a| a.id == assignment_id)
            .cloned())
    }

    async fn active_students(&self, course_id: &str) -> Result<Vec<String>> {
        let data = self.data.read().await;
        let mut students: Vec<String> = Vec::new();
        for e in &data.enrollments {
            if e.course_id == course_id && e.active && !students.contains(&e.student_id) {
                students.push(e.student_id.clone());
            }
        }
        Ok(students)
    }

    async fn teams(&self, course_id: &str) -> Result<Vec<Team>> {
        let data = self.data.read().await;
        Ok(data
            .teams
            .iter()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>> {
        let data = self.data.read().await;
        Ok(data.teams.iter().find(|t| t.id == team_id).cloned())
    }

    async fn submitted_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>> {
        let data = self.data.read().await;
        Ok(data
            .submissions
            .iter()
            .filter(|s| s.assignment_id == assignment_id && s.status == SubmissionStatus::Submitted)
            .cloned()
            .collect())
    }

    async fn evaluation_assignments(
        &self,
        assignment_id: Option<&str>,
    ) -> Result<Vec<EvaluationAssignment>> {
        let data = self.data.read().await;
        Ok(data
            .evaluation_assignments
            .iter()
            .filter(|e| assignment_id.map_or(true, |id| e.assignment_id == id))
            .cloned()
            .collect())
    }

    async fn insert_evaluation_assignments(
        &self,
        records: Vec<EvaluationAssignment>,
    ) -> Result<usize> {
        let mut data = self.data.write().await;
        let count = records.len();
        data.evaluation_assignments.extend(records);
        Ok(count)
    }

    async fn delete_evaluation_assignments(&self, ids: &[Uuid]) -> Result<usize> {
        let mut data = self.data.write().await;
        let before = data.evaluation_assignments.len();
        data.evaluation_assignments.retain(|e| !ids.contains(&e.id));
        Ok(before - data.evaluation_assignments.len())
    }

    async fn complete_evaluation(
        &self,
        assignment_id: &str,
        evaluator_id: &str,
        team_id: &str,
    ) -> Result<bool> {
        let mut data = self.data.write().await;
        let mut found = false;
        for e in data.evaluation_assignments.iter_mut().filter(|e| {
            e.assignment_id == assignment_id && e.evaluator_id == evaluator_id && e.team_id == team_id
        }) {
            e.status = EvaluationStatus::Completed;
            found = true;
        }
        Ok(found)
    }

    async fn team_evaluations(&self) -> Result<Vec<TeamEvaluation>> {
        Ok(self.data.read().await.team_evaluations.clone())
    }

    async fn delete_team_evaluations(&self, ids: &[Uuid]) -> Result<usize> {
        let mut data = self.data.write().await;
        let before = data.team_evaluations.len();
        data.team_evaluations.retain(|e| !ids.contains(&e.id));
        Ok(before - data.team_evaluations.len())
    }

    async fn investments(&self, assignment_id: &str) -> Result<Vec<Investment>> {
        let data = self.data.read().await;
        Ok(data
            .investments
            .iter()
            .filter(|i| i.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn investments_in_team(
        &self,
        assignment_id: &str,
        team_id: &str,
    ) -> Result<Vec<Investment>> {
        let data = self.data.read().await;
        Ok(data
            .investments
            .iter()
            .filter(|i| i.assignment_id == assignment_id && i.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn investments_by(
        &self,
        assignment_id: &str,
        investor_id: &str,
    ) -> Result<Vec<Investment>> {
        let data = self.data.read().await;
        Ok(data
            .investments
            .iter()
            .filter(|i| i.assignment_id == assignment_id && i.investor_id == investor_id)
            .cloned()
            .collect())
    }

    async fn append_investment(
        &self,
        investment: Investment,
        policy: &BudgetPolicy,
    ) -> Result<Investment> {
        let mut data = self.data.write().await;

        let team = data
            .teams
            .iter()
            .find(|t| t.id == investment.team_id)
            .ok_or_else(|| EngineError::TeamNotFound(investment.team_id.clone()))?;

        let existing: Vec<Investment> = data
            .investments
            .iter()
            .filter(|i| {
                i.assignment_id == investment.assignment_id
                    && i.investor_id == investment.investor_id
            })
            .cloned()
            .collect();

        policy.admit(team, &existing, &investment)?;
        data.investments.push(investment.clone());
        Ok(investment)
    }

    async fn grades(&self, assignment_id: &str) -> Result<Vec<Grade>> {
        let data = self.data.read().await;
        Ok(data
            .grades
            .iter()
            .filter(|g| g.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn grade(&self, assignment_id: &str, team_id: &str) -> Result<Option<Grade>> {
        let data = self.data.read().await;
        Ok(data
            .grades
            .iter()
            .find(|g| g.assignment_id == assignment_id && g.team_id == team_id)
            .cloned())
    }

    async fn upsert_grade(&self, mut grade: Grade) -> Result<Grade> {
        let mut data = self.data.write().await;
        let position = data
            .grades
            .iter()
            .position(|g| g.assignment_id == grade.assignment_id && g.team_id == grade.team_id);
        match position {
            Some(index) => {
                let existing = &mut data.grades[index];
                grade.review = existing.review.take();
                *existing = grade.clone();
            }
            None => data.grades.push(grade.clone()),
        }
        Ok(grade)
    }

    async fn replace_interest_record(&self, record: InterestRecord) -> Result<()> {
        let mut data = self.data.write().await;
        data.interest_records.retain(|r| {
            !(r.student_id == record.student_id
                && r.assignment_id == record.assignment_id
                && r.team_id == record.team_id)
        });
        data.interest_records.push(record);
        Ok(())
    }

    async fn interest_records(
        &self,
        assignment_id: &str,
        student_id: Option<&str>,
    ) -> Result<Vec<InterestRecord>> {
        let data = self.data.read().await;
        Ok(data
            .interest_records
            .iter()
            .filter(|r| {
                r.assignment_id == assignment_id && student_id.map_or(true, |s| r.student_id == s)
            })
            .cloned()
            .collect())
    }
}
