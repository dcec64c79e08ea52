//! The storage seam between the engine and the external services.
//!
//! The roster, submission, and investment services are owned elsewhere; the
//! engine sees them through this async trait. `MemoryStore` implements it in
//! process and `peerfund-store` adds durability on top.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::ledger::BudgetPolicy;
use crate::model::{
    Assignment, EvaluationAssignment, Grade, InterestRecord, Investment, Submission, Team,
    TeamEvaluation,
};

/// Read/write access to the records the engine consumes and owns.
#[async_trait]
pub trait Store: Send + Sync {
    // -----------------------------------------------------------------------
    // Roster and submissions (read-only)
    // -----------------------------------------------------------------------

    /// Look up an assignment.
    async fn assignment(&self, assignment_id: &str) -> Result<Option<Assignment>>;

    /// Student ids with an active enrollment in the course, in roster order.
    async fn active_students(&self, course_id: &str) -> Result<Vec<String>>;

    /// All teams of a course.
    async fn teams(&self, course_id: &str) -> Result<Vec<Team>>;

    /// Look up a team.
    async fn team(&self, team_id: &str) -> Result<Option<Team>>;

    /// Submissions in state `submitted` for the assignment.
    async fn submitted_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>>;

    // -----------------------------------------------------------------------
    // Evaluation records
    // -----------------------------------------------------------------------

    /// Evaluation assignments, optionally scoped to one assignment.
    async fn evaluation_assignments(
        &self,
        assignment_id: Option<&str>,
    ) -> Result<Vec<EvaluationAssignment>>;

    /// Insert new evaluation assignments. Returns the number inserted.
    async fn insert_evaluation_assignments(
        &self,
        records: Vec<EvaluationAssignment>,
    ) -> Result<usize>;

    /// Delete evaluation assignments by id. Returns the number deleted.
    async fn delete_evaluation_assignments(&self, ids: &[Uuid]) -> Result<usize>;

    /// Mark the evaluator's assignment for the team as completed.
    /// Returns `false` when no such assignment exists.
    async fn complete_evaluation(
        &self,
        assignment_id: &str,
        evaluator_id: &str,
        team_id: &str,
    ) -> Result<bool>;

    /// All team-level evaluation records.
    async fn team_evaluations(&self) -> Result<Vec<TeamEvaluation>>;

    /// Delete team-level evaluation records by id. Returns the number deleted.
    async fn delete_team_evaluations(&self, ids: &[Uuid]) -> Result<usize>;

    // -----------------------------------------------------------------------
    // Investment ledger
    // -----------------------------------------------------------------------

    /// All investments for the assignment.
    async fn investments(&self, assignment_id: &str) -> Result<Vec<Investment>>;

    /// Investments directed at one team.
    async fn investments_in_team(&self, assignment_id: &str, team_id: &str)
        -> Result<Vec<Investment>>;

    /// Investments made by one student.
    async fn investments_by(&self, assignment_id: &str, investor_id: &str)
        -> Result<Vec<Investment>>;

    /// Admit and insert an investment.
    ///
    /// Implementations must run [`BudgetPolicy::admit`] against the investor's
    /// current investments and insert the record as one atomic step, so two
    /// concurrent requests from the same student cannot both pass the check.
    async fn append_investment(
        &self,
        investment: Investment,
        policy: &BudgetPolicy,
    ) -> Result<Investment>;

    // -----------------------------------------------------------------------
    // Grades (owned by the grading engine)
    // -----------------------------------------------------------------------

    /// All grades for the assignment.
    async fn grades(&self, assignment_id: &str) -> Result<Vec<Grade>>;

    /// The grade of one team.
    async fn grade(&self, assignment_id: &str, team_id: &str) -> Result<Option<Grade>>;

    /// Insert or overwrite the grade for (assignment, team).
    ///
    /// Computed fields are replaced; an existing `review` is kept.
    async fn upsert_grade(&self, grade: Grade) -> Result<Grade>;

    // -----------------------------------------------------------------------
    // Interest (owned by the interest calculator)
    // -----------------------------------------------------------------------

    /// Delete any record for the same (student, assignment, team) and insert
    /// this one.
    async fn replace_interest_record(&self, record: InterestRecord) -> Result<()>;

    /// Interest records for the assignment, optionally for one student.
    async fn interest_records(
        &self,
        assignment_id: &str,
        student_id: Option<&str>,
    ) -> Result<Vec<InterestRecord>>;
}
