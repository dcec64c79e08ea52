//! Core data model types for peerfund.
//!
//! These are the records the engine reads from the roster, submission, and
//! investment services, and the Grade / InterestRecord rows it owns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A gradable unit of work belonging to a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier for this assignment.
    pub id: String,
    /// Course the assignment belongs to.
    pub course_id: String,
    /// Human-readable name.
    pub name: String,
}

/// A student's enrollment in a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: String,
    pub student_id: String,
    /// Dropped students stay on file but are not evaluated.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// A group of students sharing one submission per assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier for this team.
    pub id: String,
    /// Course the team belongs to.
    pub course_id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Member student ids, in roster order.
    pub members: Vec<String>,
}

impl Team {
    /// Returns `true` if the student is on this team.
    pub fn has_member(&self, student_id: &str) -> bool {
        self.members.iter().any(|m| m == student_id)
    }

    /// Returns `true` if the two teams share at least one member.
    pub fn overlaps(&self, other: &Team) -> bool {
        self.members.iter().any(|m| other.has_member(m))
    }
}

/// Lifecycle state of a team submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
}

/// A team's submission for an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub team_id: String,
    pub status: SubmissionStatus,
    /// When the submission was handed in.
    pub submitted_at: DateTime<Utc>,
}

/// Status of a distributed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Assigned,
    Completed,
}

/// One evaluator assigned to review one team for an assignment.
///
/// The evaluator is never a member of the evaluated team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationAssignment {
    pub id: Uuid,
    pub assignment_id: String,
    /// Student doing the evaluation.
    pub evaluator_id: String,
    /// Team being evaluated.
    pub team_id: String,
    pub status: EvaluationStatus,
    /// Start of the evaluation window.
    pub start_at: DateTime<Utc>,
    /// Due date of the evaluation window.
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A team-level evaluation record: one team reviewing another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEvaluation {
    pub id: Uuid,
    pub assignment_id: String,
    pub evaluator_team_id: String,
    pub team_id: String,
}

/// Tokens a student allocated to a peer team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: Uuid,
    pub assignment_id: String,
    pub investor_id: String,
    /// Team receiving the tokens.
    pub team_id: String,
    pub tokens: u32,
    /// Investor flagged the submission as incomplete.
    #[serde(default)]
    pub incomplete: bool,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Discrete performance bucket derived from relative investment ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Median,
    Low,
    Incomplete,
}

impl Tier {
    /// Ordering strength: higher is better.
    pub fn strength(self) -> u8 {
        match self {
            Tier::High => 3,
            Tier::Median => 2,
            Tier::Low => 1,
            Tier::Incomplete => 0,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::High => write!(f, "high"),
            Tier::Median => write!(f, "median"),
            Tier::Low => write!(f, "low"),
            Tier::Incomplete => write!(f, "incomplete"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Tier::High),
            "median" | "medium" => Ok(Tier::Median),
            "low" => Ok(Tier::Low),
            "incomplete" => Ok(Tier::Incomplete),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Manual override applied by the external review layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReview {
    /// Tier computed by the engine when the override was first made.
    pub original_tier: Tier,
    /// Percentage computed by the engine when the override was first made.
    pub original_percentage: u32,
    pub tier: Tier,
    pub percentage: u32,
    #[serde(default)]
    pub reason: String,
}

/// One grade row per (assignment, team).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub assignment_id: String,
    pub team_id: String,
    pub submission_id: String,
    /// Trimmed mean of the tokens invested in the team.
    pub average_investment: f64,
    pub tier: Tier,
    pub percentage: u32,
    /// Number of investments the average was computed from.
    pub investment_count: usize,
    /// Investments that flagged the submission as incomplete.
    #[serde(default)]
    pub incomplete_flags: usize,
    /// Manual override, never written by the grading engine.
    #[serde(default)]
    pub review: Option<GradeReview>,
    pub graded_at: DateTime<Utc>,
}

impl Grade {
    /// Tier after any manual review.
    pub fn effective_tier(&self) -> Tier {
        self.review.as_ref().map(|r| r.tier).unwrap_or(self.tier)
    }

    /// Percentage after any manual review.
    pub fn effective_percentage(&self) -> u32 {
        self.review
            .as_ref()
            .map(|r| r.percentage)
            .unwrap_or(self.percentage)
    }
}

/// Interest earned by one investment, one row per (student, assignment, team).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestRecord {
    pub student_id: String,
    pub assignment_id: String,
    pub team_id: String,
    pub tokens_invested: u32,
    /// Team tier at the time of calculation.
    pub tier: Tier,
    pub rate: Decimal,
    pub interest: Decimal,
    pub calculated_at: DateTime<Utc>,
}
