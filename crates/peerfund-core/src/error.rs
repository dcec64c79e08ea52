//! Engine error types.
//!
//! Validation errors are rejected at the call boundary and never partially
//! applied. Store errors are classified so batch code can decide whether to
//! skip one item or abort the whole operation.

use thiserror::Error;

/// Convenience alias used across the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// A request rejected before anything was written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Evaluations per student outside the allowed range.
    #[error("evaluations per student must be between {min} and {max}, got {requested}")]
    EvaluationCount { requested: u32, min: u32, max: u32 },

    /// Evaluation window start is not before its due date.
    #[error("evaluation window must start before it is due")]
    WindowOrder,

    /// Due date already passed at distribution time.
    #[error("evaluation due date is in the past")]
    DueInPast,

    /// Due date beyond the configured horizon.
    #[error("evaluation due date is more than {max_days} days away")]
    WindowTooFar { max_days: i64 },

    /// Not enough submitted teams to give everyone non-self targets.
    #[error("need at least {required} submitted teams, found {available}")]
    NotEnoughTeams { required: usize, available: usize },

    /// Token amount outside `0..=max`.
    #[error("token amount {tokens} is outside 0..={max}")]
    TokensOutOfRange { tokens: u32, max: u32 },

    /// Total tokens would exceed the per-assignment budget.
    #[error("investing {requested} tokens would exceed the budget of {budget} ({spent} already spent)")]
    BudgetExceeded {
        requested: u32,
        spent: u32,
        budget: u32,
    },

    /// Investor already backs the maximum number of teams.
    #[error("cannot invest in more than {limit} teams per assignment")]
    TooManyTeams { limit: usize },

    /// Investor is a member of the team.
    #[error("{investor_id} cannot invest in their own team {team_id}")]
    SelfInvestment { investor_id: String, team_id: String },

    /// Investor already invested in this team.
    #[error("{investor_id} already invested in team {team_id}")]
    DuplicateInvestment { investor_id: String, team_id: String },

    /// Evaluator is a member of the team.
    #[error("{evaluator_id} cannot evaluate their own team {team_id}")]
    SelfEvaluation {
        evaluator_id: String,
        team_id: String,
    },

    /// Team has no submitted submission for the assignment.
    #[error("team {team_id} has no submission for assignment {assignment_id}")]
    NoSubmission {
        assignment_id: String,
        team_id: String,
    },

    /// Investor was not assigned to evaluate this team.
    #[error("{investor_id} was not assigned to evaluate team {team_id}")]
    NotAssigned { investor_id: String, team_id: String },
}

/// Errors returned by engine operations and stores.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The assignment does not exist.
    #[error("assignment not found: {0}")]
    AssignmentNotFound(String),

    /// The team does not exist.
    #[error("team not found: {0}")]
    TeamNotFound(String),

    /// Backing store unreachable; the whole operation fails.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A single store read or write failed.
    #[error("store error: {0}")]
    Store(String),

    /// A batch had no items to process.
    #[error("nothing to {operation} for assignment {assignment_id}")]
    EmptyBatch {
        operation: &'static str,
        assignment_id: String,
    },
}

impl EngineError {
    /// Returns `true` if the request was rejected by validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }

    /// Returns `true` if the error should abort a whole batch rather than
    /// skip one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::StoreUnavailable(_))
    }

    /// The validation reason, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            EngineError::Validation(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let v: EngineError = ValidationError::DueInPast.into();
        assert!(v.is_validation());
        assert!(!v.is_fatal());

        let fatal = EngineError::StoreUnavailable("connection refused".into());
        assert!(fatal.is_fatal());
        assert!(!fatal.is_validation());

        assert!(!EngineError::Store("read failed".into()).is_fatal());
    }

    #[test]
    fn messages_are_descriptive() {
        let err = ValidationError::BudgetExceeded {
            requested: 30,
            spent: 80,
            budget: 100,
        };
        assert_eq!(
            err.to_string(),
            "investing 30 tokens would exceed the budget of 100 (80 already spent)"
        );
        let wrapped: EngineError = err.clone().into();
        assert_eq!(wrapped.to_string(), err.to_string());
        assert_eq!(wrapped.validation(), Some(&err));
    }
}
