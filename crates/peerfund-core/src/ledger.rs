//! Investment write path.
//!
//! Every investment passes the budget policy before it is stored: token range,
//! no self-investment, one investment per team, a cap on distinct teams, and a
//! per-assignment token budget. The store runs [`BudgetPolicy::admit`] and the
//! insert under one lock.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result, ValidationError};
use crate::model::{Investment, Team};
use crate::traits::Store;

/// Limits applied to each student's investments in one assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetPolicy {
    /// Most tokens a single investment may carry.
    pub max_tokens_per_investment: u32,
    /// Total tokens a student may invest per assignment.
    pub budget: u32,
    /// Distinct teams a student may invest in per assignment.
    pub max_teams: usize,
    /// Only accept investments in teams the student was assigned to evaluate.
    pub require_distributed_target: bool,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            max_tokens_per_investment: 50,
            budget: 100,
            max_teams: 3,
            require_distributed_target: false,
        }
    }
}

impl BudgetPolicy {
    /// Reject token amounts outside `0..=max_tokens_per_investment`.
    pub fn check_amount(&self, tokens: u32) -> Result<(), ValidationError> {
        if tokens > self.max_tokens_per_investment {
            return Err(ValidationError::TokensOutOfRange {
                tokens,
                max: self.max_tokens_per_investment,
            });
        }
        Ok(())
    }

    /// Decide whether `candidate` may be added next to `existing`.
    ///
    /// `existing` should hold the investor's investments for the assignment;
    /// rows for other investors or assignments are ignored.
    pub fn admit(
        &self,
        team: &Team,
        existing: &[Investment],
        candidate: &Investment,
    ) -> Result<(), ValidationError> {
        self.check_amount(candidate.tokens)?;

        if team.has_member(&candidate.investor_id) {
            return Err(ValidationError::SelfInvestment {
                investor_id: candidate.investor_id.clone(),
                team_id: team.id.clone(),
            });
        }

        let own: Vec<&Investment> = existing
            .iter()
            .filter(|i| {
                i.investor_id == candidate.investor_id
                    && i.assignment_id == candidate.assignment_id
            })
            .collect();

        if own.iter().any(|i| i.team_id == candidate.team_id) {
            return Err(ValidationError::DuplicateInvestment {
                investor_id: candidate.investor_id.clone(),
                team_id: candidate.team_id.clone(),
            });
        }

        let teams: HashSet<&str> = own.iter().map(|i| i.team_id.as_str()).collect();
        if teams.len() >= self.max_teams {
            return Err(ValidationError::TooManyTeams {
                limit: self.max_teams,
            });
        }

        let spent: u32 = own.iter().map(|i| i.tokens).sum();
        if spent + candidate.tokens > self.budget {
            return Err(ValidationError::BudgetExceeded {
                requested: candidate.tokens,
                spent,
                budget: self.budget,
            });
        }

        Ok(())
    }
}

/// A request to invest tokens in a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentRequest {
    pub assignment_id: String,
    pub investor_id: String,
    pub team_id: String,
    pub tokens: u32,
    #[serde(default)]
    pub incomplete: bool,
    #[serde(default)]
    pub comment: String,
}

/// Validate and record an investment, then complete the matching evaluation.
pub async fn record_investment(
    store: &dyn Store,
    request: InvestmentRequest,
    policy: &BudgetPolicy,
) -> Result<Investment> {
    policy.check_amount(request.tokens)?;

    if store.assignment(&request.assignment_id).await?.is_none() {
        return Err(EngineError::AssignmentNotFound(request.assignment_id));
    }
    if store.team(&request.team_id).await?.is_none() {
        return Err(EngineError::TeamNotFound(request.team_id));
    }

    let submitted = store.submitted_submissions(&request.assignment_id).await?;
    if !submitted.iter().any(|s| s.team_id == request.team_id) {
        return Err(ValidationError::NoSubmission {
            assignment_id: request.assignment_id,
            team_id: request.team_id,
        }
        .into());
    }

    if policy.require_distributed_target {
        let assigned = store
            .evaluation_assignments(Some(&request.assignment_id))
            .await?
            .iter()
            .any(|e| e.evaluator_id == request.investor_id && e.team_id == request.team_id);
        if !assigned {
            return Err(ValidationError::NotAssigned {
                investor_id: request.investor_id,
                team_id: request.team_id,
            }
            .into());
        }
    }

    let investment = Investment {
        id: Uuid::new_v4(),
        assignment_id: request.assignment_id,
        investor_id: request.investor_id,
        team_id: request.team_id,
        tokens: request.tokens,
        incomplete: request.incomplete,
        comment: request.comment,
        created_at: Utc::now(),
    };

    let stored = store.append_investment(investment, policy).await?;
    tracing::info!(
        "{} invested {} tokens in {} for {}",
        stored.investor_id,
        stored.tokens,
        stored.team_id,
        stored.assignment_id
    );

    // The investment stands even if the evaluation status cannot be updated.
    match store
        .complete_evaluation(&stored.assignment_id, &stored.investor_id, &stored.team_id)
        .await
    {
        Ok(true) => {}
        Ok(false) => tracing::debug!(
            "no evaluation assignment for {} -> {}",
            stored.investor_id,
            stored.team_id
        ),
        Err(e) => tracing::warn!(
            "failed to complete evaluation for {} -> {}: {e}",
            stored.investor_id,
            stored.team_id
        ),
    }

    Ok(stored)
}
