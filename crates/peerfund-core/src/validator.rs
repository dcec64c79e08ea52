//! Self-evaluation detection and cleanup.
//!
//! No evaluator may review or invest in their own team. The distributor and
//! the ledger reject such records at write time; this module sweeps the
//! records that already exist and deletes illegal evaluations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::model::Team;
use crate::traits::Store;

/// A record in which someone reviews their own team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A student assigned to evaluate their own team.
    Individual {
        record_id: Uuid,
        assignment_id: String,
        evaluator_id: String,
        team_id: String,
    },
    /// A team evaluating a team it shares members with.
    Team {
        record_id: Uuid,
        assignment_id: String,
        evaluator_team_id: String,
        team_id: String,
        shared_members: Vec<String>,
    },
    /// A student who invested in their own team.
    Investment {
        record_id: Uuid,
        assignment_id: String,
        investor_id: String,
        team_id: String,
    },
}

/// Outcome of a cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted_individual: usize,
    pub deleted_team: usize,
    /// Records that could not be checked or deleted.
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted_individual + self.deleted_team
    }
}

/// Write-time guard: reject an evaluator who is a member of `team`.
pub fn ensure_not_self_evaluation(evaluator_id: &str, team: &Team) -> Result<(), ValidationError> {
    if team.has_member(evaluator_id) {
        return Err(ValidationError::SelfEvaluation {
            evaluator_id: evaluator_id.to_string(),
            team_id: team.id.clone(),
        });
    }
    Ok(())
}

/// Team lookups memoized for the duration of one sweep.
struct TeamCache<'a> {
    store: &'a dyn Store,
    teams: HashMap<String, Option<Team>>,
}

impl<'a> TeamCache<'a> {
    fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            teams: HashMap::new(),
        }
    }

    async fn get(&mut self, team_id: &str) -> Result<Option<Team>> {
        if let Some(team) = self.teams.get(team_id) {
            return Ok(team.clone());
        }
        let team = self.store.team(team_id).await?;
        self.teams.insert(team_id.to_string(), team.clone());
        Ok(team)
    }
}

struct Scan {
    violations: Vec<Violation>,
    errors: Vec<String>,
}

async fn scan(store: &dyn Store) -> Result<Scan> {
    let evaluations = store.evaluation_assignments(None).await?;
    let team_evaluations = store.team_evaluations().await?;

    let mut cache = TeamCache::new(store);
    let mut violations = Vec::new();
    let mut errors = Vec::new();

    for e in &evaluations {
        match cache.get(&e.team_id).await {
            Ok(Some(team)) if team.has_member(&e.evaluator_id) => {
                violations.push(Violation::Individual {
                    record_id: e.id,
                    assignment_id: e.assignment_id.clone(),
                    evaluator_id: e.evaluator_id.clone(),
                    team_id: e.team_id.clone(),
                });
            }
            Ok(Some(_)) => {}
            Ok(None) => errors.push(format!(
                "evaluation {} references unknown team {}",
                e.id, e.team_id
            )),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => errors.push(format!("evaluation {}: {err}", e.id)),
        }
    }

    for e in &team_evaluations {
        let evaluator = cache.get(&e.evaluator_team_id).await;
        let evaluated = cache.get(&e.team_id).await;
        match (evaluator, evaluated) {
            (Err(err), _) | (_, Err(err)) if err.is_fatal() => return Err(err),
            (Ok(Some(evaluator)), Ok(Some(evaluated))) => {
                let shared_members: Vec<String> = evaluator
                    .members
                    .iter()
                    .filter(|m| evaluated.has_member(m))
                    .cloned()
                    .collect();
                if evaluator.id == evaluated.id || !shared_members.is_empty() {
                    violations.push(Violation::Team {
                        record_id: e.id,
                        assignment_id: e.assignment_id.clone(),
                        evaluator_team_id: e.evaluator_team_id.clone(),
                        team_id: e.team_id.clone(),
                        shared_members,
                    });
                }
            }
            (Err(err), _) | (_, Err(err)) => {
                errors.push(format!("team evaluation {}: {err}", e.id));
            }
            _ => errors.push(format!(
                "team evaluation {} references an unknown team ({} -> {})",
                e.id, e.evaluator_team_id, e.team_id
            )),
        }
    }

    Ok(Scan { violations, errors })
}

/// List every self-evaluation among individual and team-level records.
pub async fn find_self_evaluations(store: &dyn Store) -> Result<Vec<Violation>> {
    let scan = scan(store).await?;
    for err in &scan.errors {
        tracing::warn!("{err}");
    }
    Ok(scan.violations)
}

/// Delete every self-evaluation. Running it again deletes nothing more.
pub async fn cleanup_self_evaluations(store: &dyn Store) -> Result<CleanupReport> {
    let Scan {
        violations,
        mut errors,
    } = scan(store).await?;

    let mut individual = Vec::new();
    let mut team = Vec::new();
    for v in &violations {
        match v {
            Violation::Individual { record_id, .. } => individual.push(*record_id),
            Violation::Team { record_id, .. } => team.push(*record_id),
            Violation::Investment { .. } => {}
        }
    }

    let mut report = CleanupReport::default();

    if !individual.is_empty() {
        match store.delete_evaluation_assignments(&individual).await {
            Ok(n) => report.deleted_individual = n,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => errors.push(format!("failed to delete evaluation assignments: {e}")),
        }
    }
    if !team.is_empty() {
        match store.delete_team_evaluations(&team).await {
            Ok(n) => report.deleted_team = n,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => errors.push(format!("failed to delete team evaluations: {e}")),
        }
    }

    report.errors = errors;
    if report.total_deleted() > 0 {
        tracing::info!(
            "removed {} self-evaluations ({} individual, {} team)",
            report.total_deleted(),
            report.deleted_individual,
            report.deleted_team
        );
    }
    Ok(report)
}

/// List investments whose investor is a member of the invested team.
///
/// These are reported but never deleted; grading ignores them.
pub async fn find_self_investments(store: &dyn Store, assignment_id: &str) -> Result<Vec<Violation>> {
    let investments = store.investments(assignment_id).await?;
    let mut cache = TeamCache::new(store);
    let mut violations = Vec::new();

    for i in &investments {
        if let Some(team) = cache.get(&i.team_id).await? {
            if team.has_member(&i.investor_id) {
                violations.push(Violation::Investment {
                    record_id: i.id,
                    assignment_id: i.assignment_id.clone(),
                    investor_id: i.investor_id.clone(),
                    team_id: i.team_id.clone(),
                });
            }
        }
    }
    Ok(violations)
}
