//! Evaluation distribution.
//!
//! Every active student receives a fixed number of submitted teams to
//! evaluate, never one of their own. Candidates are shuffled and then taken
//! least-loaded first, so evaluators spread evenly over the teams.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result, ValidationError};
use crate::model::{EvaluationAssignment, EvaluationStatus, Team};
use crate::traits::Store;
use crate::validator::{self, ensure_not_self_evaluation, CleanupReport};

/// Bounds on distribution requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionPolicy {
    /// Fewest evaluations a student may be asked to do.
    pub min_per_student: u32,
    /// Most evaluations a student may be asked to do.
    pub max_per_student: u32,
    /// How far in the future a due date may be.
    pub max_window_days: i64,
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self {
            min_per_student: 1,
            max_per_student: 10,
            max_window_days: 365,
        }
    }
}

/// When evaluators may submit their investments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl EvaluationWindow {
    /// Check `start < due`, `due > now`, and `due <= now + max_days`.
    pub fn validate(&self, now: DateTime<Utc>, max_days: i64) -> Result<(), ValidationError> {
        if self.start_at >= self.due_at {
            return Err(ValidationError::WindowOrder);
        }
        if self.due_at <= now {
            return Err(ValidationError::DueInPast);
        }
        let latest = Duration::try_days(max_days).and_then(|d| now.checked_add_signed(d));
        match latest {
            Some(latest) if self.due_at <= latest => Ok(()),
            _ => Err(ValidationError::WindowTooFar { max_days }),
        }
    }
}

/// A request to distribute evaluations for one assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub assignment_id: String,
    pub evaluations_per_student: u32,
    pub window: EvaluationWindow,
}

/// A student who received fewer targets than requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub student_id: String,
    pub requested: u32,
    /// Targets held after this run, including earlier runs.
    pub assigned: u32,
}

/// Outcome of a distribution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionReport {
    pub assignment_id: String,
    /// Self-evaluations purged before distributing.
    pub cleanup: CleanupReport,
    /// Students considered.
    pub students: usize,
    /// Newly created evaluation assignments.
    pub created: Vec<EvaluationAssignment>,
    /// Students left short because their candidate pool was too small.
    pub shortfalls: Vec<Shortfall>,
}

impl DistributionReport {
    pub fn count(&self) -> usize {
        self.created.len()
    }
}

/// Assigns evaluation targets.
#[derive(Debug, Clone, Default)]
pub struct Distributor {
    policy: DistributionPolicy,
    seed: Option<u64>,
}

impl Distributor {
    pub fn new(policy: DistributionPolicy) -> Self {
        Self { policy, seed: None }
    }

    /// Fix the shuffle seed for reproducible distributions.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Distribute evaluations for an assignment.
    ///
    /// Self-evaluations are purged first. A student's earlier assignments for
    /// the same assignment count toward the quota, so re-running with the
    /// same count creates nothing new. Students whose pool is too small get
    /// fewer targets and are listed in `shortfalls`; the batch still succeeds.
    pub async fn distribute(
        &self,
        store: &dyn Store,
        request: &DistributionRequest,
        now: DateTime<Utc>,
    ) -> Result<DistributionReport> {
        let k = request.evaluations_per_student;
        if k < self.policy.min_per_student || k > self.policy.max_per_student {
            return Err(ValidationError::EvaluationCount {
                requested: k,
                min: self.policy.min_per_student,
                max: self.policy.max_per_student,
            }
            .into());
        }
        request.window.validate(now, self.policy.max_window_days)?;

        let assignment = store
            .assignment(&request.assignment_id)
            .await?
            .ok_or_else(|| EngineError::AssignmentNotFound(request.assignment_id.clone()))?;

        let cleanup = validator::cleanup_self_evaluations(store).await?;

        let submissions = store.submitted_submissions(&assignment.id).await?;
        let course_teams: HashMap<String, Team> = store
            .teams(&assignment.course_id)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut seen = HashSet::new();
        let mut teams: Vec<&Team> = Vec::new();
        for s in &submissions {
            match course_teams.get(&s.team_id) {
                Some(team) if seen.insert(team.id.as_str()) => teams.push(team),
                Some(_) => {}
                None => tracing::warn!(
                    "submission {} belongs to unknown team {}, skipping",
                    s.id,
                    s.team_id
                ),
            }
        }

        let required = k as usize + 1;
        if teams.len() < required {
            return Err(ValidationError::NotEnoughTeams {
                required,
                available: teams.len(),
            }
            .into());
        }

        let students = store.active_students(&assignment.course_id).await?;
        let existing = store.evaluation_assignments(Some(&assignment.id)).await?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let plan = plan_assignments(&students, &teams, &existing, k, &mut rng);

        let mut created = Vec::with_capacity(plan.pairs.len());
        for (student_id, team) in plan.pairs {
            ensure_not_self_evaluation(&student_id, team)?;
            created.push(EvaluationAssignment {
                id: Uuid::new_v4(),
                assignment_id: assignment.id.clone(),
                evaluator_id: student_id,
                team_id: team.id.clone(),
                status: EvaluationStatus::Assigned,
                start_at: request.window.start_at,
                due_at: request.window.due_at,
                created_at: now,
            });
        }

        if !created.is_empty() {
            store.insert_evaluation_assignments(created.clone()).await?;
        }

        for s in &plan.shortfalls {
            tracing::warn!(
                "{} has only {} of {} evaluation targets for {}",
                s.student_id,
                s.assigned,
                s.requested,
                assignment.id
            );
        }
        tracing::info!(
            "distributed {} evaluations to {} students over {} teams for {}",
            created.len(),
            students.len(),
            teams.len(),
            assignment.id
        );

        Ok(DistributionReport {
            assignment_id: assignment.id,
            cleanup,
            students: students.len(),
            created,
            shortfalls: plan.shortfalls,
        })
    }
}

struct Plan<'t> {
    pairs: Vec<(String, &'t Team)>,
    shortfalls: Vec<Shortfall>,
}

/// Pick targets for every student, least-loaded team first.
fn plan_assignments<'t>(
    students: &[String],
    teams: &[&'t Team],
    existing: &[EvaluationAssignment],
    k: u32,
    rng: &mut StdRng,
) -> Plan<'t> {
    let mut load: HashMap<&str, usize> = teams.iter().map(|t| (t.id.as_str(), 0)).collect();
    let mut held: HashMap<&str, HashSet<&str>> = HashMap::new();
    for e in existing {
        if let Some(count) = load.get_mut(e.team_id.as_str()) {
            *count += 1;
        }
        held.entry(e.evaluator_id.as_str())
            .or_default()
            .insert(e.team_id.as_str());
    }

    let mut pairs = Vec::new();
    let mut shortfalls = Vec::new();

    for student in students {
        let already = held.get(student.as_str()).cloned().unwrap_or_default();
        let needed = (k as usize).saturating_sub(already.len());

        let mut pool: Vec<&'t Team> = teams
            .iter()
            .copied()
            .filter(|t| !t.has_member(student) && !already.contains(t.id.as_str()))
            .collect();
        pool.shuffle(rng);
        pool.sort_by_key(|t| load.get(t.id.as_str()).copied().unwrap_or(0));

        let picked: Vec<&'t Team> = pool.into_iter().take(needed).collect();
        for team in &picked {
            if let Some(count) = load.get_mut(team.id.as_str()) {
                *count += 1;
            }
            pairs.push((student.clone(), *team));
        }

        let assigned = (already.len() + picked.len()) as u32;
        if assigned < k {
            shortfalls.push(Shortfall {
                student_id: student.clone(),
                requested: k,
                assigned,
            });
        }
    }

    Plan { pairs, shortfalls }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::{course, evaluation};

    fn window(now: DateTime<Utc>) -> EvaluationWindow {
        EvaluationWindow {
            start_at: now,
            due_at: now + Duration::days(7),
        }
    }

    fn request(k: u32, now: DateTime<Utc>) -> DistributionRequest {
        DistributionRequest {
            assignment_id: "a1".into(),
            evaluations_per_student: k,
            window: window(now),
        }
    }

    fn distributor() -> Distributor {
        Distributor::new(DistributionPolicy::default()).with_seed(Some(7))
    }

    #[test]
    fn window_validation() {
        let now = Utc::now();
        assert!(window(now).validate(now, 365).is_ok());

        let reversed = EvaluationWindow {
            start_at: now + Duration::days(2),
            due_at: now + Duration::days(1),
        };
        assert_eq!(reversed.validate(now, 365), Err(ValidationError::WindowOrder));

        let past = EvaluationWindow {
            start_at: now - Duration::days(3),
            due_at: now - Duration::days(1),
        };
        assert_eq!(past.validate(now, 365), Err(ValidationError::DueInPast));

        let far = EvaluationWindow {
            start_at: now,
            due_at: now + Duration::days(400),
        };
        assert_eq!(
            far.validate(now, 365),
            Err(ValidationError::WindowTooFar { max_days: 365 })
        );
    }

    #[test]
    fn out_of_range_window_limit_is_rejected() {
        let now = Utc::now();
        for max_days in [i64::MAX, i64::MIN, 999_999_999_999_999] {
            assert_eq!(
                window(now).validate(now, max_days),
                Err(ValidationError::WindowTooFar { max_days })
            );
        }
    }

    #[tokio::test]
    async fn every_student_gets_k_non_self_targets() {
        let store = MemoryStore::from_dataset(course(6, 2));
        let now = Utc::now();
        let report = distributor()
            .distribute(&store, &request(3, now), now)
            .await
            .unwrap();

        assert_eq!(report.students, 12);
        assert_eq!(report.count(), 36);
        assert!(report.shortfalls.is_empty());

        let data = store.snapshot().await;
        for e in &data.evaluation_assignments {
            let team = data.teams.iter().find(|t| t.id == e.team_id).unwrap();
            assert!(!team.has_member(&e.evaluator_id));
            assert_eq!(e.status, EvaluationStatus::Assigned);
        }
        for student in ["s1", "s7", "s12"] {
            let targets: HashSet<&str> = data
                .evaluation_assignments
                .iter()
                .filter(|e| e.evaluator_id == student)
                .map(|e| e.team_id.as_str())
                .collect();
            assert_eq!(targets.len(), 3, "{student} has duplicate targets");
        }
    }

    #[tokio::test]
    async fn rejects_count_outside_policy() {
        let store = MemoryStore::from_dataset(course(4, 1));
        let now = Utc::now();
        for k in [0, 11] {
            let err = distributor()
                .distribute(&store, &request(k, now), now)
                .await
                .unwrap_err();
            assert!(matches!(
                err.validation(),
                Some(ValidationError::EvaluationCount { .. })
            ));
        }
    }

    #[tokio::test]
    async fn requires_k_plus_one_submitted_teams() {
        let store = MemoryStore::from_dataset(course(3, 1));
        let now = Utc::now();
        let err = distributor()
            .distribute(&store, &request(3, now), now)
            .await
            .unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::NotEnoughTeams {
                required: 4,
                available: 3
            })
        );
    }

    #[tokio::test]
    async fn unknown_assignment() {
        let store = MemoryStore::from_dataset(course(3, 1));
        let now = Utc::now();
        let mut req = request(1, now);
        req.assignment_id = "nope".into();
        let err = distributor().distribute(&store, &req, now).await.unwrap_err();
        assert!(matches!(err, EngineError::AssignmentNotFound(_)));
    }

    #[tokio::test]
    async fn purges_self_evaluations_before_distributing() {
        let store = MemoryStore::from_dataset(course(3, 1));
        store
            .insert_evaluation_assignments(vec![evaluation("s1", "t1")])
            .await
            .unwrap();
        let now = Utc::now();
        let report = distributor()
            .distribute(&store, &request(1, now), now)
            .await
            .unwrap();
        assert_eq!(report.cleanup.deleted_individual, 1);
        assert_eq!(report.count(), 3);
    }

    #[tokio::test]
    async fn small_pool_is_a_reported_shortfall() {
        let mut data = course(3, 1);
        // s1 is also on t2, leaving only t3 as a candidate.
        data.teams[1].members.push("s1".into());
        let store = MemoryStore::from_dataset(data);
        let now = Utc::now();
        let report = distributor()
            .distribute(&store, &request(2, now), now)
            .await
            .unwrap();

        assert_eq!(
            report.shortfalls,
            vec![Shortfall {
                student_id: "s1".into(),
                requested: 2,
                assigned: 1
            }]
        );
        assert_eq!(report.count(), 5);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let store = MemoryStore::from_dataset(course(5, 1));
        let now = Utc::now();
        let first = distributor()
            .distribute(&store, &request(2, now), now)
            .await
            .unwrap();
        assert_eq!(first.count(), 10);

        let second = distributor()
            .distribute(&store, &request(2, now), now)
            .await
            .unwrap();
        assert_eq!(second.count(), 0);
        assert_eq!(store.evaluation_assignments(Some("a1")).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn prefers_least_loaded_teams() {
        let store = MemoryStore::from_dataset(course(3, 1));
        // s3 already reviews t2, so t3 is the lighter choice for s1.
        store
            .insert_evaluation_assignments(vec![evaluation("s3", "t2")])
            .await
            .unwrap();
        let now = Utc::now();
        let report = distributor()
            .distribute(&store, &request(1, now), now)
            .await
            .unwrap();

        let target = |student: &str| {
            report
                .created
                .iter()
                .find(|e| e.evaluator_id == student)
                .map(|e| e.team_id.clone())
        };
        assert_eq!(target("s1").as_deref(), Some("t3"));
        assert_eq!(target("s2").as_deref(), Some("t1"));
        assert_eq!(target("s3"), None);
    }

    #[test]
    fn same_seed_same_plan() {
        let data = course(8, 2);
        let teams: Vec<&Team> = data.teams.iter().collect();
        let students: Vec<String> = data.enrollments.iter().map(|e| e.student_id.clone()).collect();

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            plan_assignments(&students, &teams, &[], 3, &mut rng)
                .pairs
                .into_iter()
                .map(|(s, t)| (s, t.id.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
