//! Central peerfund engine orchestrator.
//!
//! Ties the distributor, validator, ledger, grading engine and interest
//! calculator to one store and one set of policies.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::distributor::{DistributionPolicy, DistributionReport, DistributionRequest, Distributor};
use crate::error::Result;
use crate::grading::{GradingEngine, GradingPolicy, GradingReport};
use crate::interest::{InterestCalculator, InterestRates, InterestReport, StudentInterest};
use crate::ledger::{self, BudgetPolicy, InvestmentRequest};
use crate::model::Investment;
use crate::report::{self, StatusReport};
use crate::traits::Store;
use crate::validator::{self, CleanupReport, Violation};

/// Configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub distribution: DistributionPolicy,
    pub budget: BudgetPolicy,
    pub grading: GradingPolicy,
    pub interest: InterestRates,
    /// Maximum concurrent per-item reads in batch operations.
    pub parallelism: usize,
    /// Fixed seed for distribution; random when unset.
    pub seed: Option<u64>,
    /// Regrade the assignment after every accepted investment.
    pub regrade_on_investment: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            distribution: DistributionPolicy::default(),
            budget: BudgetPolicy::default(),
            grading: GradingPolicy::default(),
            interest: InterestRates::default(),
            parallelism: 4,
            seed: None,
            regrade_on_investment: true,
        }
    }
}

/// Progress reporting trait for batch operations.
pub trait ProgressReporter: Send + Sync {
    fn on_item_complete(&self, id: &str);
    fn on_item_skipped(&self, id: &str, reason: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, skipped: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_item_complete(&self, _: &str) {}
    fn on_item_skipped(&self, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The central peerfund engine.
pub struct PeerFundEngine {
    store: Arc<dyn Store>,
    config: EngineConfig,
}

impl PeerFundEngine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn grading_engine(&self) -> GradingEngine {
        GradingEngine::new(self.config.grading.clone(), self.config.parallelism)
    }

    fn interest_calculator(&self) -> InterestCalculator {
        InterestCalculator::new(self.config.interest.clone(), self.config.parallelism)
    }

    /// Assign evaluation targets to every active student.
    pub async fn distribute(&self, request: &DistributionRequest) -> Result<DistributionReport> {
        Distributor::new(self.config.distribution.clone())
            .with_seed(self.config.seed)
            .distribute(self.store.as_ref(), request, Utc::now())
            .await
    }

    pub async fn find_self_evaluations(&self) -> Result<Vec<Violation>> {
        validator::find_self_evaluations(self.store.as_ref()).await
    }

    pub async fn cleanup_self_evaluations(&self) -> Result<CleanupReport> {
        validator::cleanup_self_evaluations(self.store.as_ref()).await
    }

    pub async fn find_self_investments(&self, assignment_id: &str) -> Result<Vec<Violation>> {
        validator::find_self_investments(self.store.as_ref(), assignment_id).await
    }

    /// Record an investment and, when configured, regrade its assignment.
    ///
    /// A failed regrade is logged; the investment stays recorded.
    pub async fn invest(&self, request: InvestmentRequest) -> Result<Investment> {
        let investment =
            ledger::record_investment(self.store.as_ref(), request, &self.config.budget).await?;

        if self.config.regrade_on_investment {
            if let Err(e) = self
                .grading_engine()
                .grade_assignment(self.store.as_ref(), &investment.assignment_id, &NoopReporter)
                .await
            {
                tracing::warn!(
                    "regrade after investment {} failed: {e}",
                    investment.id
                );
            }
        }
        Ok(investment)
    }

    pub async fn grade(
        &self,
        assignment_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<GradingReport> {
        self.grading_engine()
            .grade_assignment(self.store.as_ref(), assignment_id, progress)
            .await
    }

    pub async fn calculate_interest(
        &self,
        assignment_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<InterestReport> {
        self.interest_calculator()
            .calculate_interest(self.store.as_ref(), assignment_id, progress)
            .await
    }

    pub async fn calculate_student_interest(
        &self,
        student_id: &str,
        assignment_id: &str,
    ) -> Result<StudentInterest> {
        self.interest_calculator()
            .calculate_student_interest(self.store.as_ref(), student_id, assignment_id)
            .await
    }

    /// Per-student evaluation progress for an assignment.
    pub async fn evaluation_status(&self, assignment_id: &str) -> Result<StatusReport> {
        report::evaluation_status(self.store.as_ref(), assignment_id, &self.config.budget).await
    }
}
