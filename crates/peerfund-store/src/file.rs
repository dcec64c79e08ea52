//! JSON-file store.
//!
//! Serves every request from an in-memory [`MemoryStore`] and writes the
//! whole dataset back after each mutation. Writes go to a temp file in the
//! same directory which is then renamed over the data file, so a reader
//! never sees a half-written dataset. A mutation whose write fails is rolled
//! back in memory as well.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use peerfund_core::error::Result;
use peerfund_core::ledger::BudgetPolicy;
use peerfund_core::model::{
    Assignment, EvaluationAssignment, Grade, InterestRecord, Investment, Submission, Team,
    TeamEvaluation,
};
use peerfund_core::{Dataset, MemoryStore, Store};

use crate::error::StoreError;

/// A [`Store`] persisted to a single JSON file.
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Held across each mutation and its write, so mutations commit in order.
    persist_lock: Mutex<()>,
}

impl FileStore {
    /// Open the data file at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            read_dataset(&path)?
        } else {
            tracing::debug!("{} does not exist, starting with an empty dataset", path.display());
            Dataset::default()
        };
        Ok(Self {
            path,
            inner: MemoryStore::from_dataset(data),
            persist_lock: Mutex::new(()),
        })
    }

    /// Write `data` to `path`, replacing any existing file.
    pub fn create(path: impl Into<PathBuf>, data: Dataset) -> Result<Self, StoreError> {
        let path = path.into();
        write_dataset(&path, &data)?;
        Ok(Self {
            path,
            inner: MemoryStore::from_dataset(data),
            persist_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> Dataset {
        self.inner.snapshot().await
    }

    /// Write the current contents, restoring `before` if the write fails.
    ///
    /// Callers hold `persist_lock` from before the mutation until this returns.
    async fn persist_or_restore(&self, before: Dataset) -> Result<(), StoreError> {
        let data = self.inner.snapshot().await;
        if let Err(err) = write_dataset(&self.path, &data) {
            tracing::warn!("rolling back unsaved change: {err}");
            self.inner.replace(before).await;
            return Err(err);
        }
        Ok(())
    }
}

/// Read a dataset from a JSON file.
pub fn read_dataset(path: &Path) -> Result<Dataset, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically write a dataset as pretty JSON.
pub fn write_dataset(path: &Path, data: &Dataset) -> Result<(), StoreError> {
    let write_err = |message: String| StoreError::Write {
        path: path.to_path_buf(),
        message,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| write_err(e.to_string()))?;

    let json = serde_json::to_vec_pretty(data).map_err(|e| write_err(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(&json).map_err(|e| write_err(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| write_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;

    tracing::trace!("wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

#[async_trait]
impl Store for FileStore {
    async fn assignment(&self, assignment_id: &str) -> Result<Option<Assignment>> {
        self.inner.assignment(assignment_id).await
    }

    async fn active_students(&self, course_id: &str) -> Result<Vec<String>> {
        self.inner.active_students(course_id).await
    }

    async fn teams(&self, course_id: &str) -> Result<Vec<Team>> {
        self.inner.teams(course_id).await
    }

    async fn team(&self, team_id: &str) -> Result<Option<Team>> {
        self.inner.team(team_id).await
    }

    async fn submitted_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>> {
        self.inner.submitted_submissions(assignment_id).await
    }

    async fn evaluation_assignments(
        &self,
        assignment_id: Option<&str>,
    ) -> Result<Vec<EvaluationAssignment>> {
        self.inner.evaluation_assignments(assignment_id).await
    }

    async fn insert_evaluation_assignments(
        &self,
        records: Vec<EvaluationAssignment>,
    ) -> Result<usize> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        let count = self.inner.insert_evaluation_assignments(records).await?;
        self.persist_or_restore(before).await?;
        Ok(count)
    }

    async fn delete_evaluation_assignments(&self, ids: &[Uuid]) -> Result<usize> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        let count = self.inner.delete_evaluation_assignments(ids).await?;
        if count > 0 {
            self.persist_or_restore(before).await?;
        }
        Ok(count)
    }

    async fn complete_evaluation(
        &self,
        assignment_id: &str,
        evaluator_id: &str,
        team_id: &str,
    ) -> Result<bool> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        let found = self
            .inner
            .complete_evaluation(assignment_id, evaluator_id, team_id)
            .await?;
        if found {
            self.persist_or_restore(before).await?;
        }
        Ok(found)
    }

    async fn team_evaluations(&self) -> Result<Vec<TeamEvaluation>> {
        self.inner.team_evaluations().await
    }

    async fn delete_team_evaluations(&self, ids: &[Uuid]) -> Result<usize> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        let count = self.inner.delete_team_evaluations(ids).await?;
        if count > 0 {
            self.persist_or_restore(before).await?;
        }
        Ok(count)
    }

    async fn investments(&self, assignment_id: &str) -> Result<Vec<Investment>> {
        self.inner.investments(assignment_id).await
    }

    async fn investments_in_team(
        &self,
        assignment_id: &str,
        team_id: &str,
    ) -> Result<Vec<Investment>> {
        self.inner.investments_in_team(assignment_id, team_id).await
    }

    async fn investments_by(
        &self,
        assignment_id: &str,
        investor_id: &str,
    ) -> Result<Vec<Investment>> {
        self.inner.investments_by(assignment_id, investor_id).await
    }

    async fn append_investment(
        &self,
        investment: Investment,
        policy: &BudgetPolicy,
    ) -> Result<Investment> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        let stored = self.inner.append_investment(investment, policy).await?;
        self.persist_or_restore(before).await?;
        Ok(stored)
    }

    async fn grades(&self, assignment_id: &str) -> Result<Vec<Grade>> {
        self.inner.grades(assignment_id).await
    }

    async fn grade(&self, assignment_id: &str, team_id: &str) -> Result<Option<Grade>> {
        self.inner.grade(assignment_id, team_id).await
    }

    async fn upsert_grade(&self, grade: Grade) -> Result<Grade> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        let stored = self.inner.upsert_grade(grade).await?;
        self.persist_or_restore(before).await?;
        Ok(stored)
    }

    async fn replace_interest_record(&self, record: InterestRecord) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let before = self.inner.snapshot().await;
        self.inner.replace_interest_record(record).await?;
        self.persist_or_restore(before).await?;
        Ok(())
    }

    async fn interest_records(
        &self,
        assignment_id: &str,
        student_id: Option<&str>,
    ) -> Result<Vec<InterestRecord>> {
        self.inner.interest_records(assignment_id, student_id).await
    }
}
