//! The `peerfund distribute` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use comfy_table::{Cell, Table};

use peerfund_core::distributor::{DistributionRequest, EvaluationWindow};

pub async fn execute(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    assignment: String,
    per_student: u32,
    start: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    days: i64,
) -> Result<()> {
    let engine = super::open_engine(config_path, data)?;

    let start_at = start.unwrap_or_else(Utc::now);
    let due_at = match due {
        Some(due) => due,
        None => Duration::try_days(days)
            .and_then(|d| start_at.checked_add_signed(d))
            .with_context(|| format!("--days {days} is out of range"))?,
    };
    let request = DistributionRequest {
        assignment_id: assignment,
        evaluations_per_student: per_student,
        window: EvaluationWindow { start_at, due_at },
    };

    let report = engine.distribute(&request).await?;

    if report.cleanup.total_deleted() > 0 {
        eprintln!(
            "Removed {} self-evaluations before distributing.",
            report.cleanup.total_deleted()
        );
    }

    let mut per_evaluator: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for e in &report.created {
        per_evaluator
            .entry(e.evaluator_id.as_str())
            .or_default()
            .push(e.team_id.as_str());
    }

    let mut table = Table::new();
    table.set_header(vec!["Student", "New targets"]);
    for (student, teams) in &per_evaluator {
        table.add_row(vec![Cell::new(student), Cell::new(teams.join(", "))]);
    }
    println!("{table}");

    for s in &report.shortfalls {
        println!(
            "WARNING: {} has {} of {} evaluations (not enough eligible teams)",
            s.student_id, s.assigned, s.requested
        );
    }
    println!(
        "Created {} evaluation assignments for {} students in {}.",
        report.count(),
        report.students,
        report.assignment_id
    );

    Ok(())
}
