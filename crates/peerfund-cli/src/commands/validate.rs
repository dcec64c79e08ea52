//! The `peerfund validate` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{Cell, Table};

use peerfund_core::validator::Violation;

pub async fn execute(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    cleanup: bool,
    assignment: Option<String>,
) -> Result<()> {
    let engine = super::open_engine(config_path, data)?;

    let mut violations = engine.find_self_evaluations().await?;
    if let Some(assignment) = &assignment {
        violations.extend(engine.find_self_investments(assignment).await?);
    }

    if violations.is_empty() {
        println!("No self-evaluations found.");
    } else {
        print_violations(&violations);
    }

    if cleanup {
        let report = engine.cleanup_self_evaluations().await?;
        for err in &report.errors {
            println!("  WARNING: {err}");
        }
        println!(
            "Deleted {} self-evaluations ({} individual, {} team).",
            report.total_deleted(),
            report.deleted_individual,
            report.deleted_team
        );
    }

    Ok(())
}

fn print_violations(violations: &[Violation]) {
    let mut table = Table::new();
    table.set_header(vec!["Kind", "Assignment", "Reviewer", "Team", "Record"]);

    for v in violations {
        let row = match v {
            Violation::Individual {
                record_id,
                assignment_id,
                evaluator_id,
                team_id,
            } => vec![
                "individual".to_string(),
                assignment_id.clone(),
                evaluator_id.clone(),
                team_id.clone(),
                record_id.to_string(),
            ],
            Violation::Team {
                record_id,
                assignment_id,
                evaluator_team_id,
                team_id,
                shared_members,
            } => vec![
                "team".to_string(),
                assignment_id.clone(),
                format!("{evaluator_team_id} ({})", shared_members.join(", ")),
                team_id.clone(),
                record_id.to_string(),
            ],
            Violation::Investment {
                record_id,
                assignment_id,
                investor_id,
                team_id,
            } => vec![
                "investment".to_string(),
                assignment_id.clone(),
                investor_id.clone(),
                team_id.clone(),
                record_id.to_string(),
            ],
        };
        table.add_row(row.into_iter().map(Cell::new).collect::<Vec<_>>());
    }

    println!("{table}");
    println!("{} violation(s) found.", violations.len());
}
