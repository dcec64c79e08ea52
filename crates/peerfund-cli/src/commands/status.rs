//! The `peerfund status` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn execute(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    assignment: String,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let engine = super::open_engine(config_path, data)?;
    let report = engine.evaluation_status(&assignment).await?;

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Status saved to: {}", path.display());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            let mut table = Table::new();
            table.set_header(vec![
                "Student",
                "Assigned",
                "Completed",
                "Teams invested",
                "Tokens spent",
                "Tokens left",
            ]);
            for s in &report.students {
                table.add_row(vec![
                    Cell::new(&s.student_id),
                    Cell::new(s.assigned),
                    Cell::new(s.completed),
                    Cell::new(s.teams_invested),
                    Cell::new(s.tokens_spent),
                    Cell::new(s.tokens_remaining),
                ]);
            }
            println!("{table}");
            println!(
                "{}/{} students finished, {} tokens invested.",
                report.finished(),
                report.students.len(),
                report.tokens_spent()
            );
        }
    }

    Ok(())
}
