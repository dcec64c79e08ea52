//! The `peerfund interest` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{Cell, Table};

use peerfund_core::interest::StudentInterest;

use super::ConsoleReporter;

pub async fn execute(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    assignment: String,
    student: Option<String>,
) -> Result<()> {
    let engine = super::open_engine(config_path, data)?;

    let students = match student {
        Some(student) => vec![
            engine
                .calculate_student_interest(&student, &assignment)
                .await?,
        ],
        None => {
            let report = engine.calculate_interest(&assignment, &ConsoleReporter).await?;
            if !report.skipped.is_empty() {
                eprintln!("{} student(s) skipped.", report.skipped.len());
            }
            report.students
        }
    };

    print_interest(&students);
    Ok(())
}

fn print_interest(students: &[StudentInterest]) {
    let mut table = Table::new();
    table.set_header(vec!["Student", "Team", "Tokens", "Tier", "Rate", "Interest"]);
    for s in students {
        for r in &s.records {
            table.add_row(vec![
                Cell::new(&s.student_id),
                Cell::new(&r.team_id),
                Cell::new(r.tokens_invested),
                Cell::new(r.tier),
                Cell::new(r.rate),
                Cell::new(r.interest.round_dp(2)),
            ]);
        }
    }
    println!("{table}");

    let mut totals = Table::new();
    totals.set_header(vec!["Student", "Total interest"]);
    for s in students {
        totals.add_row(vec![
            Cell::new(&s.student_id),
            Cell::new(s.total_interest.round_dp(2)),
        ]);
    }
    println!("{totals}");
}
