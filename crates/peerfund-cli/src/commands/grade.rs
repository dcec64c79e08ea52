//! The `peerfund grade` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::ConsoleReporter;

pub async fn execute(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    assignment: String,
) -> Result<()> {
    let engine = super::open_engine(config_path, data)?;
    let report = engine.grade(&assignment, &ConsoleReporter).await?;

    let mut grades = report.grades.clone();
    grades.sort_by(|a, b| {
        b.effective_tier()
            .strength()
            .cmp(&a.effective_tier().strength())
            .then_with(|| b.average_investment.total_cmp(&a.average_investment))
    });

    let mut table = Table::new();
    table.set_header(vec![
        "Team",
        "Avg tokens",
        "Investments",
        "Tier",
        "Grade",
        "Incomplete flags",
    ]);
    for g in &grades {
        let tier = match &g.review {
            Some(review) => format!("{} (reviewed from {})", review.tier, g.tier),
            None => g.tier.to_string(),
        };
        table.add_row(vec![
            Cell::new(&g.team_id),
            Cell::new(format!("{:.2}", g.average_investment)),
            Cell::new(g.investment_count),
            Cell::new(tier),
            Cell::new(format!("{}%", g.effective_percentage())),
            Cell::new(g.incomplete_flags),
        ]);
    }
    println!("{table}");
    println!(
        "Graded {} teams for {} ({} skipped).",
        report.graded(),
        report.assignment_id,
        report.skipped.len()
    );

    Ok(())
}
