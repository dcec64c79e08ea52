//! The `peerfund invest` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use peerfund_core::ledger::InvestmentRequest;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config_path: Option<&Path>,
    data: Option<PathBuf>,
    assignment: String,
    student: String,
    team: String,
    tokens: u32,
    incomplete: bool,
    comment: String,
) -> Result<()> {
    let engine = super::open_engine(config_path, data)?;

    let investment = engine
        .invest(InvestmentRequest {
            assignment_id: assignment,
            investor_id: student,
            team_id: team,
            tokens,
            incomplete,
            comment,
        })
        .await?;

    let spent: u32 = engine
        .store()
        .investments_by(&investment.assignment_id, &investment.investor_id)
        .await?
        .iter()
        .map(|i| i.tokens)
        .sum();
    let budget = engine.config().budget.budget;

    println!(
        "Recorded {} tokens from {} in {} ({} of {} spent).",
        investment.tokens,
        investment.investor_id,
        investment.team_id,
        spent,
        budget
    );
    Ok(())
}
