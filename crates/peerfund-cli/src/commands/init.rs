//! The `peerfund init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};

use peerfund_core::model::{Assignment, Enrollment, Submission, SubmissionStatus, Team};
use peerfund_core::Dataset;
use peerfund_store::file::write_dataset;
use peerfund_store::PeerfundConfig;

pub fn execute(config_path: Option<&Path>, data: Option<PathBuf>, force: bool) -> Result<()> {
    let config_file = config_path.unwrap_or(Path::new("peerfund.toml"));
    if config_file.exists() && !force {
        println!("{} already exists, skipping.", config_file.display());
    } else {
        std::fs::write(config_file, SAMPLE_CONFIG)
            .with_context(|| format!("failed to write {}", config_file.display()))?;
        println!("Created {}", config_file.display());
    }

    let data_path = data.unwrap_or_else(|| PeerfundConfig::default().data_path);
    if data_path.exists() && !force {
        println!("{} already exists, skipping.", data_path.display());
    } else {
        write_dataset(&data_path, &demo_dataset())?;
        println!("Created {}", data_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Run: peerfund distribute --assignment project-1");
    println!("  2. Run: peerfund invest --assignment project-1 --student s01 --team team-2 --tokens 40");
    println!("  3. Run: peerfund grade --assignment project-1");
    println!("  4. Run: peerfund interest --assignment project-1");

    Ok(())
}

/// Course `cs101` with six two-person teams, all submitted for `project-1`.
pub fn demo_dataset() -> Dataset {
    let now = Utc::now();
    let mut data = Dataset {
        assignments: vec![Assignment {
            id: "project-1".into(),
            course_id: "cs101".into(),
            name: "Project 1".into(),
        }],
        ..Default::default()
    };

    for t in 1..=6 {
        let members: Vec<String> = [2 * t - 1, 2 * t]
            .iter()
            .map(|n| format!("s{n:02}"))
            .collect();
        for student_id in &members {
            data.enrollments.push(Enrollment {
                course_id: "cs101".into(),
                student_id: student_id.clone(),
                active: true,
            });
        }
        data.teams.push(Team {
            id: format!("team-{t}"),
            course_id: "cs101".into(),
            name: format!("Team {t}"),
            members,
        });
        data.submissions.push(Submission {
            id: format!("sub-{t}"),
            assignment_id: "project-1".into(),
            team_id: format!("team-{t}"),
            status: SubmissionStatus::Submitted,
            submitted_at: now - Duration::hours(12 - t),
        });
    }
    data
}

const SAMPLE_CONFIG: &str = r#"# peerfund configuration

data_path = "./peerfund-data.json"
parallelism = 4
regrade_on_investment = true
# seed = 42

[distribution]
min_per_student = 1
max_per_student = 10
max_window_days = 365

[budget]
max_tokens_per_investment = 50
budget = 100
max_teams = 3
require_distributed_target = false

[grading]
tie_break = "submission_order"
high_percentage = 100
median_percentage = 80
low_percentage = 60
incomplete_percentage = 0

[interest]
high = "0.20"
median = "0.10"
low = "0.05"
incomplete = "0"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let config = peerfund_store::config::parse_config(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.budget.budget, 100);
        assert_eq!(config.parallelism, 4);
    }

    #[test]
    fn demo_dataset_has_disjoint_teams() {
        let data = demo_dataset();
        assert_eq!(data.teams.len(), 6);
        assert_eq!(data.enrollments.len(), 12);
        for (i, a) in data.teams.iter().enumerate() {
            for b in &data.teams[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }
}
