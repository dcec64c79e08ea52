//! peerfund CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "peerfund", version, about = "Peer token-investment grading engine")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset file (overrides the config's data_path)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and a demo dataset
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Assign evaluation targets to every active student
    Distribute {
        /// Assignment id
        #[arg(long)]
        assignment: String,

        /// Teams each student evaluates
        #[arg(long, default_value = "3")]
        per_student: u32,

        /// Window start (RFC 3339, default: now)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Window end (RFC 3339, default: start + --days)
        #[arg(long)]
        due: Option<DateTime<Utc>>,

        /// Window length in days when --due is not given
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Record a token investment
    Invest {
        #[arg(long)]
        assignment: String,

        /// Investing student
        #[arg(long)]
        student: String,

        /// Team invested in
        #[arg(long)]
        team: String,

        #[arg(long)]
        tokens: u32,

        /// Flag the submission as incomplete
        #[arg(long)]
        incomplete: bool,

        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Find (and optionally delete) self-evaluations
    Validate {
        /// Delete the self-evaluations found
        #[arg(long)]
        cleanup: bool,

        /// Also report self-investments in this assignment
        #[arg(long)]
        assignment: Option<String>,
    },

    /// Grade every submitted team
    Grade {
        #[arg(long)]
        assignment: String,
    },

    /// Compute investor interest
    Interest {
        #[arg(long)]
        assignment: String,

        /// Only this student
        #[arg(long)]
        student: Option<String>,
    },

    /// Show per-student evaluation progress
    Status {
        #[arg(long)]
        assignment: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the report as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("peerfund=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let data = cli.data;

    let result = match cli.command {
        Commands::Init { force } => commands::init::execute(config, data, force),
        Commands::Distribute {
            assignment,
            per_student,
            start,
            due,
            days,
        } => {
            commands::distribute::execute(config, data, assignment, per_student, start, due, days)
                .await
        }
        Commands::Invest {
            assignment,
            student,
            team,
            tokens,
            incomplete,
            comment,
        } => {
            commands::invest::execute(
                config, data, assignment, student, team, tokens, incomplete, comment,
            )
            .await
        }
        Commands::Validate {
            cleanup,
            assignment,
        } => commands::validate::execute(config, data, cleanup, assignment).await,
        Commands::Grade { assignment } => commands::grade::execute(config, data, assignment).await,
        Commands::Interest {
            assignment,
            student,
        } => commands::interest::execute(config, data, assignment, student).await,
        Commands::Status {
            assignment,
            format,
            output,
        } => commands::status::execute(config, data, assignment, format, output).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
