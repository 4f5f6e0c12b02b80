use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use practice_growth_scorecard::config::Config;
use practice_growth_scorecard::db::{self, PgStore};
use practice_growth_scorecard::models::{NewAssessment, ProgressDraft, ReconcileContext};
use practice_growth_scorecard::{report, score_baseline, tracker};

#[derive(Parser)]
#[command(name = "practice-scorecard")]
#[command(about = "Baseline and weekly progress scorecards for the practice growth program", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo participant with two weekly updates
    Seed,
    /// Import baseline assessments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score and store a baseline assessment from a JSON form payload
    Assess {
        #[arg(long)]
        input: PathBuf,
    },
    /// Submit the next weekly progress update from a JSON form payload
    Update {
        #[arg(long)]
        assessment: Uuid,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show current results for a participant
    #[command(group(
        ArgGroup::new("who")
            .args(["email", "assessment"])
            .required(true)
            .multiple(false)
    ))]
    Scorecard {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        assessment: Option<Uuid>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compute a baseline score from a JSON form payload without storing it
    Score {
        #[arg(long)]
        input: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("practice_growth_scorecard=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid form payload in {}", path.display()))
}

fn emit(rendered: String, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Scorecard written to {}.", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

async fn connect_store() -> anyhow::Result<PgStore> {
    let config = Config::from_env()?;
    let pool = db::connect(&config).await?;
    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::InitDb => {
            let config = Config::from_env()?;
            let pool = db::connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect_store().await?;
            match db::seed(&store).await? {
                Some(id) => println!("Seed data inserted (assessment {id})."),
                None => println!("Seed data already present."),
            }
        }
        Commands::Import { csv } => {
            let store = connect_store().await?;
            let inserted = db::import_csv(&store, &csv).await?;
            println!("Inserted {inserted} assessments from {}.", csv.display());
        }
        Commands::Assess { input } => {
            let assessment: NewAssessment = read_json(&input)?;
            let store = connect_store().await?;
            let (id, score) = tracker::submit_assessment(&store, assessment).await?;
            println!("Assessment {id} stored with baseline score {score}.");
        }
        Commands::Update {
            assessment,
            input,
            out,
        } => {
            let draft: ProgressDraft = read_json(&input)?;
            let store = connect_store().await?;
            let card = tracker::submit_progress(&store, assessment, draft).await?;
            emit(report::build_scorecard(&card), out.as_deref())?;
        }
        Commands::Scorecard {
            email,
            assessment,
            out,
        } => {
            let store = connect_store().await?;
            let card = match (email, assessment) {
                (Some(email), _) => tracker::lookup_results(&store, &email).await?,
                (None, Some(id)) => {
                    tracker::results_for(&store, id, ReconcileContext::Lookup).await?
                }
                (None, None) => anyhow::bail!("pass --email or --assessment"),
            };
            emit(report::build_scorecard(&card), out.as_deref())?;
        }
        Commands::Score { input } => {
            let assessment: NewAssessment = read_json(&input)?;
            let score = score_baseline(
                assessment.sales_confidence,
                &assessment.selected_kpis,
                &assessment.selected_non_financial_kpis,
                assessment.revenue_forecast_confidence,
                assessment.job_descriptions_clarity,
            );
            println!("Baseline score: {score}/100 {}", report::score_bar(score));
        }
    }

    Ok(())
}
