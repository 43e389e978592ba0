use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use match_ingestion::config::IngestConfig;
use match_ingestion::feed::{read_payloads, write_standings_csv};
use match_ingestion::queue::{DeadLetter, IngestQueue, TaskStatus};
use match_ingestion::repository::{MatchRepository, PgMatchRepository};
use match_ingestion::retry::shutdown_channel;
use match_ingestion::standings::{compute_table, team_directory, TeamRow};
use match_ingestion::types::StandingsScope;
use match_ingestion::worker::IngestionWorker;

#[derive(Debug, Parser)]
#[command(author, version, about = "League match ingestion and standings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest a JSON-lines dump of feed payloads
    Ingest {
        /// Path to the .jsonl file, one payload per line
        #[arg(short, long)]
        file: PathBuf,

        /// Override the number of pool workers
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Print the standings table for a scope
    Standings {
        #[arg(long)]
        season: i64,

        #[arg(long)]
        age_group: i64,

        #[arg(long)]
        division: Option<i64>,

        #[arg(long)]
        match_type: Option<String>,

        /// Write CSV to stdout instead of a text table
        #[arg(long)]
        csv: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = IngestConfig::from_env();

    let repo = PgMatchRepository::connect(&config.database.url, config.database.max_connections)
        .await
        .context("failed to connect to the match store")?;

    match cli.command {
        Commands::Ingest { file, workers } => {
            if let Some(workers) = workers {
                config.worker.workers = workers.max(1);
            }
            run_ingest(Arc::new(repo), &config, file).await
        }
        Commands::Standings {
            season,
            age_group,
            division,
            match_type,
            csv,
        } => {
            let scope = StandingsScope {
                season_id: season,
                age_group_id: age_group,
                division_id: division,
                match_type,
            };
            run_standings(&repo, &scope, csv).await
        }
    }
}

async fn run_ingest(repo: Arc<PgMatchRepository>, config: &IngestConfig, file: PathBuf) -> Result<()> {
    let payloads = read_payloads(&file).with_context(|| format!("failed to read {:?}", file))?;
    let normalizer = config.normalizer()?;

    let (trigger, shutdown) = shutdown_channel();
    let ctrlc_trigger = trigger.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, shutting down");
        ctrlc_trigger.trigger();
    })?;

    let worker = Arc::new(
        IngestionWorker::new(repo, normalizer, config.worker_settings()).with_shutdown(shutdown.clone()),
    );
    let (dead_tx, mut dead_rx) = mpsc::unbounded_channel::<DeadLetter>();
    let queue = IngestQueue::start(worker, config.queue_settings(), Some(dead_tx)).with_shutdown(trigger);

    let pb = ProgressBar::new(payloads.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} payloads ({eta})")?,
    );

    let mut submitted = 0u64;
    let mut malformed = 0u64;
    for payload in payloads {
        if shutdown.is_triggered() {
            break;
        }
        match payload {
            Ok(payload) => {
                queue.submit(payload).await?;
                submitted += 1;
            }
            Err(e) => {
                error!("Skipping feed line: {}", e);
                malformed += 1;
                pb.inc(1);
            }
        }
    }

    while !shutdown.is_triggered() {
        let finished = queue.statuses().values().filter(|s| s.is_terminal()).count() as u64;
        pb.set_position(finished + malformed);
        if finished >= submitted {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let metrics = queue.metrics().clone();
    let statuses = if shutdown.is_triggered() {
        queue.shutdown().await
    } else {
        queue.drain().await
    };
    pb.finish_with_message("Done!");

    let mut summary: BTreeMap<String, usize> = BTreeMap::new();
    for status in statuses.values() {
        let key = match status {
            TaskStatus::Pending => "pending".to_string(),
            TaskStatus::Running => "running".to_string(),
            TaskStatus::Succeeded(result) => result.outcome.to_string(),
            TaskStatus::Failed { class, .. } => format!("failed ({})", class),
        };
        *summary.entry(key).or_default() += 1;
    }

    println!("Submitted {} payloads, {} malformed lines", submitted, malformed);
    for (key, count) in &summary {
        println!("  {:<24} {}", key, count);
    }

    while let Ok(letter) = dead_rx.try_recv() {
        println!(
            "  dead letter #{} [{}] {}: {}",
            letter.task_id, letter.class, serde_json::to_string(&letter.payload)?, letter.message
        );
    }

    let m = metrics.get_metrics();
    info!(
        "Processed {} messages: {} created, {} updated, {} skipped, {} failed, avg {:.1} ms",
        m.total_messages,
        m.created,
        m.updated,
        m.skipped,
        m.failed(),
        m.avg_processing_ms
    );
    Ok(())
}

async fn run_standings(repo: &PgMatchRepository, scope: &StandingsScope, as_csv: bool) -> Result<()> {
    let matches = repo.list_matches(scope).await?;
    let mut team_ids: Vec<i64> = matches
        .iter()
        .flat_map(|m| [m.home_team_id, m.away_team_id])
        .collect();
    team_ids.sort_unstable();
    team_ids.dedup();
    let teams = team_directory(repo.list_teams(&team_ids).await?);

    let table = compute_table(&matches, &teams, scope.division_id);
    info!("Computed standings from {} matches ({} teams)", matches.len(), table.len());

    if as_csv {
        write_standings_csv(&table, std::io::stdout().lock())?;
    } else {
        print_table(&table);
    }
    Ok(())
}

fn print_table(rows: &[TeamRow]) {
    println!(
        "{:>3}  {:<28} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>4} {:>4}",
        "#", "Team", "P", "W", "D", "L", "GF", "GA", "GD", "Pts"
    );
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{:>3}  {:<28} {:>3} {:>3} {:>3} {:>3} {:>4} {:>4} {:>+4} {:>4}",
            i + 1,
            row.team,
            row.played,
            row.wins,
            row.draws,
            row.losses,
            row.goals_for,
            row.goals_against,
            row.goal_difference,
            row.points
        );
    }
}
