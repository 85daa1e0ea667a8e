//! Kardboard - Kanban flow tracking and metrics

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kardboard::{
    config::{get_config_dir, get_data_dir, load_config, load_config_from, save_config, Config},
    db::init_database,
    domain::Card,
    flow::{make_end_date, month_range, start_of_day},
    jobs::{JobRunner, Scheduler},
    reports::{Board, ServiceClassRecord, WeeklyFlowSummary, ALL_GROUP},
    state_machine::CardTracker,
    tickets::build_adapter,
};

#[derive(Parser)]
#[command(name = "kardboard")]
#[command(author = "Kardboard Team")]
#[command(version)]
#[command(about = "Kanban flow tracking - card state history, WIP and cycle time metrics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Database path (defaults to the data directory)
    #[arg(short, long, env = "KARDBOARD_DATABASE")]
    database: Option<String>,

    /// Config file (defaults to the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,
    /// Show configuration info
    Config,
    /// Start tracking a ticket as a card (in the backlog unless a state is given)
    AddCard {
        key: String,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Refresh one card from the ticket system
    UpdateTicket { key: String },
    /// Refresh every card whose ticket data is stale
    QueueUpdates,
    /// Recompute recent daily records for every report group
    DailyRecords {
        /// Trailing days to recompute
        #[arg(long)]
        days: Option<i64>,
    },
    /// Capture flow reports and service class snapshots for every report group
    FlowReports,
    /// Service class report for cards done in a date range (defaults to this month)
    ServiceClasses {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value = ALL_GROUP)]
        group: String,
    },
    /// Print a team board
    Board {
        #[arg(long)]
        team: Option<String>,
    },
    /// Weekly flow summary for the week containing a date (defaults to today)
    Summary {
        #[arg(long)]
        week_of: Option<NaiveDate>,
        #[arg(long, default_value = ALL_GROUP)]
        group: String,
    },
    /// Run the job scheduler until interrupted (default)
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(),
    };
    // fail on a bad state configuration before touching the database
    let states = config.state_sequence()?;

    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database.get_path().to_string_lossy().to_string());

    let config = Arc::new(config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => {
            println!("Initializing database at: {}", db_path);
            let _pool = init_database(&db_path).await?;
            println!("Database initialized successfully!");

            let config_path = get_config_dir().join("config.toml");
            if cli.config.is_none() && !config_path.exists() {
                save_config(&config)?;
                println!("Wrote default configuration to: {}", config_path.display());
            }
        }
        Commands::Config => {
            println!("Kardboard Configuration");
            println!("=======================");
            println!("Config directory: {}", get_config_dir().display());
            println!("Data directory: {}", get_data_dir().display());
            println!("Database path: {}", db_path);
            println!("States: {}", states.iter().collect::<Vec<_>>().join(" -> "));
            println!(
                "Backlog / start / done: {} / {} / {}",
                states.backlog(),
                states.start(),
                states.done()
            );
            println!("Ticket system: {}", config.tickets.system);
            println!("Report groups: {}", config.report_group_names().join(", "));
        }
        Commands::AddCard {
            key,
            team,
            state,
            title,
        } => {
            let runner = open_runner(&db_path, &config).await?;
            let card = add_card(
                runner.tracker(),
                &key,
                team,
                state,
                title,
                Utc::now(),
            )
            .await?;
            println!("Added {} in {}", card.key, card.state);
        }
        Commands::UpdateTicket { key } => {
            let runner = open_runner(&db_path, &config).await?;
            let outcome = runner.update_ticket(&key).await?;
            match outcome.transition {
                Some(t) => println!(
                    "{}: {} -> {}",
                    key,
                    t.from.as_deref().unwrap_or("(new)"),
                    t.to
                ),
                None => println!("{}: no state change", key),
            }
        }
        Commands::QueueUpdates => {
            let runner = open_runner(&db_path, &config).await?;
            print_json(&runner.queue_updates().await?)?;
        }
        Commands::DailyRecords { days } => {
            let runner = open_runner(&db_path, &config).await?;
            let days = days.unwrap_or(config.jobs.daily_record_days);
            print_json(&runner.update_daily_records(days).await)?;
        }
        Commands::FlowReports => {
            let runner = open_runner(&db_path, &config).await?;
            print_json(&runner.update_flow_reports().await)?;
        }
        Commands::ServiceClasses { start, end, group } => {
            let pool = init_database(&db_path).await?;
            let (month_start, month_end) = month_range(Utc::now());
            let start = start.unwrap_or(month_start.date_naive());
            let end = end.unwrap_or(month_end.date_naive());
            let record = ServiceClassRecord::calculate(&pool, &config, start, end, &group).await?;
            print_json(&record)?;
        }
        Commands::Board { team } => {
            let pool = init_database(&db_path).await?;
            let board = Board::load(&pool, &config, team.as_deref(), Utc::now()).await?;
            print_json(&board)?;
        }
        Commands::Summary { week_of, group } => {
            let pool = init_database(&db_path).await?;
            let week_of = week_of
                .map(start_of_day)
                .unwrap_or_else(|| make_end_date(Utc::now()));
            let summary = WeeklyFlowSummary::calculate(&pool, &config, &group, week_of).await?;
            print_json(&summary)?;
        }
        Commands::Run => {
            let runner = open_runner(&db_path, &config).await?;
            run_scheduler(runner, &config).await?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kardboard=info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn open_runner(db_path: &str, config: &Arc<Config>) -> anyhow::Result<Arc<JobRunner>> {
    tracing::info!("Opening database at: {}", db_path);
    let pool = init_database(db_path).await?;
    let tracker = CardTracker::new(pool, Arc::clone(config))?;
    let adapter = build_adapter(config)?;
    Ok(Arc::new(JobRunner::new(tracker, adapter)))
}

async fn add_card(
    tracker: &CardTracker,
    key: &str,
    team: Option<String>,
    state: Option<String>,
    title: Option<String>,
    now: DateTime<Utc>,
) -> anyhow::Result<Card> {
    if tracker.get(key).await.is_ok() {
        bail!("Card {} already exists", key);
    }

    let state = state.unwrap_or_else(|| tracker.states().backlog().to_string());
    if !tracker.states().contains(&state) {
        bail!("Unknown state '{}'", state);
    }

    let mut card = Card::new(key, now).with_state(state);
    if let Some(team) = team {
        card = card.with_team(team);
    }
    if let Some(title) = title {
        card = card.with_title(title);
    }

    tracker.save_at(&mut card, now).await?;
    Ok(card)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_scheduler(runner: Arc<JobRunner>, config: &Config) -> anyhow::Result<()> {
    let scheduler = Arc::new(Scheduler::new(runner, config.jobs.clone()));
    let handles = scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
