use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fieldops::cli::{Cli, Commands, OutputFormat};
use fieldops::config::DispatchConfig;
use fieldops::error::Result;
use fieldops::lifecycle::StatusUpdate;
use fieldops::run::DistributionRunController;
use fieldops::store::{DispatchStore, FileStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fieldops=debug")
    } else {
        EnvFilter::new("fieldops=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".fieldops"));

    if let Commands::Init = cli.command {
        let store = FileStore::new(&data_dir);
        store.init().await?;
        let config = DispatchConfig::default();
        config.save(&data_dir).await?;
        println!("Initialized fieldops data directory at {}", data_dir.display());
        return Ok(());
    }

    let store = FileStore::new(&data_dir);
    if !store.is_initialized() {
        return Err(fieldops::DispatchError::NotInitialized);
    }
    let config = DispatchConfig::load(&data_dir).await?;
    let store: Arc<dyn DispatchStore> = Arc::new(store);
    let controller = DistributionRunController::new(Arc::clone(&store), &config);
    let now = chrono::Utc::now();

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Run => {
            let report = controller.distribute(now).await?;
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print_report(&report),
            }
        }
        Commands::Status {
            mission_id,
            status,
            notes,
        } => {
            let mut update = StatusUpdate::new(status.into());
            if let Some(notes) = notes {
                update = update.with_notes(notes);
            }
            let mission = controller.update_mission_status(&mission_id, update, now).await?;
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&mission)?),
                OutputFormat::Text => {
                    println!("mission {} -> {}", mission.id, mission.status)
                }
            }
        }
        Commands::Agents => {
            let agents = store.list_active_agents().await?;
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&agents)?),
                OutputFormat::Text => {
                    for a in agents {
                        println!(
                            "{:<12} {:<10} load {}/{} declines {}/{} devices {}",
                            a.id,
                            a.status.to_string(),
                            a.active_missions,
                            a.max_hold,
                            a.monthly_declines,
                            a.max_decline,
                            a.devices_allowed,
                        );
                    }
                }
            }
        }
        Commands::Missions => {
            let missions = store.list_open_missions().await?;
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&missions)?),
                OutputFormat::Text => {
                    for m in missions {
                        println!(
                            "{:<38} {:<10} target {:<12} agent {:<12} due {}",
                            m.id,
                            m.status.to_string(),
                            m.target_id,
                            m.agent_id,
                            m.deadline
                        );
                    }
                }
            }
        }
        Commands::Expire => {
            let failed = controller.expire_overdue(now).await?;
            println!("{} mission(s) failed for exceeding their deadline", failed.len());
            for id in failed {
                println!("  {id}");
            }
        }
    }
    Ok(())
}

fn print_report(report: &fieldops::RunReport) {
    println!(
        "run at {}: {} assigned, {} unassigned ({} targets, {} agents considered)",
        report.started_at,
        report.assigned,
        report.unassigned.len(),
        report.targets_considered,
        report.agents_considered,
    );
    for a in &report.assignments {
        println!(
            "  {} -> {} ({:.1} km, due {})",
            a.target_id, a.agent_id, a.distance_km, a.deadline
        );
    }
    for u in &report.unassigned {
        println!("  {} unassigned: {}", u.target_id, u.reason);
    }
    for load in &report.agent_loads {
        println!(
            "  agent {}: +{} missions ({} active)",
            load.agent_id, load.new_missions, load.active_missions
        );
    }
}
