mod commands;
mod export;
mod logging;
mod messages;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;

use agwa_join_core::config::{load_configuration, AppConfig};
use agwa_join_core::project::ProjectSession;
use agwa_join_core::JoinResultsTool;
use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use messages::CliMessenger;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let guard = logging::init_logger(config.debug);

    let args = Cli::parse();
    let project_path = args
        .project
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.project_path));

    let result = match args.command {
        Some(Commands::ListDiscretizations) => run_list_discretizations(&config, &project_path),
        Some(Commands::Inspect {
            discretization,
            csv,
        }) => run_inspect(&config, &project_path, &discretization, csv.as_deref()),
        Some(Commands::ListSimulations { discretization }) => {
            run_list_simulations(&config, &project_path, &discretization)
        }
        Some(Commands::Join {
            discretization,
            simulation,
        }) => run_join(&config, &project_path, &discretization, &simulation),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

fn open_session(project_path: &Path) -> anyhow::Result<ProjectSession> {
    ProjectSession::open(project_path)
        .with_context(|| format!("opening project {}", project_path.display()))
}

fn run_list_discretizations(config: &AppConfig, project_path: &Path) -> anyhow::Result<()> {
    let session = open_session(project_path)?;
    let discretizations = JoinResultsTool::new(config).discretizations(&session)?;

    if discretizations.is_empty() {
        println!("No discretizations found in the active map");
    }
    for name in discretizations {
        println!("{}", name);
    }
    Ok(())
}

fn run_inspect(
    config: &AppConfig,
    project_path: &Path,
    discretization: &str,
    csv_path: Option<&Path>,
) -> anyhow::Result<()> {
    let session = open_session(project_path)?;
    let messenger = CliMessenger::new(config.debug);
    let params = JoinResultsTool::new(config).refresh(&session, discretization, &messenger)?;

    if params.existing_joins_status.is_empty() {
        println!("No joins found on '{}'", discretization);
    } else {
        println!("{}", params.existing_joins_status);
    }
    if let Some(workspace) = &params.workspace {
        println!("Workspace: {}", workspace.display().to_string().cyan());
    }
    if let Some(delineation) = &params.delineation {
        println!("Delineation: {}", delineation.cyan());
    }

    if let Some(csv_path) = csv_path {
        let file = File::create(csv_path)
            .with_context(|| format!("creating {}", csv_path.display()))?;
        export::write_joins(file, &params.existing_joins)?;
        info!(
            "{} existing join(s) written to {}",
            params.existing_joins.len(),
            csv_path.display()
        );
    }
    Ok(())
}

fn run_list_simulations(
    config: &AppConfig,
    project_path: &Path,
    discretization: &str,
) -> anyhow::Result<()> {
    let session = open_session(project_path)?;
    let messenger = CliMessenger::new(config.debug);
    let params = JoinResultsTool::new(config).refresh(&session, discretization, &messenger)?;

    if params.simulations.is_empty() {
        println!("No simulations with results found for '{}'", discretization);
    }
    for simulation in &params.simulations {
        println!("{}", simulation.display());
    }
    Ok(())
}

fn run_join(
    config: &AppConfig,
    project_path: &Path,
    discretization: &str,
    simulation: &str,
) -> anyhow::Result<()> {
    let mut session = open_session(project_path)?;
    let messenger = CliMessenger::new(config.debug);
    let tool = JoinResultsTool::new(config);

    let params = tool.refresh(&session, discretization, &messenger)?;
    let target = params
        .find_simulation(simulation)
        .cloned()
        .ok_or_else(|| anyhow!("'{}' is not a simulation with results for '{}'", simulation, discretization))?;

    let outcome = tool.execute(&mut session, discretization, &target, &messenger);
    // The map reflects whatever steps ran, so it is saved even on failure.
    session.save()?;
    let params = outcome?;

    if let (Some(elements), Some(streams)) = (&params.joined_elements, &params.joined_streams) {
        println!(
            "{} '{}' and '{}' joined to {}",
            "✓".green(),
            elements,
            streams,
            target.display()
        );
    }
    Ok(())
}
