use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "agwa-join")]
#[command(about = "Join AGWA simulation results to discretization layers", long_about = None)]
pub struct Cli {
    /// Project file to use instead of the configured one
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the discretizations found in the active map
    ListDiscretizations,
    /// Show the results joins currently on a discretization's layers
    Inspect {
        discretization: String,
        /// Write the existing joins table to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// List the simulations with results that can be joined
    ListSimulations { discretization: String },
    /// Replace the discretization's results join with a simulation's results
    Join {
        discretization: String,
        /// Simulation name or simulation directory
        simulation: String,
    },
    /// Print configuration values
    PrintConfig,
}
