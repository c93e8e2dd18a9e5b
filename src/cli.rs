//! Command-line interface for operating the distribution engine against a
//! file-backed store.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::lifecycle::MissionStatus;

#[derive(Parser)]
#[command(name = "fieldops")]
#[command(author, version, about = "Field-mission distribution engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Data directory (default: .fieldops)
    #[arg(long, global = true, env = "FIELDOPS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory and default config
    Init,

    /// Trigger a distribution run and print the report
    Run,

    /// Post a mission status update
    Status {
        /// Mission ID
        mission_id: String,

        /// New status
        #[arg(value_enum)]
        status: StatusArg,

        /// Notes (required when completing, recorded as the decline or
        /// failure reason otherwise)
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the agent roster with current load
    Agents,

    /// List open missions
    Missions,

    /// Fail open missions past their deadline
    Expire,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StatusArg {
    EnRoute,
    OnSite,
    Completed,
    Declined,
    Cancelled,
}

impl From<StatusArg> for MissionStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::EnRoute => MissionStatus::EnRoute,
            StatusArg::OnSite => MissionStatus::OnSite,
            StatusArg::Completed => MissionStatus::Completed,
            StatusArg::Declined => MissionStatus::Declined,
            StatusArg::Cancelled => MissionStatus::Cancelled,
        }
    }
}
