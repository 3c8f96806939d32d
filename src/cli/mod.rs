pub mod onboard;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "Daybook",
    about = "Activity log, shared clipboard & file drop"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run the HTTP service in the foreground
    Service,
    Status,
    Doctor,
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },
    Clipboard {
        #[command(subcommand)]
        command: ClipboardCommands,
    },
    /// List uploaded files
    Files,
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    Download {
        blob_id: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum ActivityCommands {
    Add {
        text: String,
        /// Day the activity happened (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    List {
        /// all | today | week | month
        #[arg(long, default_value = "all")]
        filter: String,
        /// date | created_at
        #[arg(long)]
        field: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum ClipboardCommands {
    Get,
    Set {
        text: String,
        /// Entry to overwrite; defaults to the current entry
        #[arg(long, conflicts_with = "new")]
        id: Option<i64>,
        /// Always create a new entry
        #[arg(long, default_value_t = false)]
        new: bool,
    },
    Clear {
        id: i64,
    },
}
