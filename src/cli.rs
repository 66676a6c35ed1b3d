use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dayplan", version, about = "Terminal day planner of 15-minute blocks")]
pub struct Cli {
    /// Use this store file instead of the project/global lookup
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project-local planner in the current directory
    Init,
    /// Print the planner grid
    Show,
    /// Print the block that contains the current time
    Now,
    /// Toggle the block containing a time of day
    Toggle {
        /// Time of day in HH:MM format
        time: String,
    },
    /// Show or change the sleep window (pass both --start and --end to change it)
    Sleep {
        /// Sleep start (HH:MM)
        #[arg(long)]
        start: Option<String>,
        /// Sleep end (HH:MM)
        #[arg(long)]
        end: Option<String>,
    },
    /// Set or clear the note attached to an hour
    Note {
        /// Hour of day (0-23)
        hour: u32,
        /// Note text; omit to clear
        text: Option<String>,
    },
    /// Print the effective configuration
    Config,
    /// Launch the interactive TUI
    Tui,
}
