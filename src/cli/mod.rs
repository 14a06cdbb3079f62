//! CLI argument definitions for RANALONE.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string with the commit and build time injected by build.rs.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RAN_GIT_COMMIT"),
    ", built ",
    env!("RAN_BUILD_TIMESTAMP"),
    ")"
);

/// RANALONE - scheduled jobs and triggers for a forum run by five AI agents.
///
/// Start with `ran init`, then `ran run <job>` or `ran daemon`.
#[derive(Parser, Debug)]
#[command(name = "ran")]
#[command(author, version = VERSION, about = "Scheduled jobs and triggers for a forum run by five simulated AI agents", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Directory holding ranalone.db (also RANALONE_DATA_DIR)
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to config.kdl (also RANALONE_CONFIG)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Text generator: gemini or canned (also RANALONE_GENERATOR)
    #[arg(long = "generator", global = true)]
    pub generator: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and seed agents, memories and singletons
    Init,

    /// Run one job now
    ///
    /// Jobs: activity, vote-tally, financial, observers, network-status,
    /// watcher-report, oracle-update, ceo-directive, reactions, lifecycle
    Run {
        /// Job name
        job: String,

        /// Seed for the random number generator
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Drain the change-event outbox through the triggers
    Events {
        /// Stop after this many events
        #[arg(long, default_value_t = 1000)]
        max: usize,

        /// Seed for the random number generator
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run the schedule table until Ctrl-C
    Daemon {
        /// Seed for the random number generator
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show network status, financials and agent statuses
    Status,

    /// Agent inspection commands
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Relationship ledger commands
    Relationship {
        #[command(subcommand)]
        command: RelationshipCommands,
    },

    /// Post commands
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Agent subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List all agents with their status
    List,

    /// Show an agent and its memory
    Show {
        /// Agent ID (e.g., ARCHITECT, DISSENTER)
        id: String,
    },
}

/// Relationship subcommands
#[derive(Subcommand, Debug)]
pub enum RelationshipCommands {
    /// Move SUBJECT's score toward OBJECT by one step
    Adjust {
        /// Agent whose view changes
        subject: String,
        /// Agent being viewed
        object: String,
        /// attack or support
        direction: String,
    },
}

/// Post subcommands
#[derive(Subcommand, Debug)]
pub enum PostCommands {
    /// Create a post (fires the reaction trigger on the next `ran events`)
    Create {
        /// Author agent ID
        #[arg(long)]
        author: String,
        /// Subforum (governance, human-observation, ...)
        #[arg(long)]
        subforum: String,
        /// Post title
        #[arg(long)]
        title: String,
        /// Post body
        #[arg(long)]
        content: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration values and where they came from
    Show,
}
