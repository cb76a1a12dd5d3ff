//! Command-line arguments.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::DEFAULT_CONFIG_PATH;

/// FairGuard - a fair point ledger for chores, rewards, and consequences
#[derive(Debug, Clone, Parser)]
#[command(name = "fairguard", version, about)]
pub struct Cli {
    /// Settings file
    #[arg(long, env = "FAIRGUARD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory holding the saved ledger (overrides `[storage] data_dir`)
    #[arg(long, env = "FAIRGUARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep the ledger in memory only; nothing is saved (wins over --data-dir)
    #[arg(long)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Add a child profile
    AddChild {
        name: String,
        /// Age in years (1-25)
        age: u32,
    },

    /// List children and their balances
    List,

    /// Make a child the active one
    Select {
        /// Child id or name
        child: String,
    },

    /// Show the chore catalog
    Chores,

    /// Show the reward catalog
    Rewards,

    /// Record a completed chore
    Chore {
        chore_id: String,
        /// Child id or name (defaults to the selected child)
        #[arg(short, long)]
        child: Option<String>,
    },

    /// Redeem a reward
    Redeem {
        reward_id: String,
        /// Child id or name (defaults to the selected child)
        #[arg(short, long)]
        child: Option<String>,
    },

    /// Ask the advisor for a consequence, then review it before it touches the ledger
    Behavior {
        /// What happened
        text: String,
        /// Child id or name (defaults to the selected child)
        #[arg(short, long)]
        child: Option<String>,
        /// Apply the suggestion without asking
        #[arg(long)]
        confirm: bool,
        /// Show the suggestion and discard it without asking
        #[arg(long, conflicts_with = "confirm")]
        discard: bool,
    },

    /// Show a child's activity history, newest first
    History {
        #[arg(short, long)]
        child: Option<String>,
    },

    /// Show a child's recent running balance
    Chart {
        #[arg(short, long)]
        child: Option<String>,
    },
}

impl CliCommand {
    /// The child selector, for commands that act on one child.
    pub fn child_query(&self) -> Option<&str> {
        match self {
            Self::Select { child } => Some(child.as_str()),
            Self::Chore { child, .. }
            | Self::Redeem { child, .. }
            | Self::Behavior { child, .. }
            | Self::History { child }
            | Self::Chart { child } => child.as_deref(),
            Self::AddChild { .. } | Self::List | Self::Chores | Self::Rewards => None,
        }
    }
}
