//! CLI argument definitions using clap

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueHint};
use rust_decimal::Decimal;

use crate::config::StoreBackend;
use crate::domain::NodeKind;

/// Typed real-estate hierarchy: corporations, buildings, properties, tenancy periods and tenants
#[derive(Parser, Debug)]
#[command(name = "proptree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Node store file (overrides config)
    #[arg(short, long, global = true, env = "PROPTREE_STORE", value_hint = ValueHint::FilePath)]
    pub store: Option<PathBuf>,

    /// Store backend (overrides config)
    #[arg(long, global = true)]
    pub backend: Option<StoreBackend>,

    /// Print nodes as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a node
    Create(CreateArgs),

    /// Show a single node
    Show {
        /// Node id
        id: u64,
    },

    /// List direct children of a node
    Children {
        /// Node id
        id: u64,
    },

    /// Move a node (with its subtree) under a new parent
    Move {
        /// Node to move
        id: u64,
        /// New parent
        parent: u64,
    },

    /// List ancestors, nearest first
    Ancestors {
        /// Node id
        id: u64,
    },

    /// Show hierarchy as tree
    Tree {
        /// Subtree root (default: all corporations)
        id: Option<u64>,
    },

    /// Recompute stored heights from the roots down
    Repair,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Display name
    #[arg(short, long)]
    pub name: String,

    /// Node type (corporation, building, property, tenancy-period, tenant)
    #[arg(short, long)]
    pub kind: NodeKind,

    /// Parent node id
    #[arg(short, long)]
    pub parent: Option<u64>,

    /// Zip code (building)
    #[arg(long)]
    pub zip_code: Option<String>,

    /// Monthly rent (property)
    #[arg(long)]
    pub monthly_rent: Option<Decimal>,

    /// Active flag (tenancy period, tenant): true or false
    #[arg(long)]
    pub active: Option<String>,

    /// Move-in date, YYYY-MM-DD (tenant)
    #[arg(long)]
    pub moved_in_date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}
