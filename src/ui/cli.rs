use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quickfind - Find files by name, fast
#[derive(Parser, Debug)]
#[command(name = "quickfind")]
#[command(about = "A fast, local-first file finder with a persistent name index", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom base directory (default: ~/.quickfind)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Store the index at this path instead of inside the base directory
    #[arg(long, global = true)]
    pub index_path: Option<PathBuf>,

    /// Directory to search (repeatable, default: home directory)
    #[arg(short, long = "root", value_name = "DIR", global = true)]
    pub roots: Vec<PathBuf>,

    /// Include dot-prefixed files and directories
    #[arg(long, global = true)]
    pub hidden: bool,

    /// Maximum depth below a root
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the index from scratch
    Index,
    /// Rebuild the index, then keep it up to date until Enter is pressed
    Watch {
        /// Skip the initial rebuild
        #[arg(long)]
        no_rebuild: bool,
    },
    /// Search the index
    Search {
        /// Query, e.g. "report !draft .pdf" or "invoice|receipt"
        query: String,
        /// Maximum number of results to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Print one JSON object per result
        #[arg(long)]
        json: bool,
    },
    /// Search by walking the roots directly, without the index
    Scan {
        /// Query, e.g. "report !draft .pdf" or "invoice|receipt"
        query: String,
        /// Maximum number of results to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Print one JSON object per result
        #[arg(long)]
        json: bool,
    },
    /// Show index location and size
    Status,
}
