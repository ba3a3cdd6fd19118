use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deltacov")]
#[command(about = "Incremental code coverage collector and changed-line report generator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ./deltacov.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect a capture from every node of an application
    Collect {
        /// Application name
        app: String,

        /// Version tag identifying the capture scope
        #[arg(long)]
        tag: String,

        /// Cluster the nodes belong to
        #[arg(long)]
        cluster: Option<String>,
    },

    /// Merge all unmerged captures of a scope into one artifact
    Merge {
        /// Application name
        app: String,

        /// Version tag identifying the capture scope
        #[arg(long)]
        tag: String,

        /// Cluster the captures belong to
        #[arg(long)]
        cluster: Option<String>,
    },

    /// Generate the incremental coverage report for a revision pair
    Report {
        /// Application name
        app: String,

        /// Version tag; also names the checkout `<app>-<tag>`
        #[arg(long)]
        tag: String,

        /// Cluster the captures belong to
        #[arg(long)]
        cluster: Option<String>,

        /// Base revision of the comparison
        #[arg(long = "base-ref")]
        base_ref: String,

        /// New revision of the comparison
        #[arg(long = "new-ref")]
        new_ref: String,

        /// Use this capture file instead of the scope's captures
        #[arg(long)]
        capture: Option<PathBuf>,

        /// Merge every unmerged capture in the scope before analysis
        #[arg(long = "merge-all")]
        merge_all: bool,
    },

    /// Delete old captures beyond the retention count
    Prune {
        /// Application name
        app: String,

        /// Version tag identifying the capture scope
        #[arg(long)]
        tag: String,

        /// Cluster the captures belong to
        #[arg(long)]
        cluster: Option<String>,

        /// Unmerged captures to keep (merged keep half, at least one)
        #[arg(long)]
        keep: Option<usize>,
    },

    /// Zero the in-memory probe data on every node
    Reset {
        /// Application name
        app: String,

        /// Cluster the nodes belong to
        #[arg(long)]
        cluster: Option<String>,
    },
}
