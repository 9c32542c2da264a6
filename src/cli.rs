use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "artifact-cave")]
#[command(about = "Manage a filesystem-backed OSGi artifact repository and its repository.xml catalog")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Storage root (defaults to $CAVE_ROOT, then the local data directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    #[arg(long, value_name = "NAME", global = true)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Rebuild the catalog from the storage root
    Scan,
    /// Copy one artifact into the repository
    Upload {
        url: String,
    },
    /// Register artifacts from a file: tree or an HTTP index page
    Proxy {
        url: String,

        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,
    },
    List,
    Location,
    Cleanup,
}
