use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::cli::Cli;

pub const ROOT_ENV: &str = "CAVE_ROOT";
pub const DEFAULT_NAME: &str = "default";
pub const DEFAULT_MAX_PROXY_DEPTH: usize = 32;
pub const DEFAULT_MAX_CONTENT_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Index the storage root right after construction.
    pub scan_on_init: bool,
    /// How many index pages deep an HTTP proxy descends.
    pub max_proxy_depth: usize,
    pub max_content_size: u64,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            scan_on_init: false,
            max_proxy_depth: DEFAULT_MAX_PROXY_DEPTH,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
        }
    }
}

pub fn resolve_name(cli: &Cli) -> String {
    cli.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string())
}

pub fn resolve_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.root.clone() {
        return Ok(p);
    }

    if let Ok(p) = env::var(ROOT_ENV)
        && !p.is_empty()
    {
        return Ok(PathBuf::from(p));
    }

    Ok(cave_home()?.join(resolve_name(cli)))
}

fn cave_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("artifact-cave"))
}
