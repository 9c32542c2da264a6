use anyhow::{Context, Result};
use artifact_cave::cli::{Cli, Commands};
use artifact_cave::config::{RepositoryOptions, resolve_name, resolve_root};
use artifact_cave::{ArtifactRecord, Repository};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use url::Url;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let name = resolve_name(&cli);
    let root = resolve_root(&cli)?;

    let mut options = RepositoryOptions::default();
    if let Commands::Proxy {
        max_depth: Some(depth),
        ..
    } = &cli.command
    {
        options.max_proxy_depth = *depth;
    }

    let repository = Repository::builder(&name, &root)
        .options(options)
        .open()
        .with_context(|| format!("Failed to open repository {name} at {}", root.display()))?;

    match cli.command {
        Commands::Scan => {
            repository.scan()?;
            print_summary(&repository)?;
        }
        Commands::Upload { url } => {
            let url = parse_source(&url)?;
            match repository.upload(&url)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => anyhow::bail!("{url} is not a valid artifact"),
            }
        }
        Commands::Proxy { url, .. } => {
            repository.proxy(&parse_source(&url)?)?;
            print_summary(&repository)?;
        }
        Commands::List => {
            let resources = repository.catalog().resources()?;
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        Commands::Location => {
            println!("{}", repository.catalog_document_location()?);
        }
        Commands::Cleanup => {
            repository.cleanup()?;
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    name: &'a str,
    location: String,
    increment: u64,
    resources: usize,
    latest: Option<ArtifactRecord>,
}

fn print_summary(repository: &Repository) -> Result<()> {
    let resources = repository.catalog().resources()?;
    let summary = Summary {
        name: repository.name(),
        location: repository.location().to_string_lossy().to_string(),
        increment: repository.increment()?,
        resources: resources.len(),
        latest: resources.last().cloned(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Accepts a URL or a local path.
fn parse_source(raw: &str) -> Result<Url> {
    let path = Path::new(raw);
    if path.exists() {
        let path = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve path: {raw}"))?;
        return Url::from_file_path(&path)
            .map_err(|_| anyhow::anyhow!("Not an absolute path: {}", path.display()));
    }
    Url::parse(raw).with_context(|| format!("Invalid URL or missing path: {raw}"))
}
