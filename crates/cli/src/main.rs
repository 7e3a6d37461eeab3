//! podprint command-line entry point.
//!
//! Prints file digests and glob-source rows with their fingerprints. Results
//! go to stdout as JSON lines; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use podprint_core::{FileHasher, HashMode, Hashers, HashingConfig, PathSet};
use podprint_source::{GlobSource, Source};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "podprint", about = "Content fingerprints for files, tables and pipeline sources", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash files or directories by content.
    File {
        paths: Vec<PathBuf>,

        /// Bypass the configured cache.
        #[arg(long)]
        no_cache: bool,

        /// Hash all paths together as one path set.
        #[arg(long)]
        combined: bool,
    },

    /// List the rows a glob source yields, with the source fingerprint.
    Glob {
        location: PathBuf,

        #[arg(long, default_value = "*")]
        pattern: String,

        /// Packet key the matched paths are stored under.
        #[arg(long, default_value = "path")]
        name: String,

        /// How the tag function contributes to the fingerprint.
        #[arg(long, default_value = "name")]
        tag_mode: HashMode,

        /// Also print the content digest of every matched file.
        #[arg(long)]
        digests: bool,
    },

    /// Print the effective configuration.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = HashingConfig::load().context("failed to load configuration")?;
    tracing::debug!(backend = ?config.cache_backend, "configuration loaded");

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let hashers = Hashers::from_config(&config)?;

    match cli.command {
        Commands::File { paths, no_cache, combined } => hash_files(&hashers, paths, !no_cache, combined)?,
        Commands::Glob { location, pattern, name, tag_mode, digests } => {
            let source = GlobSource::builder(name, location)
                .pattern(pattern)
                .absolute_path(true)
                .tag_function_hash_mode(tag_mode)
                .build()?;
            list_glob(&hashers, &source, digests)?;
        }
        Commands::Config => {}
    }

    Ok(())
}

fn hash_files(hashers: &Hashers, paths: Vec<PathBuf>, with_cache: bool, combined: bool) -> Result<()> {
    let hasher = hashers.composite_file_hasher(with_cache);
    if combined {
        let pathset: PathSet = paths.into_iter().map(PathSet::Path).collect();
        println!("{}", json!({ "pathset": hasher.hash_pathset(&pathset)?.to_hex() }));
        return Ok(());
    }
    for path in paths {
        let digest = hasher.hash_pathset(&PathSet::Path(path.clone()))?;
        println!("{}", json!({ "path": path, "digest": digest.to_hex() }));
    }
    Ok(())
}

fn list_glob(hashers: &Hashers, source: &GlobSource, digests: bool) -> Result<()> {
    let fingerprint = hashers.object_hasher().hash_to_string(&Source::identity_structure(source, &[]))?;
    tracing::info!(source = %source, fingerprint = %fingerprint, "listing glob source");

    let file_hasher = hashers.composite_file_hasher(true);
    let mut count = 0usize;
    for row in source.forward(Vec::new())? {
        let (tag, packet) = row?;
        let mut line = json!({ "tag": tag, "packet": packet });
        if digests {
            let path = packet.get(source.name()).context("row is missing its packet key")?;
            line["digest"] = json!(file_hasher.hash_file(Path::new(path))?.to_hex());
        }
        println!("{line}");
        count += 1;
    }
    println!("{}", json!({ "source": source.to_string(), "fingerprint": fingerprint, "rows": count }));
    Ok(())
}
