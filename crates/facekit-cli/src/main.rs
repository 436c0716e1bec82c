use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facekit_core::cache::load_known;
use facekit_core::{ChangeDetector, Config};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facekit", about = "Inspect facekit reference folders and encoding caches")]
struct Cli {
    /// TOML config file (defaults come from FACEKIT_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show files added or removed since the last cache update (does not advance the snapshot)
    Changes {
        /// Reference image folder
        folder: PathBuf,
    },
    /// List identities in a folder's encoding cache
    List {
        /// Reference image folder
        folder: PathBuf,
    },
    /// Show supported image formats
    Formats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Changes { folder } => changes(&config, &folder, cli.json)?,
        Commands::List { folder } => list(&config, &folder, cli.json)?,
        Commands::Formats => {
            if cli.json {
                println!("{}", serde_json::json!(config.compatible_formats));
            } else {
                for format in &config.compatible_formats {
                    println!("{format}");
                }
            }
        }
    }

    Ok(())
}

fn changes(config: &Config, folder: &Path, json: bool) -> Result<()> {
    let detection = ChangeDetector::new(config.clone())
        .detect(folder)
        .with_context(|| format!("scanning {}", folder.display()))?;
    let set = &detection.change_set;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "changed": detection.changed,
                "added": set.added,
                "removed": set.removed,
            })
        );
        return Ok(());
    }

    if !detection.changed {
        println!("{}: unchanged ({} files)", folder.display(), detection.snapshot.len());
        return Ok(());
    }
    for name in &set.added {
        let note = if config.is_compatible(name) { "" } else { " (unsupported, ignored)" };
        println!("+ {name}{note}");
    }
    for name in &set.removed {
        let note = if config.is_compatible(name) { "" } else { " (unsupported, ignored)" };
        println!("- {name}{note}");
    }
    Ok(())
}

fn list(config: &Config, folder: &Path, json: bool) -> Result<()> {
    let Some(known) = load_known(config, folder)
        .with_context(|| format!("reading encoding cache for {}", folder.display()))?
    else {
        println!("no encoding cache at {}", config.encodings_path(folder).display());
        return Ok(());
    };

    if json {
        let names: Vec<&String> = known.keys().collect();
        println!("{}", serde_json::json!(names));
    } else if known.is_empty() {
        println!("encoding cache is empty");
    } else {
        for (name, encoding) in &known {
            println!("{name}\t{} values", encoding.len());
        }
    }
    Ok(())
}
