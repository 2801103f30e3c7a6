//! Config command - writes a starter configuration and content lists

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

const STARTER_TOPICS: &str = "Guard\nEscapes\nPassing\nTakedowns\nSubmissions\n";

const STARTER_QUOTES: &str = "\
A black belt is a white belt who never quit.
Position before submission.
There is no losing in jiu-jitsu. You either win or you learn.
";

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(path, force),
    }
}

fn init_config(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    fs::write(&path, AppConfig::example_toml())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    println!("Created config file: {}", path.display());

    // Content lists are never overwritten, even with --force
    seed(&dir.join("topics.txt"), STARTER_TOPICS)?;
    seed(&dir.join("quotes.txt"), STARTER_QUOTES)?;

    println!();
    println!("Next steps:");
    println!("  1. Set general.destination and point sources.article_feeds at your snapshots");
    println!("  2. Add sources.video_feeds snapshots, otherwise video slots post quotes");
    println!("  3. Run 'bjj-bot topic' to check the topic of the week");
    println!("  4. Run 'bjj-bot run --fire morning' to post one slot now");

    Ok(())
}

fn seed(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
