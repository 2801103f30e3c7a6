//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bjj-bot: posts weekly-topic articles, podcasts, videos and quotes on a daily schedule
#[derive(Parser, Debug)]
#[command(name = "bjj-bot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the slot scheduler until interrupted
    Run(RunArgs),

    /// Show the topic of the week
    Topic(TopicArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Fire the named slot once and exit
    #[arg(long, value_name = "SLOT")]
    pub fire: Option<String>,
}

#[derive(Args, Debug)]
pub struct TopicArgs {
    /// Date to compute the topic for (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
