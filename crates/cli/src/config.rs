//! Configuration loading and management

use anyhow::{Context, Result, bail};
use bjj_bot_domain::{Category, Slot, TextFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::{Time, UtcOffset};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_topics_file")]
    pub topics_file: PathBuf,

    #[serde(default = "default_quotes_file")]
    pub quotes_file: PathBuf,

    #[serde(default)]
    pub destination: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub utc_offset_hours: i8,

    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBacking {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backing: StoreBacking,

    #[serde(default = "default_used_links_path")]
    pub local_path: PathBuf,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub remote: RemoteStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default = "default_remote_path")]
    pub path: String,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default = "default_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub article_feeds: Vec<PathBuf>,

    #[serde(default)]
    pub video_feeds: Vec<PathBuf>,

    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_keyword")]
    pub keyword: String,

    #[serde(default = "default_video_result_limit")]
    pub result_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_outbox_path")]
    pub outbox_path: PathBuf,

    #[serde(default)]
    pub format: TextFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    pub name: String,

    /// Local wall-clock time, "HH:MM"
    pub at: String,

    #[serde(default)]
    pub chain: Vec<String>,

    #[serde(default)]
    pub headline: String,
}

// Default value functions
fn default_topics_file() -> PathBuf {
    PathBuf::from("./topics.txt")
}

fn default_quotes_file() -> PathBuf {
    PathBuf::from("./quotes.txt")
}

fn default_poll_interval() -> u64 {
    10
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("./slot_ledger.json")
}

fn default_used_links_path() -> PathBuf {
    PathBuf::from("./used_links.txt")
}

fn default_max_attempts() -> u32 {
    bjj_bot_domain::store::DEFAULT_MAX_ATTEMPTS
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_remote_path() -> String {
    "used_links.txt".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_video_keyword() -> String {
    "BJJ".to_string()
}

fn default_video_result_limit() -> usize {
    5
}

fn default_outbox_path() -> PathBuf {
    PathBuf::from("./outbox.jsonl")
}

fn default_slots() -> Vec<SlotConfig> {
    vec![
        SlotConfig {
            name: "morning".to_string(),
            at: "12:00".to_string(),
            chain: vec!["article".to_string(), "video".to_string()],
            headline: "Good morning, warriors!".to_string(),
        },
        SlotConfig {
            name: "afternoon".to_string(),
            at: "18:00".to_string(),
            chain: vec!["podcast".to_string(), "video".to_string()],
            headline: "Midday learning time!".to_string(),
        },
        SlotConfig {
            name: "evening".to_string(),
            at: "00:00".to_string(),
            chain: vec!["video".to_string()],
            headline: "Night drilling!".to_string(),
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            store: StoreConfig::default(),
            sources: SourcesConfig::default(),
            publish: PublishConfig::default(),
            slots: default_slots(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            topics_file: default_topics_file(),
            quotes_file: default_quotes_file(),
            destination: String::new(),
            poll_interval_secs: default_poll_interval(),
            utc_offset_hours: 0,
            ledger_path: default_ledger_path(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backing: StoreBacking::default(),
            local_path: default_used_links_path(),
            max_attempts: default_max_attempts(),
            remote: RemoteStoreConfig::default(),
        }
    }
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_github_base_url(),
            owner: String::new(),
            repo: String::new(),
            path: default_remote_path(),
            branch: None,
            token_env: default_token_env(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            keyword: default_video_keyword(),
            result_limit: default_video_result_limit(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            outbox_path: default_outbox_path(),
            format: TextFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("BJJ_BOT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Configured slots as domain values
    pub fn slots(&self) -> Result<Vec<Slot>> {
        if self.slots.is_empty() {
            bail!("No slots configured");
        }

        let mut slots = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if slots.iter().any(|s: &Slot| s.name == slot.name) {
                bail!("Duplicate slot name: {}", slot.name);
            }

            let chain = slot
                .chain
                .iter()
                .map(|c| c.parse::<Category>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Slot {}: {}", slot.name, e))?;

            let at = parse_slot_time(&slot.at)
                .with_context(|| format!("Slot {} has an invalid time", slot.name))?;
            // Only one slot can fire per minute
            if let Some(other) = slots.iter().find(|s: &&Slot| s.at == at) {
                bail!(
                    "Slots {} and {} are both scheduled at {}",
                    other.name,
                    slot.name,
                    slot.at
                );
            }

            slots.push(Slot {
                name: slot.name.clone(),
                at,
                chain,
                headline: slot.headline.clone(),
            });
        }

        Ok(slots)
    }

    /// Fixed offset applied to the clock before matching slot times
    pub fn utc_offset(&self) -> Result<UtcOffset> {
        UtcOffset::from_hms(self.general.utc_offset_hours, 0, 0)
            .with_context(|| format!("Invalid utc_offset_hours: {}", self.general.utc_offset_hours))
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# bjj-bot configuration

[general]
topics_file = "./topics.txt"    # one topic per line, rotated by ISO week
quotes_file = "./quotes.txt"    # one quote per line, used when nothing else is found
destination = "@your_channel"
poll_interval_secs = 10
utc_offset_hours = 0            # slot times are matched against UTC plus this offset
ledger_path = "./slot_ledger.json"

[store]
backing = "local"               # local, remote
local_path = "./used_links.txt"
max_attempts = 3

[store.remote]
base_url = "https://api.github.com"
owner = "your-account"
repo = "bot-state"
path = "used_links.txt"
# branch = "main"
token_env = "GITHUB_TOKEN"

[sources]
# JSON snapshots: [{"link": "...", "title": "..."}]
article_feeds = ["./feeds/articles.json"]
# Videos come only from these snapshots; with none, video slots fall back to quotes.
video_feeds = ["./feeds/videos.json"]

[sources.video]
keyword = "BJJ"
result_limit = 5

[publish]
outbox_path = "./outbox.jsonl"
format = "markdown"             # markdown, plain

# A quote is posted when every category of the chain comes up empty.
[[slots]]
name = "morning"
at = "12:00"
chain = ["article", "video"]
headline = "Good morning, warriors!"

[[slots]]
name = "afternoon"
at = "18:00"
chain = ["podcast", "video"]
headline = "Midday learning time!"

[[slots]]
name = "evening"
at = "00:00"
chain = ["video"]
headline = "Night drilling!"
"#
        .to_string()
    }
}

fn parse_slot_time(value: &str) -> Result<Time> {
    let (hour, minute) = value
        .trim()
        .split_once(':')
        .with_context(|| format!("Expected HH:MM, got {:?}", value))?;

    let hour: u8 = hour
        .parse()
        .with_context(|| format!("Invalid hour in {:?}", value))?;
    let minute: u8 = minute
        .parse()
        .with_context(|| format!("Invalid minute in {:?}", value))?;

    Time::from_hms(hour, minute, 0).with_context(|| format!("Out of range time {:?}", value))
}

/// Read a newline-separated list, skipping blank lines
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
