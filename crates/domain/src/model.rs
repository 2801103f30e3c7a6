//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Date, Time};

/// Kind of content a provider can supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Article,
    Podcast,
    Video,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Article => "article",
            Category::Podcast => "podcast",
            Category::Video => "video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "article" => Ok(Category::Article),
            "podcast" => Ok(Category::Podcast),
            "video" => Ok(Category::Video),
            other => Err(format!("Unknown content category: {}", other)),
        }
    }
}

/// A single entry as returned by a feed provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Entry link, used as the item identifier
    pub id: String,
    /// Entry title
    pub title: String,
}

/// A single hit from the video search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoHit {
    /// Provider-specific video ID
    pub id: String,
    /// Watch URL, used as the item identifier
    pub url: String,
    /// Video title
    pub title: String,
}

/// A piece of content chosen for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// Globally unique identifier (a URL in practice)
    pub id: String,
    /// Display title
    pub title: String,
    /// What kind of content this is
    pub category: Category,
}

/// A configured posting slot: a time of day plus the categories to try, in order.
///
/// A quote is always the implicit last resort and is not listed in `chain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Stable slot name (e.g. "morning"), part of the slot key
    pub name: String,
    /// Local time of day the slot fires at (minute granularity)
    pub at: Time,
    /// Categories to attempt, in order
    pub chain: Vec<Category>,
    /// Opening line of every message posted from this slot
    pub headline: String,
}

impl Slot {
    /// Whether this slot fires at the given local time of day
    pub fn matches(&self, time: Time) -> bool {
        self.at.hour() == time.hour() && self.at.minute() == time.minute()
    }
}

/// Identity of one calendar occurrence of a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    /// Local calendar date of the occurrence
    pub date: Date,
    /// Slot name
    pub slot: String,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slot, self.date)
    }
}

/// Markup flavour a message is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    /// Rich text (Markdown links, bold and italics)
    #[default]
    Markdown,
    /// No markup at all
    Plain,
}

impl TextFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextFormat::Markdown => "markdown",
            TextFormat::Plain => "plain",
        }
    }
}

/// Message ready to hand to a publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Final text
    pub text: String,
    /// Markup the text is written in
    pub format: TextFormat,
}

/// What a slot firing ended up posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// A resolved item was published
    Published { category: Category, item_id: String },
    /// Every category came up empty and a quote was published
    Quote { quote: String },
    /// Nothing to post at all (no content and no quotes configured)
    Nothing,
}
