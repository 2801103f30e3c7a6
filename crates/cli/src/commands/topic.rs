//! Topic command - show the topic of the week

use anyhow::{Context, Result, bail};
use bjj_bot_domain::topic_for_date;
use std::path::PathBuf;
use time::{Date, OffsetDateTime, macros::format_description};

use crate::args::TopicArgs;
use crate::config::{AppConfig, load_lines};

pub async fn execute(args: TopicArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let date = match args.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => OffsetDateTime::now_utc().to_offset(config.utc_offset()?).date(),
    };

    let topics = load_lines(&config.general.topics_file).context("Failed to load topics")?;
    let Some(topic) = topic_for_date(&topics, date) else {
        bail!(
            "No topics configured in {}",
            config.general.topics_file.display()
        );
    };

    let (_, week, _) = date.to_iso_week_date();
    tracing::debug!(date = %date, week, topics = topics.len(), "Computed topic");

    println!("{}", topic);
    Ok(())
}

fn parse_date(raw: &str) -> Result<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format)
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", raw))
}
