//! Run command - slot scheduler

use anyhow::{Context, Result, bail};
use bjj_bot_adapters::{
    feeds::JsonFeedFile,
    ledger::FileSlotLedger,
    outbox::{OutboxPublisher, OutboxWriter},
    store::{FileUsedLog, GithubDocument, GithubLocation},
};
use bjj_bot_domain::{
    FeedProvider, Publisher, SelectionPolicy, SlotOutcome, SystemClock, UsedItemStore,
    usecases::{RenderConfig, Renderer, ResolverConfig, RunLoop, RunLoopConfig, SourceResolver},
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::RunArgs;
use crate::config::{AppConfig, StoreBacking, load_lines};

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    if config.general.destination.trim().is_empty() {
        bail!("No destination configured (general.destination)");
    }

    let slots = config.slots()?;
    let topics = load_lines(&config.general.topics_file).context("Failed to load topics")?;
    if topics.is_empty() {
        tracing::warn!(path = %config.general.topics_file.display(), "Topics file is empty");
    }
    let quotes = load_quotes(&config);

    tracing::info!(
        destination = %config.general.destination,
        backing = ?config.store.backing,
        topics = topics.len(),
        quotes = quotes.len(),
        fire = ?args.fire,
        "Starting bjj-bot run"
    );

    // Build dependencies
    let store = Arc::new(build_store(&config).await?);
    let resolver = Arc::new(build_resolver(&config));

    let writer = OutboxWriter::new(config.publish.outbox_path.clone())
        .await
        .context("Failed to initialize outbox writer")?;
    tracing::info!(outbox = %writer.path().display(), "Publishing to outbox");
    let publisher: Arc<dyn Publisher> = Arc::new(OutboxPublisher::new(writer));

    let policy = Arc::new(SelectionPolicy::new(
        resolver,
        store,
        publisher,
        Renderer::new(RenderConfig {
            format: config.publish.format,
            ..Default::default()
        }),
        quotes,
        config.general.destination.clone(),
    ));

    let loop_config = RunLoopConfig {
        poll_interval: Duration::from_secs(config.general.poll_interval_secs.max(1)),
        utc_offset: config.utc_offset()?,
        slots,
        topics,
    };

    let mut run_loop = RunLoop::new(
        policy,
        Arc::new(SystemClock),
        Arc::new(FileSlotLedger::new(&config.general.ledger_path)),
        loop_config,
    );

    // Execute
    if let Some(name) = args.fire {
        let outcome = run_loop.fire_now(&name).await?;
        match outcome {
            SlotOutcome::Published { category, item_id } => {
                println!("{}: published {} {}", name, category, item_id);
            }
            SlotOutcome::Quote { quote } => println!("{}: published quote \"{}\"", name, quote),
            SlotOutcome::Nothing => println!("{}: nothing to post", name),
        }
        return Ok(());
    }

    run_loop.restore().await;

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    run_loop.run(shutdown).await;

    tracing::info!("bjj-bot run completed");
    Ok(())
}

async fn build_store(config: &AppConfig) -> Result<UsedItemStore> {
    let local = Arc::new(
        FileUsedLog::new(config.store.local_path.clone())
            .await
            .context("Failed to open local used-items log")?,
    );

    let store = match config.store.backing {
        StoreBacking::Local => UsedItemStore::local_only(local),
        StoreBacking::Remote => {
            let remote = &config.store.remote;
            if remote.owner.trim().is_empty() || remote.repo.trim().is_empty() {
                bail!("Remote store enabled but store.remote.owner/repo are not set");
            }

            let token = load_api_key(&remote.token_env, "remote store")?;
            let document = GithubDocument::with_base_url(
                token,
                remote.base_url.clone(),
                GithubLocation {
                    owner: remote.owner.clone(),
                    repo: remote.repo.clone(),
                    path: remote.path.clone(),
                    branch: remote.branch.clone(),
                },
            )
            .context("Failed to initialize remote document client")?;

            UsedItemStore::with_remote(local, Arc::new(document), config.store.max_attempts.max(1))
        }
    };

    store.load().await.context("Failed to load used items")?;

    Ok(store)
}

fn build_resolver(config: &AppConfig) -> SourceResolver {
    let feeds = config
        .sources
        .article_feeds
        .iter()
        .map(|path| Arc::new(JsonFeedFile::new(path)) as Arc<dyn FeedProvider>)
        .collect();
    let video_feeds = config
        .sources
        .video_feeds
        .iter()
        .map(|path| Arc::new(JsonFeedFile::new(path)) as Arc<dyn FeedProvider>)
        .collect();

    SourceResolver::new(ResolverConfig {
        video_keyword: config.sources.video.keyword.clone(),
        video_result_limit: config.sources.video.result_limit,
        ..Default::default()
    })
    .with_feeds(feeds)
    .with_video_feeds(video_feeds)
}

fn load_quotes(config: &AppConfig) -> Vec<String> {
    match load_lines(&config.general.quotes_file) {
        Ok(quotes) => quotes,
        Err(e) => {
            tracing::warn!(error = %e, "No quotes available, quote fallback disabled");
            vec![]
        }
    }
}

fn load_api_key(env_var: &str, purpose: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No token env var configured for {}", purpose);
    }

    let key = std::env::var(env_var)
        .with_context(|| format!("Missing token env var {} for {}", env_var, purpose))?;

    if key.trim().is_empty() {
        bail!("Token env var {} is empty for {}", env_var, purpose);
    }

    Ok(SecretString::new(key.into()))
}
