//! Run loop use case - polls the clock and fires configured slots
//!
//! The loop is a small state machine: every poll it checks the local time of
//! day against the slots and fires a match unless that exact occurrence
//! (slot name + date) already fired. Slot work is awaited inline, so two slots
//! never run concurrently. Occurrences missed while the process was down are
//! not replayed.

use std::future::Future;
use std::sync::Arc;

use time::{OffsetDateTime, UtcOffset};
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::{
    model::{Slot, SlotKey, SlotOutcome},
    policy::SelectionPolicy,
    ports::{Clock, PublishError, Publisher, SlotLedger},
    topic::topic_for_date,
};

/// Configuration for the run loop
#[derive(Debug, Clone)]
pub struct RunLoopConfig {
    /// How often the clock is checked
    pub poll_interval: Duration,
    /// Offset applied to the clock before matching slot times
    pub utc_offset: UtcOffset,
    /// Slots to fire
    pub slots: Vec<Slot>,
    /// Weekly topic rotation
    pub topics: Vec<String>,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            utc_offset: UtcOffset::UTC,
            slots: vec![],
            topics: vec![],
        }
    }
}

/// Result of firing one slot occurrence
#[derive(Debug)]
pub struct Firing {
    pub key: SlotKey,
    pub topic: String,
    pub outcome: Result<SlotOutcome, PublishError>,
}

/// Errors from the run loop
#[derive(Debug, thiserror::Error)]
pub enum RunLoopError {
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Slot scheduler
pub struct RunLoop<P, Cl, L>
where
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
    L: SlotLedger + ?Sized,
{
    policy: Arc<SelectionPolicy<P>>,
    clock: Arc<Cl>,
    ledger: Arc<L>,
    config: RunLoopConfig,
    last_fired: Option<SlotKey>,
}

impl<P, Cl, L> RunLoop<P, Cl, L>
where
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
    L: SlotLedger + ?Sized,
{
    pub fn new(
        policy: Arc<SelectionPolicy<P>>,
        clock: Arc<Cl>,
        ledger: Arc<L>,
        config: RunLoopConfig,
    ) -> Self {
        Self {
            policy,
            clock,
            ledger,
            config,
            last_fired: None,
        }
    }

    /// Restore the last fired occurrence from the ledger
    pub async fn restore(&mut self) {
        match self.ledger.last_fired().await {
            Ok(last) => {
                tracing::info!(last_fired = ?last.as_ref().map(|k| k.to_string()), "Restored slot ledger");
                self.last_fired = last;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to read slot ledger, starting fresh");
            }
        }
    }

    pub fn last_fired(&self) -> Option<&SlotKey> {
        self.last_fired.as_ref()
    }

    /// The slot due at `now`, unless this occurrence already fired
    pub fn due(&self, now: OffsetDateTime) -> Option<(&Slot, SlotKey)> {
        let local = now.to_offset(self.config.utc_offset);
        let slot = self
            .config
            .slots
            .iter()
            .find(|slot| slot.matches(local.time()))?;

        let key = SlotKey {
            date: local.date(),
            slot: slot.name.clone(),
        };

        if self.last_fired.as_ref() == Some(&key) {
            return None;
        }

        Some((slot, key))
    }

    /// Check the clock once and fire the due slot, if any
    pub async fn poll_once(&mut self) -> Option<Firing> {
        let now = self.clock.now();
        let (slot, key) = self.due(now)?;
        let slot = slot.clone();

        // Marked before running so a failed occurrence is not retried.
        self.mark_fired(key.clone()).await;

        let local_date = now.to_offset(self.config.utc_offset).date();
        let topic = self.topic_for(local_date);

        tracing::info!(slot = %slot.name, key = %key, topic = %topic, "Firing slot");

        let outcome = self.policy.select_and_publish(&slot, &topic).await;
        match &outcome {
            Ok(outcome) => {
                tracing::info!(slot = %slot.name, outcome = ?outcome, "Slot complete");
            }
            Err(error) => {
                tracing::error!(slot = %slot.name, error = %error, "Slot publish failed");
            }
        }

        Some(Firing {
            key,
            topic,
            outcome,
        })
    }

    /// Fire a named slot immediately, regardless of the time of day
    pub async fn fire_now(&mut self, name: &str) -> Result<SlotOutcome, RunLoopError> {
        let slot = self
            .config
            .slots
            .iter()
            .find(|slot| slot.name == name)
            .cloned()
            .ok_or_else(|| RunLoopError::UnknownSlot(name.to_string()))?;

        let local_date = self.clock.now().to_offset(self.config.utc_offset).date();
        let topic = self.topic_for(local_date);

        tracing::info!(slot = %slot.name, topic = %topic, "Firing slot on demand");

        Ok(self.policy.select_and_publish(&slot, &topic).await?)
    }

    /// Poll until `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        tracing::info!(
            slots = ?self.config.slots.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down scheduler");
                    break;
                }
            }
        }
    }

    async fn mark_fired(&mut self, key: SlotKey) {
        if let Err(error) = self.ledger.record(&key).await {
            tracing::warn!(key = %key, error = %error, "Failed to persist slot ledger");
        }
        self.last_fired = Some(key);
    }

    fn topic_for(&self, date: time::Date) -> String {
        match topic_for_date(&self.config.topics, date) {
            Some(topic) => topic.to_string(),
            None => {
                tracing::warn!("No topics configured, resolving without a topic");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, FeedEntry, RenderedMessage};
    use crate::ports::{FeedProvider, LedgerError, ProviderError, UsedLog, UsedLogError};
    use crate::store::UsedItemStore;
    use crate::usecases::{
        render::{RenderConfig, Renderer},
        resolve::{ResolverConfig, SourceResolver},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::{datetime, offset, time};

    struct FakeFeed(Vec<FeedEntry>);

    #[async_trait]
    impl FeedProvider for FakeFeed {
        async fn entries(&self) -> Result<Vec<FeedEntry>, ProviderError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[derive(Default)]
    struct MemLog(Mutex<Vec<String>>);

    #[async_trait]
    impl UsedLog for MemLog {
        async fn read_all(&self) -> Result<Vec<String>, UsedLogError> {
            Ok(self.0.lock().unwrap().clone())
        }

        async fn append(&self, id: &str) -> Result<(), UsedLogError> {
            self.0.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    struct FakePublisher {
        sent: Mutex<Vec<RenderedMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn send(
            &self,
            _destination: &str,
            message: &RenderedMessage,
        ) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Rejected("chat not found".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn platform(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeClock {
        time: Mutex<OffsetDateTime>,
    }

    impl FakeClock {
        fn set(&self, time: OffsetDateTime) {
            *self.time.lock().unwrap() = time;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            *self.time.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        last: Mutex<Option<SlotKey>>,
    }

    #[async_trait]
    impl SlotLedger for FakeLedger {
        async fn last_fired(&self) -> Result<Option<SlotKey>, LedgerError> {
            Ok(self.last.lock().unwrap().clone())
        }

        async fn record(&self, key: &SlotKey) -> Result<(), LedgerError> {
            *self.last.lock().unwrap() = Some(key.clone());
            Ok(())
        }
    }

    fn slots() -> Vec<Slot> {
        vec![
            Slot {
                name: "morning".to_string(),
                at: time!(12:00),
                chain: vec![Category::Article, Category::Video],
                headline: "Good morning, warriors!".to_string(),
            },
            Slot {
                name: "evening".to_string(),
                at: time!(00:00),
                chain: vec![Category::Video],
                headline: "Night drilling!".to_string(),
            },
        ]
    }

    struct Harness {
        run_loop: RunLoop<FakePublisher, FakeClock, FakeLedger>,
        clock: Arc<FakeClock>,
        ledger: Arc<FakeLedger>,
        publisher: Arc<FakePublisher>,
    }

    fn harness(start: OffsetDateTime, fail_publish: bool, config: RunLoopConfig) -> Harness {
        let feed: Arc<dyn FeedProvider> = Arc::new(FakeFeed(vec![
            FeedEntry {
                id: "https://a".to_string(),
                title: "Guard basics".to_string(),
            },
            FeedEntry {
                id: "https://b".to_string(),
                title: "Escapes 101".to_string(),
            },
        ]));
        let resolver =
            Arc::new(SourceResolver::new(ResolverConfig::default()).with_feeds(vec![feed]));
        let store = Arc::new(UsedItemStore::local_only(Arc::new(MemLog::default())));
        let publisher = Arc::new(FakePublisher {
            sent: Mutex::new(vec![]),
            fail: fail_publish,
        });
        let policy = Arc::new(SelectionPolicy::new(
            resolver,
            store,
            Arc::clone(&publisher),
            Renderer::new(RenderConfig::default()),
            vec!["Keep rolling".to_string()],
            "@channel".to_string(),
        ));
        let clock = Arc::new(FakeClock {
            time: Mutex::new(start),
        });
        let ledger = Arc::new(FakeLedger::default());

        Harness {
            run_loop: RunLoop::new(
                policy,
                Arc::clone(&clock),
                Arc::clone(&ledger),
                config,
            ),
            clock,
            ledger,
            publisher,
        }
    }

    fn config() -> RunLoopConfig {
        RunLoopConfig {
            slots: slots(),
            topics: vec!["Guard".to_string(), "Escapes".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fires_once_per_occurrence() {
        let mut h = harness(datetime!(2024-01-15 12:00:01 UTC), false, config());

        let firing = h.run_loop.poll_once().await.unwrap();
        assert_eq!(firing.key.slot, "morning");
        assert_eq!(firing.topic, "Guard");
        assert!(matches!(
            firing.outcome,
            Ok(SlotOutcome::Published { ref item_id, .. }) if item_id == "https://a"
        ));

        // Same minute, later polls
        h.clock.set(datetime!(2024-01-15 12:00:11 UTC));
        assert!(h.run_loop.poll_once().await.is_none());
        h.clock.set(datetime!(2024-01-15 12:00:59 UTC));
        assert!(h.run_loop.poll_once().await.is_none());

        assert_eq!(h.publisher.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_between_slots() {
        let mut h = harness(datetime!(2024-01-15 12:01:00 UTC), false, config());
        assert!(h.run_loop.poll_once().await.is_none());

        h.clock.set(datetime!(2024-01-15 17:59:50 UTC));
        assert!(h.run_loop.poll_once().await.is_none());
        assert!(h.publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_next_day_fires_again() {
        let mut h = harness(datetime!(2024-01-15 12:00:00 UTC), false, config());
        assert!(h.run_loop.poll_once().await.is_some());

        h.clock.set(datetime!(2024-01-16 12:00:05 UTC));
        let firing = h.run_loop.poll_once().await.unwrap();
        assert_eq!(firing.key.date, time::macros::date!(2024 - 01 - 16));
    }

    #[tokio::test]
    async fn test_different_slots_fire_independently() {
        let mut h = harness(datetime!(2024-01-15 12:00:00 UTC), false, config());
        assert_eq!(h.run_loop.poll_once().await.unwrap().key.slot, "morning");

        h.clock.set(datetime!(2024-01-16 00:00:03 UTC));
        assert_eq!(h.run_loop.poll_once().await.unwrap().key.slot, "evening");
    }

    #[tokio::test]
    async fn test_missed_slot_is_not_backfilled() {
        let mut h = harness(datetime!(2024-01-15 11:59:55 UTC), false, config());
        assert!(h.run_loop.poll_once().await.is_none());

        // Process stalls past the slot minute
        h.clock.set(datetime!(2024-01-15 12:01:05 UTC));
        assert!(h.run_loop.poll_once().await.is_none());
        assert!(h.publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_refire_or_stop() {
        let mut h = harness(datetime!(2024-01-15 12:00:00 UTC), true, config());

        let firing = h.run_loop.poll_once().await.unwrap();
        assert!(firing.outcome.is_err());

        h.clock.set(datetime!(2024-01-15 12:00:10 UTC));
        assert!(h.run_loop.poll_once().await.is_none());

        h.clock.set(datetime!(2024-01-16 00:00:00 UTC));
        assert!(h.run_loop.poll_once().await.is_some());
    }

    #[tokio::test]
    async fn test_ledger_prevents_refire_after_restart() {
        let mut h = harness(datetime!(2024-01-15 12:00:00 UTC), false, config());
        assert!(h.run_loop.poll_once().await.is_some());
        let recorded = h.ledger.last.lock().unwrap().clone().unwrap();
        assert_eq!(recorded.slot, "morning");

        // Restarted process sharing the ledger, still inside the same minute
        let mut restarted = harness(datetime!(2024-01-15 12:00:30 UTC), false, config());
        *restarted.ledger.last.lock().unwrap() = Some(recorded);
        restarted.run_loop.restore().await;

        assert!(restarted.run_loop.poll_once().await.is_none());
    }

    #[tokio::test]
    async fn test_slot_times_use_configured_offset() {
        let config = RunLoopConfig {
            utc_offset: offset!(+3),
            ..config()
        };
        // 09:00 UTC is 12:00 at +03:00
        let mut h = harness(datetime!(2024-01-15 09:00:00 UTC), false, config);

        let firing = h.run_loop.poll_once().await.unwrap();
        assert_eq!(firing.key.slot, "morning");
    }

    #[tokio::test]
    async fn test_topic_follows_current_week() {
        let mut h = harness(datetime!(2024-01-22 12:00:00 UTC), false, config());

        let firing = h.run_loop.poll_once().await.unwrap();
        assert_eq!(firing.topic, "Escapes");
        assert!(matches!(
            firing.outcome,
            Ok(SlotOutcome::Published { ref item_id, .. }) if item_id == "https://b"
        ));
    }

    #[tokio::test]
    async fn test_fire_now() {
        let mut h = harness(datetime!(2024-01-15 15:00:00 UTC), false, config());

        let outcome = h.run_loop.fire_now("evening").await.unwrap();
        // No video providers configured, so the evening slot falls back to a quote
        assert_eq!(
            outcome,
            SlotOutcome::Quote {
                quote: "Keep rolling".to_string()
            }
        );

        assert!(matches!(
            h.run_loop.fire_now("lunch").await,
            Err(RunLoopError::UnknownSlot(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let mut h = harness(datetime!(2024-01-15 12:00:00 UTC), false, config());

        h.run_loop
            .run(tokio::time::sleep(Duration::from_secs(35)))
            .await;

        assert_eq!(h.publisher.sent.lock().unwrap().len(), 1);
        assert!(h.run_loop.last_fired().is_some());
    }
}
