//! Selection policy - walks a slot's fallback chain and publishes the winner

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::{
    model::{Slot, SlotOutcome},
    ports::{PublishError, Publisher},
    store::UsedItemStore,
    usecases::{render::Renderer, resolve::SourceResolver},
};

/// Picks what to post for a slot and hands it to the publisher
pub struct SelectionPolicy<P>
where
    P: Publisher + ?Sized,
{
    resolver: Arc<SourceResolver>,
    store: Arc<UsedItemStore>,
    publisher: Arc<P>,
    renderer: Renderer,
    quotes: Vec<String>,
    destination: String,
}

impl<P> SelectionPolicy<P>
where
    P: Publisher + ?Sized,
{
    pub fn new(
        resolver: Arc<SourceResolver>,
        store: Arc<UsedItemStore>,
        publisher: Arc<P>,
        renderer: Renderer,
        quotes: Vec<String>,
        destination: String,
    ) -> Self {
        let quotes = quotes
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        Self {
            resolver,
            store,
            publisher,
            renderer,
            quotes,
            destination,
        }
    }

    /// Try each category of the slot in order, falling back to a random quote.
    ///
    /// Quotes are never recorded as used. A publish failure is returned to the
    /// caller; a resolved item stays committed even then.
    pub async fn select_and_publish(
        &self,
        slot: &Slot,
        topic: &str,
    ) -> Result<SlotOutcome, PublishError> {
        for category in &slot.chain {
            let Some(item) = self.resolver.resolve(*category, topic, &self.store).await else {
                continue;
            };

            let message = self.renderer.render_item(slot, topic, &item);
            self.publisher.send(&self.destination, &message).await?;

            tracing::info!(
                slot = %slot.name,
                category = %item.category,
                item_id = %item.id,
                platform = self.publisher.platform(),
                "Published content item"
            );

            return Ok(SlotOutcome::Published {
                category: item.category,
                item_id: item.id,
            });
        }

        let Some(quote) = self.pick_quote() else {
            tracing::warn!(slot = %slot.name, "No content and no quotes available, skipping post");
            return Ok(SlotOutcome::Nothing);
        };

        let message = self.renderer.render_quote(slot, &quote);
        self.publisher.send(&self.destination, &message).await?;

        tracing::info!(
            slot = %slot.name,
            platform = self.publisher.platform(),
            "Published quote fallback"
        );

        Ok(SlotOutcome::Quote { quote })
    }

    fn pick_quote(&self) -> Option<String> {
        self.quotes.choose(&mut rand::thread_rng()).cloned()
    }
}
