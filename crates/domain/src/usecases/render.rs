//! Rendering use case - turns a selection into a channel message

use crate::model::{Category, ContentItem, RenderedMessage, Slot, TextFormat};

/// Configuration for the renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Markup flavour of the produced messages
    pub format: TextFormat,
    /// Trailing hashtag line
    pub hashtags: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: TextFormat::Markdown,
            hashtags: "#BJJ".to_string(),
        }
    }
}

/// Renderer for slot messages
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a resolved content item
    pub fn render_item(&self, slot: &Slot, topic: &str, item: &ContentItem) -> RenderedMessage {
        let (lead, label) = match item.category {
            Category::Article => ("Today's focus", "Article"),
            Category::Podcast => ("Topic", "Podcast"),
            Category::Video => ("Focus", "Video"),
        };

        let title = match self.clean(&item.title) {
            t if t.is_empty() => item.id.clone(),
            t => t,
        };
        let topic = self.clean(topic);

        let (topic_line, link_line) = match self.config.format {
            TextFormat::Markdown => (
                format!("{}: *{}*", lead, topic),
                format!("{}: [{}]({})", label, title, item.id),
            ),
            TextFormat::Plain => (
                format!("{}: {}", lead, topic),
                format!("{}: {}\n{}", label, title, item.id),
            ),
        };

        let mut sections = vec![self.clean(&slot.headline)];
        if !topic.is_empty() {
            sections.push(topic_line);
        }
        sections.push(link_line);
        sections.push(self.config.hashtags.clone());

        self.finish(sections)
    }

    /// Render the quote fallback
    pub fn render_quote(&self, slot: &Slot, quote: &str) -> RenderedMessage {
        let quote = self.clean(quote);
        let body = match self.config.format {
            TextFormat::Markdown => format!("*Quote:*\n\n_{}_", quote),
            TextFormat::Plain => format!("Quote:\n\n{}", quote),
        };

        self.finish(vec![
            self.clean(&slot.headline),
            body,
            format!("{} #Mindset", self.config.hashtags),
        ])
    }

    fn finish(&self, sections: Vec<String>) -> RenderedMessage {
        let text = sections
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        RenderedMessage {
            text,
            format: self.config.format,
        }
    }

    /// Strip characters that would unbalance Markdown markup
    fn clean(&self, text: &str) -> String {
        let text = text.trim();
        match self.config.format {
            TextFormat::Markdown => text
                .chars()
                .filter(|c| !matches!(c, '[' | ']' | '*' | '_' | '`'))
                .collect::<String>()
                .trim()
                .to_string(),
            TextFormat::Plain => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    fn slot() -> Slot {
        Slot {
            name: "morning".to_string(),
            at: time!(12:00),
            chain: vec![Category::Article, Category::Video],
            headline: "Good morning, warriors!".to_string(),
        }
    }

    fn item(category: Category, title: &str) -> ContentItem {
        ContentItem {
            id: "https://example.com/guard".to_string(),
            title: title.to_string(),
            category,
        }
    }

    #[test]
    fn test_render_article_markdown() {
        let renderer = Renderer::new(RenderConfig::default());
        let message =
            renderer.render_item(&slot(), "Guard", &item(Category::Article, "Guard basics"));

        assert_eq!(message.format, TextFormat::Markdown);
        assert!(message.text.starts_with("Good morning, warriors!"));
        assert!(message.text.contains("Today's focus: *Guard*"));
        assert!(
            message
                .text
                .contains("Article: [Guard basics](https://example.com/guard)")
        );
        assert!(message.text.ends_with("#BJJ"));
    }

    #[test]
    fn test_categories_render_differently() {
        let renderer = Renderer::new(RenderConfig::default());
        let article = renderer.render_item(&slot(), "Guard", &item(Category::Article, "Title"));
        let podcast = renderer.render_item(&slot(), "Guard", &item(Category::Podcast, "Title"));
        let video = renderer.render_item(&slot(), "Guard", &item(Category::Video, "Title"));

        assert!(podcast.text.contains("Podcast: [Title]"));
        assert!(video.text.contains("Video: [Title]"));
        assert_ne!(article.text, podcast.text);
        assert_ne!(podcast.text, video.text);
    }

    #[test]
    fn test_markdown_breaking_characters_are_stripped() {
        let renderer = Renderer::new(RenderConfig::default());
        let message = renderer.render_item(
            &slot(),
            "Guard",
            &item(Category::Video, "[LIVE] *best* guard_passes"),
        );

        assert!(message.text.contains("Video: [LIVE best guardpasses]("));
    }

    #[test]
    fn test_empty_title_falls_back_to_link() {
        let renderer = Renderer::new(RenderConfig::default());
        let message = renderer.render_item(&slot(), "Guard", &item(Category::Article, "**"));

        assert!(
            message
                .text
                .contains("Article: [https://example.com/guard](https://example.com/guard)")
        );
    }

    #[test]
    fn test_render_quote() {
        let renderer = Renderer::new(RenderConfig::default());
        let message = renderer.render_quote(&slot(), "A black belt is a white belt who never quit.");

        assert!(message.text.contains("_A black belt is a white belt who never quit._"));
        assert!(message.text.contains("#BJJ #Mindset"));
    }

    #[test]
    fn test_render_plain() {
        let renderer = Renderer::new(RenderConfig {
            format: TextFormat::Plain,
            ..Default::default()
        });
        let message = renderer.render_item(&slot(), "Guard", &item(Category::Article, "Guard_1"));

        assert_eq!(message.format, TextFormat::Plain);
        assert!(message.text.contains("Article: Guard_1\nhttps://example.com/guard"));
        assert!(!message.text.contains('*'));
    }
}
