//! Home feed selection.
//!
//! The feed opens with the best recent article of every category, tops up with
//! the best recent articles overall, and re-ranks the lot. When nothing was
//! published inside the window it falls back to the best articles of all time.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;
use crate::storage::{rank_order, ArticleReader};
use crate::types::Article;
use crate::Result;

pub const DEFAULT_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_TOP_OVERALL: usize = 10;
pub const DEFAULT_FALLBACK_LIMIT: usize = 15;

#[derive(Debug, Clone)]
pub struct HomeFeed {
    /// How far back an article still counts as recent.
    pub window: Duration,
    /// Recent articles taken regardless of category.
    pub top_overall: usize,
    /// Size of the all-time list served when the window is empty.
    pub fallback_limit: usize,
}

impl Default for HomeFeed {
    fn default() -> Self {
        Self {
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
            top_overall: DEFAULT_TOP_OVERALL,
            fallback_limit: DEFAULT_FALLBACK_LIMIT,
        }
    }
}

impl HomeFeed {
    pub async fn select(&self, reader: &mut dyn ArticleReader, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let since = now - self.window;
        let mut feed = Vec::new();
        let mut seen = HashSet::new();

        let categories = reader.distinct_categories_since(since).await?;
        debug!("{} categories published since {}", categories.len(), since);

        for category in &categories {
            if let Some(article) = reader.top_article_in_category_since(category, since).await? {
                if seen.insert(article.url.clone()) {
                    feed.push(article);
                }
            }
        }

        for article in reader.top_articles_since(since, self.top_overall).await? {
            if seen.insert(article.url.clone()) {
                feed.push(article);
            }
        }

        if feed.is_empty() {
            debug!("Nothing recent, falling back to top {} of all time", self.fallback_limit);
            let mut fallback = Vec::with_capacity(self.fallback_limit);
            for article in reader.top_articles_all_time(self.fallback_limit).await? {
                if seen.insert(article.url.clone()) {
                    fallback.push(article);
                }
            }
            return Ok(fallback);
        }

        feed.sort_by(rank_order);
        Ok(feed)
    }
}

/// Selects the home feed with the default window and limits.
pub async fn select_home_feed(reader: &mut dyn ArticleReader, now: DateTime<Utc>) -> Result<Vec<Article>> {
    HomeFeed::default().select(reader, now).await
}
