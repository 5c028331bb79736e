use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use crate::types::{Article, Interaction};
use crate::Result;

/// Read access the home feed needs, held for the duration of one selection.
///
/// Every ranked query orders by [`rank_order`].
#[async_trait]
pub trait ArticleReader: Send {
    /// Distinct categories of articles published at or after `since`, sorted.
    async fn distinct_categories_since(&mut self, since: DateTime<Utc>) -> Result<Vec<String>>;

    /// Best ranked article of `category` published at or after `since`.
    async fn top_article_in_category_since(
        &mut self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Article>>;

    /// Up to `limit` best ranked articles published at or after `since`.
    async fn top_articles_since(&mut self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>>;

    /// Up to `limit` best ranked articles regardless of age.
    async fn top_articles_all_time(&mut self, limit: usize) -> Result<Vec<Article>>;
}

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Acquire a reader. Whatever it holds is released when it is dropped.
    async fn reader<'a>(&'a self) -> Result<Box<dyn ArticleReader + 'a>>;

    /// Best ranked articles, at most `limit`.
    async fn list_articles(&self, limit: usize) -> Result<Vec<Article>>;

    /// Best ranked articles with at least one like, each at most once.
    async fn liked_articles(&self, limit: usize) -> Result<Vec<Article>>;

    /// Insert an article, replacing any existing one with the same url.
    async fn store_article(&self, article: &Article) -> Result<()>;
}

#[async_trait]
pub trait InteractionStorage: Send + Sync {
    async fn register_user(&self, user_id: &str) -> Result<()>;

    async fn register_session(&self, session_id: &str, user_id: &str) -> Result<()>;

    /// Record an interaction, registering its user and session on the way.
    async fn log_interaction(&self, interaction: &Interaction) -> Result<()>;
}

/// Everything a full backend offers; what the web layer holds on to.
pub trait Store: ArticleStorage + InteractionStorage {}

impl<T: ArticleStorage + InteractionStorage> Store for T {}

/// Drops every article whose url already appeared earlier in the list.
pub fn dedup_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles.into_iter().filter(|a| seen.insert(a.url.clone())).collect()
}

/// Ranking used everywhere articles are ordered: score descending, then most
/// recently published, then url ascending.
pub fn rank_order(a: &Article, b: &Article) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.published_date.cmp(&a.published_date))
        .then_with(|| a.url.cmp(&b.url))
}
