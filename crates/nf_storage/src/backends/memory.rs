use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nf_core::storage::{dedup_by_url, rank_order};
use nf_core::{Article, ArticleReader, ArticleStorage, Interaction, InteractionStorage, InteractionType, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use crate::StorageBackend;

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub interaction: Interaction,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    users: HashMap<String, DateTime<Utc>>,
    sessions: HashMap<String, SessionRecord>,
    interactions: Vec<InteractionRecord>,
}

impl MemoryStore {
    pub fn store_article(&mut self, article: &Article) {
        if let Some(existing) = self.articles.iter_mut().find(|a| a.url == article.url) {
            *existing = article.clone();
        } else {
            self.articles.push(article.clone());
        }
    }

    fn ranked<F>(&self, keep: F, limit: usize) -> Vec<Article>
    where
        F: Fn(&Article) -> bool,
    {
        let mut articles: Vec<Article> = self.articles.iter().filter(|a| keep(a)).cloned().collect();
        articles.sort_by(rank_order);
        articles.truncate(limit);
        articles
    }

    fn register_user(&mut self, user_id: &str, now: DateTime<Utc>) {
        self.users.entry(user_id.to_string()).or_insert(now);
    }

    fn register_session(&mut self, session_id: &str, user_id: &str, now: DateTime<Utc>) {
        self.sessions.entry(session_id.to_string()).or_insert_with(|| SessionRecord {
            user_id: user_id.to_string(),
            started_at: now,
            last_seen: now,
        });
    }
}

pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(MemoryStore::default())) }
    }

    pub async fn user_created_at(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.store.read().await.users.get(user_id).copied()
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.store.read().await.sessions.get(session_id).cloned()
    }

    pub async fn interactions(&self) -> Vec<InteractionRecord> {
        self.store.read().await.interactions.clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(_url: &str) -> Result<Self> {
        Ok(Self::new())
    }
}

/// Holds the read lock for as long as the selection runs.
pub struct MemoryReader<'a> {
    store: RwLockReadGuard<'a, MemoryStore>,
}

#[async_trait]
impl<'a> ArticleReader for MemoryReader<'a> {
    async fn distinct_categories_since(&mut self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let categories: BTreeSet<&str> = self.store.articles.iter()
            .filter(|a| a.published_date >= since)
            .map(|a| a.category.as_str())
            .collect();
        Ok(categories.into_iter().map(str::to_string).collect())
    }

    async fn top_article_in_category_since(
        &mut self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Article>> {
        Ok(self.store
            .ranked(|a| a.category == category && a.published_date >= since, 1)
            .pop())
    }

    async fn top_articles_since(&mut self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>> {
        Ok(self.store.ranked(|a| a.published_date >= since, limit))
    }

    async fn top_articles_all_time(&mut self, limit: usize) -> Result<Vec<Article>> {
        Ok(self.store.ranked(|_| true, limit))
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn reader<'a>(&'a self) -> Result<Box<dyn ArticleReader + 'a>> {
        Ok(Box::new(MemoryReader { store: self.store.read().await }))
    }

    async fn list_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.ranked(|_| true, limit))
    }

    async fn liked_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        let liked: HashSet<&str> = store.interactions.iter()
            .filter(|r| r.interaction.interaction_type == InteractionType::Like)
            .map(|r| r.interaction.article_id.as_str())
            .collect();
        Ok(dedup_by_url(store.ranked(|a| liked.contains(a.url.as_str()), limit)))
    }

    async fn store_article(&self, article: &Article) -> Result<()> {
        self.store.write().await.store_article(article);
        Ok(())
    }
}

#[async_trait]
impl InteractionStorage for InMemoryStorage {
    async fn register_user(&self, user_id: &str) -> Result<()> {
        self.store.write().await.register_user(user_id, Utc::now());
        Ok(())
    }

    async fn register_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        self.store.write().await.register_session(session_id, user_id, Utc::now());
        Ok(())
    }

    async fn log_interaction(&self, interaction: &Interaction) -> Result<()> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        store.register_user(&interaction.user_id, now);
        store.register_session(&interaction.session_id, &interaction.user_id, now);
        store.interactions.push(InteractionRecord {
            interaction: interaction.clone(),
            timestamp: now,
        });
        if let Some(session) = store.sessions.get_mut(&interaction.session_id) {
            session.last_seen = now;
        }
        Ok(())
    }
}
