use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nf_core::storage::dedup_by_url;
use nf_core::types::{format_timestamp, parse_timestamp};
use nf_core::{Article, ArticleReader, ArticleStorage, Error, Interaction, InteractionStorage, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};
use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT,
        url TEXT,
        summary TEXT,
        confidence_score REAL,
        published_date TEXT,
        theme TEXT,
        category TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles (published_date)",
    "CREATE INDEX IF NOT EXISTS idx_articles_category ON articles (category, published_date)",
    "CREATE INDEX IF NOT EXISTS idx_articles_url ON articles (url)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        started_at TEXT NOT NULL,
        last_seen TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_interactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        article_id TEXT NOT NULL,
        interaction_type TEXT NOT NULL,
        value TEXT,
        timestamp TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_interactions_type ON user_interactions (interaction_type, article_id)",
    // Add future migrations here
];

const ARTICLE_COLUMNS: &str =
    "title, url, summary, confidence_score, published_date, theme, category";

/// Dates come back normalized to UTC `YYYY-MM-DD HH:MM:SS`, whatever form they were written in.
const SELECT_COLUMNS: &str =
    "title, url, summary, confidence_score, datetime(published_date) AS published_date, theme, category";

/// Rows the feed cannot rank are left out by the query itself, before any `LIMIT`.
const RANKABLE: &str = "url IS NOT NULL AND title IS NOT NULL AND confidence_score IS NOT NULL \
    AND datetime(published_date) IS NOT NULL";

/// Compares instants, with any UTC offset applied.
const PUBLISHED_SINCE: &str = "datetime(published_date) >= datetime(?)";

const RANK_ORDER: &str = "ORDER BY confidence_score DESC, datetime(published_date) DESC, url ASC";

#[derive(Debug, sqlx::FromRow)]
struct ArticleRow {
    title: Option<String>,
    url: Option<String>,
    summary: Option<String>,
    confidence_score: Option<f64>,
    published_date: Option<String>,
    theme: Option<String>,
    category: Option<String>,
}

impl ArticleRow {
    fn into_article(self) -> Option<Article> {
        let published_date = parse_timestamp(self.published_date.as_deref()?)?;
        Some(Article {
            title: self.title?,
            url: self.url?,
            summary: self.summary.unwrap_or_default(),
            score: self.confidence_score?,
            published_date,
            theme: self.theme.unwrap_or_default(),
            category: self.category?,
        })
    }
}

fn into_articles(rows: Vec<ArticleRow>) -> Vec<Article> {
    rows.into_iter()
        .filter_map(|row| {
            let url = row.url.clone();
            let article = row.into_article();
            if article.is_none() {
                warn!("Skipping malformed article row: {:?}", url);
            }
            article
        })
        .collect()
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: SqlitePool,
    url: String,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be reachable, e.g. sqlite:articles.db"
    }

    async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error("Invalid database url"))?
            .create_if_missing(true);
        // Every connection to an in-memory database sees its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        debug!("Ran {} migrations on {}", MIGRATIONS.len(), url);

        Ok(Self { pool, url: url.to_string() })
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(&format!("sqlite:{}", db_path.display())).await
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }
}

/// One pooled connection, handed back to the pool on drop.
pub struct SQLiteReader {
    conn: PoolConnection<Sqlite>,
}

impl SQLiteReader {
    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

#[async_trait]
impl ArticleReader for SQLiteReader {
    async fn distinct_categories_since(&mut self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let query = format!(
            "SELECT DISTINCT category FROM articles WHERE category IS NOT NULL AND {} AND {} ORDER BY category",
            RANKABLE, PUBLISHED_SINCE
        );
        sqlx::query_scalar::<_, String>(&query)
            .bind(format_timestamp(&since))
            .fetch_all(self.conn())
            .await
            .map_err(db_error("Failed to list recent categories"))
    }

    async fn top_article_in_category_since(
        &mut self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Article>> {
        let query = format!(
            "SELECT {} FROM articles WHERE category = ? AND {} AND {} {} LIMIT 1",
            SELECT_COLUMNS, PUBLISHED_SINCE, RANKABLE, RANK_ORDER
        );
        let row = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(category)
            .bind(format_timestamp(&since))
            .fetch_optional(self.conn())
            .await
            .map_err(db_error("Failed to fetch top article in category"))?;
        Ok(row.map(|row| into_articles(vec![row])).and_then(|mut a| a.pop()))
    }

    async fn top_articles_since(&mut self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>> {
        let query = format!(
            "SELECT {} FROM articles WHERE {} AND category IS NOT NULL AND {} {} LIMIT ?",
            SELECT_COLUMNS, PUBLISHED_SINCE, RANKABLE, RANK_ORDER
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(format_timestamp(&since))
            .bind(limit as i64)
            .fetch_all(self.conn())
            .await
            .map_err(db_error("Failed to fetch recent articles"))?;
        Ok(into_articles(rows))
    }

    async fn top_articles_all_time(&mut self, limit: usize) -> Result<Vec<Article>> {
        let query = format!(
            "SELECT {} FROM articles WHERE category IS NOT NULL AND {} {} LIMIT ?",
            SELECT_COLUMNS, RANKABLE, RANK_ORDER
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(limit as i64)
            .fetch_all(self.conn())
            .await
            .map_err(db_error("Failed to fetch top articles"))?;
        Ok(into_articles(rows))
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn reader<'a>(&'a self) -> Result<Box<dyn ArticleReader + 'a>> {
        let conn = self.pool.acquire().await.map_err(db_error("Failed to acquire connection"))?;
        Ok(Box::new(SQLiteReader { conn }))
    }

    async fn list_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let query = format!(
            "SELECT {} FROM articles WHERE category IS NOT NULL AND {} {} LIMIT ?",
            SELECT_COLUMNS, RANKABLE, RANK_ORDER
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list articles"))?;
        Ok(dedup_by_url(into_articles(rows)))
    }

    async fn liked_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let query = format!(
            r#"
            SELECT {} FROM articles
            WHERE url IN (SELECT article_id FROM user_interactions WHERE interaction_type = 'like')
            AND category IS NOT NULL AND {}
            {} LIMIT ?
            "#,
            SELECT_COLUMNS, RANKABLE, RANK_ORDER
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list liked articles"))?;
        Ok(dedup_by_url(into_articles(rows)))
    }

    async fn store_article(&self, article: &Article) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;

        sqlx::query("DELETE FROM articles WHERE url = ?")
            .bind(&article.url)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to replace article"))?;

        sqlx::query(&format!(
            "INSERT INTO articles ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            ARTICLE_COLUMNS
        ))
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.summary)
        .bind(article.score)
        .bind(format_timestamp(&article.published_date))
        .bind(&article.theme)
        .bind(&article.category)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store article"))?;

        tx.commit().await.map_err(db_error("Failed to commit article"))?;
        Ok(())
    }
}

const INSERT_USER: &str = "INSERT OR IGNORE INTO users (user_id, created_at) VALUES (?, ?)";
const INSERT_SESSION: &str =
    "INSERT OR IGNORE INTO sessions (session_id, user_id, started_at, last_seen) VALUES (?, ?, ?, ?)";

#[async_trait]
impl InteractionStorage for SQLiteStorage {
    async fn register_user(&self, user_id: &str) -> Result<()> {
        sqlx::query(INSERT_USER)
            .bind(user_id)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to register user"))?;
        Ok(())
    }

    async fn register_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(INSERT_SESSION)
            .bind(session_id)
            .bind(user_id)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to register session"))?;
        Ok(())
    }

    async fn log_interaction(&self, interaction: &Interaction) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin transaction"))?;

        sqlx::query(INSERT_USER)
            .bind(&interaction.user_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to register user"))?;

        sqlx::query(INSERT_SESSION)
            .bind(&interaction.session_id)
            .bind(&interaction.user_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to register session"))?;

        sqlx::query(
            r#"
            INSERT INTO user_interactions
            (user_id, session_id, article_id, interaction_type, value, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&interaction.user_id)
        .bind(&interaction.session_id)
        .bind(&interaction.article_id)
        .bind(interaction.interaction_type.as_str())
        .bind(interaction.value.as_deref())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to log interaction"))?;

        sqlx::query("UPDATE sessions SET last_seen = ? WHERE session_id = ?")
            .bind(&now)
            .bind(&interaction.session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to update session"))?;

        tx.commit().await.map_err(db_error("Failed to commit interaction"))?;
        Ok(())
    }
}
