use async_trait::async_trait;
use nf_core::{Error, Result, Store};
use std::sync::Arc;
use tracing::info;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn connect(url: &str) -> Result<Self> where Self: Sized;
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite:articles.db";

/// Builds the backend named by `kind` (`memory` or `sqlite`).
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Arc<dyn Store>> {
    let storage: Arc<dyn Store> = match kind {
        "memory" => Arc::new(InMemoryStorage::connect(url.unwrap_or("memory://")).await?),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = url.unwrap_or(DEFAULT_DATABASE_URL);
            let storage = SQLiteStorage::connect(url).await.map_err(|e| {
                Error::Storage(format!("{} ({})", e, SQLiteStorage::get_error_message()))
            })?;
            Arc::new(storage)
        }
        other => return Err(Error::InvalidInput(format!("Unknown storage backend: {}", other))),
    };
    info!("Storage backend ready: {}", kind);
    Ok(storage)
}

pub mod prelude {
    pub use super::{create_storage, StorageBackend};
    pub use super::backends::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_storage() {
        let storage = create_storage("memory", None).await.unwrap();
        assert!(storage.list_articles(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let result = create_storage("qdrant", None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
