use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Allows the listed origins, or any origin when the list is empty.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::very_permissive().allow_origin(AllowOrigin::list(origins))
}

pub fn create_app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/articles", get(handlers::list_articles))
        .route("/articles/liked", get(handlers::liked_articles))
        .route("/home_articles", get(handlers::home_articles))
        .route("/log_interaction", post(handlers::log_interaction))
        .route("/register_user", post(handlers::register_user))
        .route("/register_session", post(handlers::register_session))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use nf_core::{Article, Result, Error};
    pub use crate::{create_app, cors_layer, AppState};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use nf_core::{Article, ArticleStorage, Store};
    use nf_storage::InMemoryStorage;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn article(url: &str, category: &str, score: f64, hours_ago: i64) -> Article {
        Article {
            title: format!("Title {}", url),
            url: url.to_string(),
            summary: "summary".to_string(),
            score,
            published_date: Utc::now() - Duration::hours(hours_ago),
            theme: "general".to_string(),
            category: category.to_string(),
        }
    }

    async fn app_with(articles: &[Article]) -> (Router, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        for article in articles {
            storage.store_article(article).await.unwrap();
        }
        let store: Arc<dyn Store> = storage.clone();
        (create_app(AppState::new(store), cors_layer(&[])), storage)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn assert_article_schema(value: &Value) {
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["category", "confidence_score", "published", "summary", "theme", "title", "url"]
        );
    }

    #[tokio::test]
    async fn test_home_articles_recent_path() {
        let (app, _) = app_with(&[
            article("a", "tech", 3.0, 1),
            article("b", "policy", 1.0, 2),
            article("c", "tech", 2.0, 3),
            article("old", "tech", 10.0, 72),
        ])
        .await;

        let (status, body) = get_json(app, "/home_articles").await;

        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        let urls: Vec<&str> = items.iter().map(|v| v["url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["a", "c", "b"]);
        items.iter().for_each(assert_article_schema);
    }

    #[tokio::test]
    async fn test_home_articles_fallback_uses_same_schema() {
        let (app, _) = app_with(&[article("old-1", "tech", 1.0, 30), article("old-2", "tech", 2.0, 40)]).await;

        let (status, body) = get_json(app, "/home_articles").await;

        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["url"], "old-2");
        assert_eq!(items[0]["confidence_score"], 2.0);
        items.iter().for_each(assert_article_schema);
    }

    #[tokio::test]
    async fn test_home_articles_empty_store() {
        let (app, _) = app_with(&[]).await;

        let (status, body) = get_json(app, "/home_articles").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_list_and_liked_articles() {
        let (app, _) = app_with(&[article("a", "tech", 1.0, 100), article("b", "tech", 2.0, 1)]).await;

        let (status, body) = get_json(app.clone(), "/articles").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["url"], "b");

        let (status, _) = post_json(
            app.clone(),
            "/log_interaction",
            json!({"user_id": "user-1", "session_id": "sess-1", "article_id": "a", "interaction_type": "like"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(app, "/articles/liked").await;
        let urls: Vec<&str> = body.as_array().unwrap().iter().map(|v| v["url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["a"]);
    }

    #[tokio::test]
    async fn test_log_interaction_registers_user_and_session() {
        let (app, storage) = app_with(&[]).await;

        let (status, body) = post_json(
            app,
            "/log_interaction",
            json!({"user_id": "user-1", "session_id": "sess-1", "article_id": "a", "interaction_type": "view", "value": "12"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        assert!(storage.user_created_at("user-1").await.is_some());
        assert_eq!(storage.session("sess-1").await.unwrap().user_id, "user-1");
        let logged = storage.interactions().await;
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].interaction.value.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_register_endpoints() {
        let (app, storage) = app_with(&[]).await;

        let (status, _) = post_json(app.clone(), "/register_user", json!({"user_id": "user-9"})).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post_json(app, "/register_session", json!({"session_id": "sess-9", "user_id": "user-9"})).await;
        assert_eq!(status, StatusCode::OK);

        assert!(storage.user_created_at("user-9").await.is_some());
        assert!(storage.session("sess-9").await.is_some());
    }

    #[tokio::test]
    async fn test_empty_ids_are_rejected() {
        let (app, storage) = app_with(&[]).await;

        let (status, body) = post_json(app, "/register_user", json!({"user_id": ""})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("user_id"));
        assert!(storage.user_created_at("").await.is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(&[]).await;
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    async fn preflight(app: Router, origin: &str) -> Option<String> {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/health")
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_cors_layer_skips_invalid_origins() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStorage::new());
        let cors = cors_layer(&["http://localhost:5173".to_string(), "bad\norigin".to_string()]);
        let app = create_app(AppState::new(store), cors);

        assert_eq!(
            preflight(app.clone(), "http://localhost:5173").await.as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(preflight(app, "http://evil.example").await, None);
    }
}
