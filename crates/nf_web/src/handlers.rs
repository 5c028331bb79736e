use axum::{extract::State, Json};
use chrono::Utc;
use nf_core::{Article, Interaction, RegisterSession, RegisterUser};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use crate::{ApiError, AppState};

/// Cap on the plain article listings.
pub const LIST_LIMIT: usize = 200;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self { status: "ok" })
    }
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, ApiError> {
    Ok(Json(state.storage.list_articles(LIST_LIMIT).await?))
}

pub async fn liked_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, ApiError> {
    Ok(Json(state.storage.liked_articles(LIST_LIMIT).await?))
}

pub async fn home_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let mut reader = state.storage.reader().await?;
    let articles = state.home_feed.select(&mut *reader, Utc::now()).await?;
    debug!("Home feed has {} articles", articles.len());
    Ok(Json(articles))
}

pub async fn log_interaction(
    State(state): State<Arc<AppState>>,
    Json(interaction): Json<Interaction>,
) -> Result<Json<StatusResponse>, ApiError> {
    interaction.validate()?;
    state.storage.log_interaction(&interaction).await?;
    debug!(
        "Logged {} by {} on {}",
        interaction.interaction_type, interaction.user_id, interaction.article_id
    );
    Ok(StatusResponse::ok())
}

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(data): Json<RegisterUser>,
) -> Result<Json<StatusResponse>, ApiError> {
    data.validate()?;
    state.storage.register_user(&data.user_id).await?;
    Ok(StatusResponse::ok())
}

pub async fn register_session(
    State(state): State<Arc<AppState>>,
    Json(data): Json<RegisterSession>,
) -> Result<Json<StatusResponse>, ApiError> {
    data.validate()?;
    state.storage.register_session(&data.session_id, &data.user_id).await?;
    Ok(StatusResponse::ok())
}

pub async fn health() -> Json<StatusResponse> {
    StatusResponse::ok()
}
