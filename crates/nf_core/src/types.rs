use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format articles are stored and served with, always UTC.
pub const PUBLISHED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "confidence_score", alias = "score")]
    pub score: f64,
    #[serde(rename = "published", alias = "published_date", with = "published")]
    pub published_date: DateTime<Utc>,
    #[serde(default)]
    pub theme: String,
    pub category: String,
}

/// Parses a publication timestamp as written by the ingestion side.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, RFC 3339, and `YYYY-MM-DDTHH:MM:SS[.f]`.
/// Naive values are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, PUBLISHED_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(PUBLISHED_FORMAT).to_string()
}

mod published {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognised timestamp: {}", raw)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InteractionType {
    Like,
    View,
    Other(String),
}

impl InteractionType {
    pub fn as_str(&self) -> &str {
        match self {
            InteractionType::Like => "like",
            InteractionType::View => "view",
            InteractionType::Other(s) => s,
        }
    }
}

impl From<String> for InteractionType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "like" => InteractionType::Like,
            "view" => InteractionType::View,
            _ => InteractionType::Other(s),
        }
    }
}

impl From<InteractionType> for String {
    fn from(t: InteractionType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single user action against an article. `article_id` is the article url.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub session_id: String,
    pub article_id: String,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub value: Option<String>,
}

impl Interaction {
    pub fn validate(&self) -> crate::Result<()> {
        require("user_id", &self.user_id)?;
        require("session_id", &self.session_id)?;
        require("article_id", &self.article_id)?;
        require("interaction_type", self.interaction_type.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: String,
}

impl RegisterUser {
    pub fn validate(&self) -> crate::Result<()> {
        require("user_id", &self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSession {
    pub session_id: String,
    pub user_id: String,
}

impl RegisterSession {
    pub fn validate(&self) -> crate::Result<()> {
        require("session_id", &self.session_id)?;
        require("user_id", &self.user_id)
    }
}

fn require(field: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
