use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::BlogError;
use crate::models::category::CategorySummary;
use crate::models::tag::TagSummary;
use crate::models::user::AuthorSummary;
use crate::models::{check_length, check_optional_length, clean_optional, timestamp};

/// Length of generated excerpts before the ellipsis
pub const EXCERPT_LEN: usize = 160;
const WORDS_PER_MINUTE: usize = 200;

/// Publication state of an article
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
        }
    }
}

/// Stored article document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Markdown body
    pub content: String,
    pub excerpt: String,
    /// Set while the excerpt is generated from the content
    #[serde(default)]
    pub excerpt_derived: bool,
    pub cover_image: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    pub author_id: String,
    pub status: ArticleStatus,
    #[serde(default)]
    pub views: u64,
    #[serde(default, with = "timestamp::option")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Article with its references resolved, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    /// Omitted from list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub status: ArticleStatus,
    pub views: u64,
    pub reading_time_minutes: u32,
    pub category: Option<CategorySummary>,
    pub tags: Vec<TagSummary>,
    pub author: Option<AuthorSummary>,
    #[serde(with = "timestamp::option")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    pub status: Option<ArticleStatus>,
}

/// Partial update payload.
///
/// Blank `excerpt`, `cover_image` or `category_id` clear the field. A cleared
/// or never supplied excerpt follows the content and is regenerated whenever
/// the content changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category_id: Option<String>,
    pub tag_ids: Option<Vec<String>>,
    pub status: Option<ArticleStatus>,
}

pub fn clean_title(raw: &str) -> Result<String, BlogError> {
    let title = raw.trim().to_string();
    check_length("Title", &title, 3, 200)?;
    Ok(title)
}

pub fn clean_content(raw: &str) -> Result<String, BlogError> {
    if raw.trim().is_empty() {
        return Err(BlogError::Validation("Content is required".to_string()));
    }
    Ok(raw.to_string())
}

pub fn clean_excerpt(raw: Option<&str>) -> Result<Option<String>, BlogError> {
    let excerpt = clean_optional(raw);
    check_optional_length("Excerpt", excerpt.as_deref(), 300)?;
    Ok(excerpt)
}

pub fn clean_cover_image(raw: Option<&str>) -> Result<Option<String>, BlogError> {
    let cover = clean_optional(raw);
    check_optional_length("Cover image", cover.as_deref(), 500)?;
    Ok(cover)
}

/// Trim tag ids and drop blanks and duplicates, keeping first-seen order
pub fn dedupe_ids(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !seen.iter().any(|s: &String| s == id) {
            seen.push(id.to_string());
        }
    }
    seen
}

/// Plain text of a markdown document with inline syntax removed
pub fn strip_markdown(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '#' | '*' | '_' | '`' | '>' | '~' | '[' => {}
            '!' if chars.peek() == Some(&'[') => {}
            ']' => {
                // Link or image target
                if chars.peek() == Some(&'(') {
                    for next in chars.by_ref() {
                        if next == ')' {
                            break;
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Excerpt generated from markdown content when the author supplies none
pub fn derive_excerpt(content: &str) -> String {
    let text = strip_markdown(content);
    if text.chars().count() <= EXCERPT_LEN {
        return text;
    }

    let cut: String = text.chars().take(EXCERPT_LEN).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end())
}

/// Estimated reading time, never less than a minute
pub fn reading_time_minutes(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    ((words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE).max(1) as u32
}
