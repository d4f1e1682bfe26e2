use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::BlogError;
use crate::models::{check_length, check_optional_length, clean_optional, timestamp};

/// Stored category document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Category with the number of published articles filed under it
#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub article_count: u64,
}

/// Category embedded in article responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            slug: category.slug.clone(),
        }
    }
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update payload; a blank description clears it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn clean_name(raw: &str) -> Result<String, BlogError> {
    let name = raw.trim().to_string();
    check_length("Category name", &name, 2, 50)?;
    Ok(name)
}

pub fn clean_description(raw: Option<&str>) -> Result<Option<String>, BlogError> {
    let description = clean_optional(raw);
    check_optional_length("Description", description.as_deref(), 500)?;
    Ok(description)
}
