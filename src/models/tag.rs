use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::BlogError;
use crate::models::{check_length, timestamp};

/// Stored tag document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Tag with the number of published articles carrying it
#[derive(Debug, Clone, Serialize)]
pub struct TagView {
    #[serde(flatten)]
    pub tag: Tag,
    pub article_count: u64,
}

/// Tag embedded in article responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TagSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

impl From<&Tag> for TagSummary {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id.clone(),
            name: tag.name.clone(),
            slug: tag.slug.clone(),
        }
    }
}

/// Create and update payload
#[derive(Debug, Clone, Deserialize)]
pub struct TagRequest {
    pub name: String,
}

pub fn clean_name(raw: &str) -> Result<String, BlogError> {
    let name = raw.trim().to_string();
    check_length("Tag name", &name, 1, 30)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name(" async ").unwrap(), "async");
        assert!(clean_name("   ").is_err());
        assert!(clean_name(&"t".repeat(31)).is_err());
    }
}
