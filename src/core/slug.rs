use log::debug;
use serde_json::Value;
use uuid::Uuid;

use crate::core::error::BlogError;
use crate::core::store::{DocumentStore, Filter};

/// Longest slug produced by [`slugify`]
pub const MAX_SLUG_LEN: usize = 80;
/// Numbered candidates tried before falling back to a random suffix
pub const MAX_SLUG_ATTEMPTS: u32 = 50;

/// Turn arbitrary text into a lowercase, dash-separated URL segment
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        // Only ASCII is ever pushed, so byte truncation is safe
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    slug
}

/// Pick a slug for `text` that no other document in `collection` holds.
///
/// `exclude_id` is the document being updated, whose own slug does not count
/// as a collision.
pub async fn unique_slug(
    store: &dyn DocumentStore,
    collection: &str,
    text: &str,
    exclude_id: Option<&str>,
) -> Result<String, BlogError> {
    let base = match slugify(text) {
        s if s.is_empty() => "untitled".to_string(),
        s => s,
    };

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = if attempt == 1 {
            base.clone()
        } else {
            format!("{}-{}", base, attempt)
        };

        if !slug_taken(store, collection, &candidate, exclude_id).await? {
            return Ok(candidate);
        }
        debug!("Slug '{}' taken in {}, retrying", candidate, collection);
    }

    let suffix = Uuid::new_v4().simple().to_string();
    Ok(format!("{}-{}", base, &suffix[..8]))
}

async fn slug_taken(
    store: &dyn DocumentStore,
    collection: &str,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool, BlogError> {
    let mut filters = vec![Filter::eq("slug", slug)];
    if let Some(id) = exclude_id {
        filters.push(Filter::Ne("id".to_string(), Value::String(id.to_string())));
    }
    Ok(store.count(collection, &filters).await? > 0)
}
