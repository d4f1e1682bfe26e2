//! Business operations for each blog resource.
//!
//! Services are cheap to clone: each one holds an `Arc` to the shared
//! document store and whatever auth helpers it needs.

pub mod articles;
pub mod categories;
pub mod tags;
pub mod users;

use serde::de::DeserializeOwned;

use crate::core::error::BlogError;
use crate::core::store::{from_document, DocumentStore, Filter, FindOptions};

pub use articles::{ArticleQuery, ArticleService};
pub use categories::CategoryService;
pub use tags::TagService;
pub use users::UserService;

/// Times an insert or replace is retried when a unique slug is taken concurrently
pub const SLUG_WRITE_ATTEMPTS: u32 = 3;

/// Fetch and decode a document by id
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, BlogError> {
    store.get(collection, id).await?.map(from_document).transpose()
}

/// Fetch and decode the first document matching the filters
pub async fn fetch_one<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    filters: &[Filter],
) -> Result<Option<T>, BlogError> {
    store.find_one(collection, filters).await?.map(from_document).transpose()
}

/// Fetch and decode every document matching the options
pub async fn fetch_many<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    options: &FindOptions,
) -> Result<Vec<T>, BlogError> {
    store
        .find(collection, options)
        .await?
        .into_iter()
        .map(from_document)
        .collect()
}
