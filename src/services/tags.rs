use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::core::error::BlogError;
use crate::core::slug::slugify;
use crate::core::store::{to_document, DocumentStore, Filter, FindOptions, Sort, ARTICLES, TAGS};
use crate::models::article::ArticleStatus;
use crate::models::now;
use crate::models::tag::{clean_name, Tag, TagRequest, TagView};
use crate::services::{fetch, fetch_many, fetch_one};

/// Tag management
#[derive(Clone)]
pub struct TagService {
    store: Arc<dyn DocumentStore>,
}

impl TagService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: TagRequest) -> Result<Tag, BlogError> {
        let name = clean_name(&request.name)?;
        let slug = self.available_slug(&name, None).await?;

        let timestamp = now();
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name,
            slug,
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.store
            .insert(TAGS, &tag.id, to_document(&tag)?)
            .await
            .map_err(|e| duplicate_name(e, &tag.name))?;

        info!("Created tag {}", tag.slug);
        Ok(tag)
    }

    pub async fn list(&self) -> Result<Vec<TagView>, BlogError> {
        let options = FindOptions {
            sort: vec![Sort::asc("name")],
            ..FindOptions::default()
        };
        let tags: Vec<Tag> = fetch_many(self.store.as_ref(), TAGS, &options).await?;

        let mut views = Vec::with_capacity(tags.len());
        for tag in tags {
            views.push(self.with_count(tag).await?);
        }
        Ok(views)
    }

    pub async fn get(&self, id: &str) -> Result<Tag, BlogError> {
        fetch(self.store.as_ref(), TAGS, id)
            .await?
            .ok_or_else(|| BlogError::not_found("Tag", id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<TagView, BlogError> {
        let tag: Tag = fetch_one(self.store.as_ref(), TAGS, &[Filter::eq("slug", slug)])
            .await?
            .ok_or_else(|| BlogError::not_found("Tag", slug))?;
        self.with_count(tag).await
    }

    pub async fn update(&self, id: &str, request: TagRequest) -> Result<Tag, BlogError> {
        let mut tag = self.get(id).await?;
        let name = clean_name(&request.name)?;
        if name == tag.name {
            return Ok(tag);
        }

        tag.slug = self.available_slug(&name, Some(id)).await?;
        tag.name = name;
        tag.updated_at = now();

        let saved = self
            .store
            .replace(TAGS, id, to_document(&tag)?)
            .await
            .map_err(|e| duplicate_name(e, &tag.name))?;
        if !saved {
            return Err(BlogError::not_found("Tag", id));
        }
        Ok(tag)
    }

    /// Delete a tag and remove it from every article carrying it
    pub async fn delete(&self, id: &str) -> Result<(), BlogError> {
        let tag = self.get(id).await?;

        let detached = self.store.pull(ARTICLES, "tag_ids", id.into()).await?;
        self.store.delete(TAGS, id).await?;
        info!("Deleted tag {} (removed from {} article(s))", tag.slug, detached);
        Ok(())
    }

    async fn with_count(&self, tag: Tag) -> Result<TagView, BlogError> {
        let article_count = self
            .store
            .count(
                ARTICLES,
                &[
                    Filter::contains("tag_ids", tag.id.as_str()),
                    Filter::eq("status", ArticleStatus::Published.as_str()),
                ],
            )
            .await?;
        Ok(TagView { tag, article_count })
    }

    async fn available_slug(&self, name: &str, exclude_id: Option<&str>) -> Result<String, BlogError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(BlogError::Validation(
                "Tag name must contain at least one letter or digit".to_string(),
            ));
        }

        let mut filters = vec![Filter::eq("slug", slug.as_str())];
        if let Some(id) = exclude_id {
            filters.push(Filter::ne("id", id));
        }
        if self.store.count(TAGS, &filters).await? > 0 {
            return Err(BlogError::Conflict(format!("Tag '{}' already exists", name)));
        }
        Ok(slug)
    }
}

fn duplicate_name(err: BlogError, name: &str) -> BlogError {
    match err {
        BlogError::Conflict(_) => BlogError::Conflict(format!("Tag '{}' already exists", name)),
        other => other,
    }
}
