use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::core::error::BlogError;
use crate::core::slug::slugify;
use crate::core::store::{to_document, DocumentStore, Filter, FindOptions, Sort, ARTICLES, CATEGORIES};
use crate::models::article::ArticleStatus;
use crate::models::category::{clean_description, clean_name, Category, CategoryRequest, CategoryUpdate, CategoryView};
use crate::models::now;
use crate::services::{fetch, fetch_many, fetch_one};

/// Category management
#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn DocumentStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CategoryRequest) -> Result<Category, BlogError> {
        let name = clean_name(&request.name)?;
        let description = clean_description(request.description.as_deref())?;
        let slug = self.available_slug(&name, None).await?;

        let timestamp = now();
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name,
            slug,
            description,
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.store
            .insert(CATEGORIES, &category.id, to_document(&category)?)
            .await
            .map_err(|e| duplicate_name(e, &category.name))?;

        info!("Created category {} ({})", category.name, category.slug);
        Ok(category)
    }

    /// All categories by name, with published article counts
    pub async fn list(&self) -> Result<Vec<CategoryView>, BlogError> {
        let options = FindOptions {
            sort: vec![Sort::asc("name")],
            ..FindOptions::default()
        };
        let categories: Vec<Category> = fetch_many(self.store.as_ref(), CATEGORIES, &options).await?;

        let mut views = Vec::with_capacity(categories.len());
        for category in categories {
            views.push(self.with_count(category).await?);
        }
        Ok(views)
    }

    pub async fn get(&self, id: &str) -> Result<Category, BlogError> {
        fetch(self.store.as_ref(), CATEGORIES, id)
            .await?
            .ok_or_else(|| BlogError::not_found("Category", id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<CategoryView, BlogError> {
        let category: Category = fetch_one(self.store.as_ref(), CATEGORIES, &[Filter::eq("slug", slug)])
            .await?
            .ok_or_else(|| BlogError::not_found("Category", slug))?;
        self.with_count(category).await
    }

    /// Rename or re-describe a category; renaming moves it to a new slug
    pub async fn update(&self, id: &str, update: CategoryUpdate) -> Result<Category, BlogError> {
        let mut category = self.get(id).await?;

        if let Some(raw_name) = update.name.as_deref() {
            let name = clean_name(raw_name)?;
            if name != category.name {
                category.slug = self.available_slug(&name, Some(id)).await?;
                category.name = name;
            }
        }
        if update.description.is_some() {
            category.description = clean_description(update.description.as_deref())?;
        }

        category.updated_at = now();
        let saved = self
            .store
            .replace(CATEGORIES, id, to_document(&category)?)
            .await
            .map_err(|e| duplicate_name(e, &category.name))?;
        if !saved {
            return Err(BlogError::not_found("Category", id));
        }
        Ok(category)
    }

    /// Delete a category that no article references
    pub async fn delete(&self, id: &str) -> Result<(), BlogError> {
        let category = self.get(id).await?;
        let in_use = self.store.count(ARTICLES, &[Filter::eq("category_id", id)]).await?;
        if in_use > 0 {
            return Err(BlogError::Conflict(format!(
                "Category '{}' is used by {} article(s)",
                category.name, in_use
            )));
        }

        self.store.delete(CATEGORIES, id).await?;
        info!("Deleted category {}", category.slug);
        Ok(())
    }

    async fn with_count(&self, category: Category) -> Result<CategoryView, BlogError> {
        let article_count = self
            .store
            .count(
                ARTICLES,
                &[
                    Filter::eq("category_id", category.id.as_str()),
                    Filter::eq("status", ArticleStatus::Published.as_str()),
                ],
            )
            .await?;
        Ok(CategoryView { category, article_count })
    }

    /// Category slugs are the slugified name and must not collide
    async fn available_slug(&self, name: &str, exclude_id: Option<&str>) -> Result<String, BlogError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(BlogError::Validation(
                "Category name must contain at least one letter or digit".to_string(),
            ));
        }

        let mut filters = vec![Filter::eq("slug", slug.as_str())];
        if let Some(id) = exclude_id {
            filters.push(Filter::ne("id", id));
        }
        if self.store.count(CATEGORIES, &filters).await? > 0 {
            return Err(BlogError::Conflict(format!("A category named '{}' already exists", name)));
        }
        Ok(slug)
    }
}

fn duplicate_name(err: BlogError, name: &str) -> BlogError {
    match err {
        BlogError::Conflict(_) => BlogError::Conflict(format!("A category named '{}' already exists", name)),
        other => other,
    }
}
