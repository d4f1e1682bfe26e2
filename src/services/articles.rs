//! Article publishing: creation with slug allocation, filtered listings,
//! visibility rules for drafts, view counting and dashboard statistics.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::core::error::BlogError;
use crate::core::pagination::{parse_sort, Page, PageRequest};
use crate::core::slug::unique_slug;
use crate::core::store::{
    to_document, DocumentStore, Filter, FindOptions, Sort, ARTICLES, CATEGORIES, TAGS, USERS,
};
use crate::models::article::{
    clean_content, clean_cover_image, clean_excerpt, clean_title, dedupe_ids, derive_excerpt,
    reading_time_minutes, Article, ArticleStatus, ArticleView, CreateArticleRequest, UpdateArticleRequest,
};
use crate::models::category::{Category, CategorySummary};
use crate::models::tag::{Tag, TagSummary};
use crate::models::user::{AuthorSummary, User};
use crate::models::{clean_optional, now};
use crate::services::{fetch, fetch_many, fetch_one, SLUG_WRITE_ATTEMPTS};

/// Fields a listing may be sorted by
pub const SORTABLE_FIELDS: [&str; 5] = ["created_at", "updated_at", "published_at", "title", "views"];
const TOP_ARTICLES: u64 = 5;

/// Listing filters, as given in the query string
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// `published`, `draft` or `all`
    pub status: Option<String>,
    /// Category slug
    pub category: Option<String>,
    /// Tag slug
    pub tag: Option<String>,
    /// Author username
    pub author: Option<String>,
    pub search: Option<String>,
    /// Sort expression such as `-views,title`
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StatusFilter {
    Published,
    Draft,
    All,
}

impl StatusFilter {
    fn parse(raw: Option<&str>) -> Result<Self, BlogError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("published") => Ok(StatusFilter::Published),
            Some("draft") => Ok(StatusFilter::Draft),
            Some("all") => Ok(StatusFilter::All),
            Some(other) => Err(BlogError::Validation(format!(
                "Unknown status '{}'; expected published, draft or all",
                other
            ))),
        }
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Serialize)]
pub struct BlogStats {
    pub total_articles: u64,
    pub published_articles: u64,
    pub draft_articles: u64,
    pub categories: u64,
    pub tags: u64,
    pub users: u64,
    pub total_views: u64,
    /// Most viewed published articles
    pub top_articles: Vec<TopArticle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopArticle {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub views: u64,
}

#[derive(Clone)]
pub struct ArticleService {
    store: Arc<dyn DocumentStore>,
}

impl ArticleService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, actor: &AuthUser, request: CreateArticleRequest) -> Result<ArticleView, BlogError> {
        let author: Option<User> = fetch(self.store.as_ref(), USERS, &actor.id).await?;
        if author.is_none() {
            return Err(BlogError::Unauthorized("Account no longer exists".to_string()));
        }

        let title = clean_title(&request.title)?;
        let content = clean_content(&request.content)?;
        let (excerpt, excerpt_derived) = match clean_excerpt(request.excerpt.as_deref())? {
            Some(excerpt) => (excerpt, false),
            None => (derive_excerpt(&content), true),
        };
        let cover_image = clean_cover_image(request.cover_image.as_deref())?;
        let category_id = self.check_category(clean_optional(request.category_id.as_deref())).await?;
        let tag_ids = self.check_tags(dedupe_ids(&request.tag_ids)).await?;
        let status = request.status.unwrap_or(ArticleStatus::Draft);

        let timestamp = now();
        let mut article = Article {
            id: Uuid::new_v4().to_string(),
            title,
            slug: String::new(),
            content,
            excerpt,
            excerpt_derived,
            cover_image,
            category_id,
            tag_ids,
            author_id: actor.id.clone(),
            status,
            views: 0,
            published_at: (status == ArticleStatus::Published).then_some(timestamp),
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.persist(&mut article, true, true).await?;
        info!("Created article {} ({}) as {}", article.slug, article.id, article.status.as_str());

        Populator::new(self.store.as_ref()).view(article, true).await
    }

    /// Paginated listing; what a viewer may see depends on who they are
    pub async fn list(
        &self,
        query: &ArticleQuery,
        page: PageRequest,
        viewer: Option<&AuthUser>,
    ) -> Result<Page<ArticleView>, BlogError> {
        let sort = parse_sort(query.sort.as_deref(), &SORTABLE_FIELDS, &[Sort::desc("created_at")])?;
        let requested = StatusFilter::parse(query.status.as_deref())?;

        let mut filters = Vec::new();
        match (viewer, requested) {
            (_, StatusFilter::Published) | (None, _) => {
                filters.push(Filter::eq("status", ArticleStatus::Published.as_str()));
            }
            (Some(user), StatusFilter::Draft) => {
                filters.push(Filter::eq("status", ArticleStatus::Draft.as_str()));
                if !user.is_admin() {
                    filters.push(Filter::eq("author_id", user.id.as_str()));
                }
            }
            (Some(user), StatusFilter::All) => {
                if !user.is_admin() {
                    filters.push(Filter::eq("author_id", user.id.as_str()));
                }
            }
        }

        if let Some(slug) = non_blank(query.category.as_deref()) {
            match fetch_one::<Category>(self.store.as_ref(), CATEGORIES, &[Filter::eq("slug", slug)]).await? {
                Some(category) => filters.push(Filter::eq("category_id", category.id)),
                None => return Ok(Page::empty(page)),
            }
        }
        if let Some(slug) = non_blank(query.tag.as_deref()) {
            match fetch_one::<Tag>(self.store.as_ref(), TAGS, &[Filter::eq("slug", slug)]).await? {
                Some(tag) => filters.push(Filter::contains("tag_ids", tag.id)),
                None => return Ok(Page::empty(page)),
            }
        }
        if let Some(username) = non_blank(query.author.as_deref()) {
            let username = username.to_lowercase();
            match fetch_one::<User>(self.store.as_ref(), USERS, &[Filter::eq("username", username)]).await? {
                Some(user) => filters.push(Filter::eq("author_id", user.id)),
                None => return Ok(Page::empty(page)),
            }
        }
        if let Some(term) = non_blank(query.search.as_deref()) {
            filters.push(Filter::search(&["title", "excerpt", "content"], term));
        }

        let total = self.store.count(ARTICLES, &filters).await?;
        let options = FindOptions {
            filters,
            sort,
            skip: page.skip(),
            limit: Some(page.limit),
        };
        let articles: Vec<Article> = fetch_many(self.store.as_ref(), ARTICLES, &options).await?;
        debug!("Article listing matched {} of {} documents", articles.len(), total);

        let mut populator = Populator::new(self.store.as_ref());
        let mut items = Vec::with_capacity(articles.len());
        for article in articles {
            items.push(populator.view(article, false).await?);
        }
        Ok(Page::new(items, page, total))
    }

    /// Public read by slug; counts a view unless the author is reading
    pub async fn get_by_slug(&self, slug: &str, viewer: Option<&AuthUser>) -> Result<ArticleView, BlogError> {
        let mut article: Article = fetch_one(self.store.as_ref(), ARTICLES, &[Filter::eq("slug", slug)])
            .await?
            .ok_or_else(|| BlogError::not_found("Article", slug))?;

        if !visible_to(&article, viewer) {
            return Err(BlogError::not_found("Article", slug));
        }

        let own_read = viewer.map_or(false, |v| v.id == article.author_id);
        if article.status == ArticleStatus::Published
            && !own_read
            && self.store.increment(ARTICLES, &article.id, "views").await?
        {
            article.views += 1;
        }

        Populator::new(self.store.as_ref()).view(article, true).await
    }

    /// Read by id for editing; never counts a view
    pub async fn get(&self, id: &str, viewer: &AuthUser) -> Result<ArticleView, BlogError> {
        let article = self.load(id).await?;
        if !visible_to(&article, Some(viewer)) {
            return Err(BlogError::not_found("Article", id));
        }
        Populator::new(self.store.as_ref()).view(article, true).await
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &AuthUser,
        request: UpdateArticleRequest,
    ) -> Result<ArticleView, BlogError> {
        let mut article = self.load(id).await?;
        if !actor.can_manage(&article.author_id) {
            return Err(BlogError::Forbidden("You can only edit your own articles".to_string()));
        }

        let mut reslug = false;
        if let Some(raw_title) = request.title.as_deref() {
            let title = clean_title(raw_title)?;
            if title != article.title {
                article.title = title;
                reslug = true;
            }
        }
        let mut content_changed = false;
        if let Some(raw_content) = request.content.as_deref() {
            let content = clean_content(raw_content)?;
            content_changed = content != article.content;
            article.content = content;
        }
        if request.excerpt.is_some() {
            match clean_excerpt(request.excerpt.as_deref())? {
                Some(excerpt) => {
                    article.excerpt = excerpt;
                    article.excerpt_derived = false;
                }
                None => {
                    article.excerpt = derive_excerpt(&article.content);
                    article.excerpt_derived = true;
                }
            }
        } else if content_changed && article.excerpt_derived {
            article.excerpt = derive_excerpt(&article.content);
        }
        if request.cover_image.is_some() {
            article.cover_image = clean_cover_image(request.cover_image.as_deref())?;
        }
        if request.category_id.is_some() {
            article.category_id = self.check_category(clean_optional(request.category_id.as_deref())).await?;
        }
        if let Some(tag_ids) = request.tag_ids.as_ref() {
            article.tag_ids = self.check_tags(dedupe_ids(tag_ids)).await?;
        }
        if let Some(status) = request.status {
            article.status = status;
        }

        let timestamp = now();
        if article.status == ArticleStatus::Published && article.published_at.is_none() {
            article.published_at = Some(timestamp);
        }
        article.updated_at = timestamp;

        self.persist(&mut article, false, reslug).await?;
        info!("Updated article {} ({})", article.slug, article.id);

        Populator::new(self.store.as_ref()).view(article, true).await
    }

    pub async fn delete(&self, id: &str, actor: &AuthUser) -> Result<(), BlogError> {
        let article = self.load(id).await?;
        if !actor.can_manage(&article.author_id) {
            return Err(BlogError::Forbidden("You can only delete your own articles".to_string()));
        }

        self.store.delete(ARTICLES, id).await?;
        info!("Deleted article {} ({})", article.slug, article.id);
        Ok(())
    }

    pub async fn stats(&self) -> Result<BlogStats, BlogError> {
        let store = self.store.as_ref();
        let published = [Filter::eq("status", ArticleStatus::Published.as_str())];

        let total_articles = store.count(ARTICLES, &[]).await?;
        let published_articles = store.count(ARTICLES, &published).await?;

        let total_views = store.sum(ARTICLES, "views", &[]).await?;

        let top_options = FindOptions {
            filters: published.to_vec(),
            sort: vec![Sort::desc("views")],
            skip: 0,
            limit: Some(TOP_ARTICLES),
        };
        let top: Vec<Article> = fetch_many(store, ARTICLES, &top_options).await?;

        Ok(BlogStats {
            total_articles,
            published_articles,
            draft_articles: total_articles.saturating_sub(published_articles),
            categories: store.count(CATEGORIES, &[]).await?,
            tags: store.count(TAGS, &[]).await?,
            users: store.count(USERS, &[]).await?,
            total_views,
            top_articles: top
                .into_iter()
                .map(|a| TopArticle { id: a.id, title: a.title, slug: a.slug, views: a.views })
                .collect(),
        })
    }

    async fn load(&self, id: &str) -> Result<Article, BlogError> {
        fetch(self.store.as_ref(), ARTICLES, id)
            .await?
            .ok_or_else(|| BlogError::not_found("Article", id))
    }

    /// Write the article, allocating a fresh slug when `reslug` is set.
    ///
    /// A concurrent writer can claim the allocated slug between the check and
    /// the write; the unique index turns that into `Conflict`, and the slug is
    /// allocated again.
    async fn persist(&self, article: &mut Article, insert: bool, reslug: bool) -> Result<(), BlogError> {
        let mut attempt = 1;
        loop {
            if reslug {
                article.slug = unique_slug(self.store.as_ref(), ARTICLES, &article.title, Some(&article.id)).await?;
            }

            let document = to_document(article)?;
            let result = if insert {
                self.store.insert(ARTICLES, &article.id, document).await
            } else {
                match self.store.replace(ARTICLES, &article.id, document).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(BlogError::not_found("Article", &article.id)),
                    Err(e) => Err(e),
                }
            };

            match result {
                Err(BlogError::Conflict(_)) if reslug && attempt < SLUG_WRITE_ATTEMPTS => {
                    warn!("Slug '{}' was claimed concurrently, allocating again", article.slug);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn check_category(&self, category_id: Option<String>) -> Result<Option<String>, BlogError> {
        if let Some(id) = category_id.as_deref() {
            if self.store.get(CATEGORIES, id).await?.is_none() {
                return Err(BlogError::Validation(format!("Category does not exist: {}", id)));
            }
        }
        Ok(category_id)
    }

    async fn check_tags(&self, tag_ids: Vec<String>) -> Result<Vec<String>, BlogError> {
        for id in &tag_ids {
            if self.store.get(TAGS, id).await?.is_none() {
                return Err(BlogError::Validation(format!("Tag does not exist: {}", id)));
            }
        }
        Ok(tag_ids)
    }
}

/// Drafts are visible to their author and to admins only
fn visible_to(article: &Article, viewer: Option<&AuthUser>) -> bool {
    article.status == ArticleStatus::Published || viewer.map_or(false, |v| v.can_manage(&article.author_id))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves article references, caching lookups across a listing
struct Populator<'a> {
    store: &'a dyn DocumentStore,
    categories: HashMap<String, Option<CategorySummary>>,
    tags: HashMap<String, Option<TagSummary>>,
    authors: HashMap<String, Option<AuthorSummary>>,
}

impl<'a> Populator<'a> {
    fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            categories: HashMap::new(),
            tags: HashMap::new(),
            authors: HashMap::new(),
        }
    }

    async fn view(&mut self, article: Article, with_content: bool) -> Result<ArticleView, BlogError> {
        let category = match article.category_id.as_deref() {
            Some(id) => self.category(id).await?,
            None => None,
        };

        let mut tags = Vec::with_capacity(article.tag_ids.len());
        for id in &article.tag_ids {
            // Dangling ids are skipped
            if let Some(tag) = self.tag(id).await? {
                tags.push(tag);
            }
        }

        let author = self.author(&article.author_id).await?;

        Ok(ArticleView {
            reading_time_minutes: reading_time_minutes(&article.content),
            content: with_content.then_some(article.content),
            id: article.id,
            title: article.title,
            slug: article.slug,
            excerpt: article.excerpt,
            cover_image: article.cover_image,
            status: article.status,
            views: article.views,
            category,
            tags,
            author,
            published_at: article.published_at,
            created_at: article.created_at,
            updated_at: article.updated_at,
        })
    }

    async fn category(&mut self, id: &str) -> Result<Option<CategorySummary>, BlogError> {
        if let Some(cached) = self.categories.get(id) {
            return Ok(cached.clone());
        }
        let found: Option<Category> = fetch(self.store, CATEGORIES, id).await?;
        let summary = found.as_ref().map(CategorySummary::from);
        self.categories.insert(id.to_string(), summary.clone());
        Ok(summary)
    }

    async fn tag(&mut self, id: &str) -> Result<Option<TagSummary>, BlogError> {
        if let Some(cached) = self.tags.get(id) {
            return Ok(cached.clone());
        }
        let found: Option<Tag> = fetch(self.store, TAGS, id).await?;
        let summary = found.as_ref().map(TagSummary::from);
        self.tags.insert(id.to_string(), summary.clone());
        Ok(summary)
    }

    async fn author(&mut self, id: &str) -> Result<Option<AuthorSummary>, BlogError> {
        if let Some(cached) = self.authors.get(id) {
            return Ok(cached.clone());
        }
        let found: Option<User> = fetch(self.store, USERS, id).await?;
        let summary = found.as_ref().map(AuthorSummary::from);
        self.authors.insert(id.to_string(), summary.clone());
        Ok(summary)
    }
}
