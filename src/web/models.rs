use serde::{Deserialize, Serialize};

use crate::core::pagination::{Page, PageInfo};
use crate::models::user::Role;
use crate::services::ArticleQuery;

/// Success envelope around a single payload
#[derive(Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Success envelope around one page of results
#[derive(Serialize)]
pub struct ListResponse<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T: Serialize> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            success: true,
            data: page.items,
            pagination: page.pagination,
        }
    }
}

/// Generic response
#[derive(Serialize)]
pub struct GenericResponse {
    pub success: bool,
    pub message: String,
}

impl GenericResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// Query string for the user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub role: Option<Role>,
}

/// Query string for the article listing
#[derive(Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl From<ArticleListQuery> for ArticleQuery {
    fn from(query: ArticleListQuery) -> Self {
        Self {
            status: query.status,
            category: query.category,
            tag: query.tag,
            author: query.author,
            search: query.search,
            sort: query.sort,
        }
    }
}
