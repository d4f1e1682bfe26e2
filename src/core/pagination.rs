use serde::Serialize;

use crate::core::error::BlogError;
use crate::core::store::Sort;

/// Normalised page request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u64,
    /// Items per page
    pub limit: u64,
}

impl PageRequest {
    /// Clamp raw query values: page >= 1, limit in `1..=max_limit`
    pub fn from_query(page: Option<u64>, limit: Option<u64>, default_limit: u64, max_limit: u64) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit.max(1));
        Self { page, limit }
    }

    /// Documents to skip before this page
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of results plus navigation metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

/// Pagination metadata returned with list responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageInfo {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let pages = (total + request.limit - 1) / request.limit;
        Self {
            items,
            pagination: PageInfo {
                page: request.page,
                limit: request.limit,
                total,
                pages,
                has_next: request.page < pages,
                has_prev: request.page > 1,
            },
        }
    }

    /// A page with no results, used when a filter cannot match anything
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }
}

/// Parse a `field,-other` sort expression against a whitelist of fields
pub fn parse_sort(raw: Option<&str>, allowed: &[&str], default: &[Sort]) -> Result<Vec<Sort>, BlogError> {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(default.to_vec()),
    };

    let mut keys = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, descending) = match part.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (part.strip_prefix('+').unwrap_or(part), false),
        };

        if !allowed.contains(&field) {
            return Err(BlogError::Validation(format!(
                "Cannot sort by '{}'; allowed fields: {}",
                field,
                allowed.join(", ")
            )));
        }
        if keys.iter().any(|k: &Sort| k.field == field) {
            continue;
        }
        keys.push(Sort { field: field.to_string(), descending });
    }

    if keys.is_empty() {
        return Ok(default.to_vec());
    }
    Ok(keys)
}
