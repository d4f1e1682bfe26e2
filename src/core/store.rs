//! Document storage for the blog collections.
//!
//! Documents are JSON objects grouped into named collections and addressed by
//! a string id. The [`DocumentStore`] trait is the seam between the services
//! and the storage engine; [`SqliteDocumentStore`] keeps every collection in a
//! single SQLite table and evaluates filters with the JSON1 functions.

use async_trait::async_trait;
use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::core::error::BlogError;

pub const USERS: &str = "users";
pub const ARTICLES: &str = "articles";
pub const CATEGORIES: &str = "categories";
pub const TAGS: &str = "tags";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_slug
        ON documents (collection, json_extract(body, '$.slug'))
        WHERE collection IN ('articles', 'categories', 'tags');
    CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username
        ON documents (json_extract(body, '$.username'))
        WHERE collection = 'users';
    CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email
        ON documents (json_extract(body, '$.email'))
        WHERE collection = 'users';
";

/// Predicate over a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the scalar (null-safe)
    Eq(String, Value),
    /// Field differs from the scalar (null-safe)
    Ne(String, Value),
    /// Array field contains the scalar
    Contains(String, Value),
    /// Case-insensitive substring match on any of the fields
    Search(Vec<String>, String),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(field.to_string(), value.into())
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Filter::Contains(field.to_string(), value.into())
    }

    pub fn search(fields: &[&str], term: &str) -> Self {
        Filter::Search(fields.iter().map(|f| f.to_string()).collect(), term.to_string())
    }
}

/// Sort key
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Field to order by
    pub field: String,
    /// Descending when true
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), descending: false }
    }

    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), descending: true }
    }
}

/// Options for multi-document queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// All filters must match
    pub filters: Vec<Filter>,
    /// Sort keys in priority order; ties fall back to the document id
    pub sort: Vec<Sort>,
    /// Number of matching documents to skip
    pub skip: u64,
    /// Maximum number of documents to return
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn filtered(filters: Vec<Filter>) -> Self {
        Self { filters, ..Self::default() }
    }
}

/// Storage backend for JSON documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails with `Conflict` on duplicate id or unique key
    async fn insert(&self, collection: &str, id: &str, document: Value) -> Result<(), BlogError>;

    /// Fetch a document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, BlogError>;

    /// Fetch the first document matching every filter
    async fn find_one(&self, collection: &str, filters: &[Filter]) -> Result<Option<Value>, BlogError>;

    /// Fetch all documents matching the options
    async fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Value>, BlogError>;

    /// Count documents matching every filter
    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, BlogError>;

    /// Replace an existing document; returns false when it does not exist
    async fn replace(&self, collection: &str, id: &str, document: Value) -> Result<bool, BlogError>;

    /// Delete a document; returns false when it does not exist
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, BlogError>;

    /// Add one to a numeric field in place; returns false when the document does not exist
    async fn increment(&self, collection: &str, id: &str, field: &str) -> Result<bool, BlogError>;

    /// Remove a scalar from an array field of every document holding it; returns the number changed
    async fn pull(&self, collection: &str, field: &str, value: Value) -> Result<u64, BlogError>;

    /// Sum a numeric field over the documents matching every filter
    async fn sum(&self, collection: &str, field: &str, filters: &[Filter]) -> Result<u64, BlogError>;
}

/// Serialize a typed model into a storable document
pub fn to_document<T: Serialize>(value: &T) -> Result<Value, BlogError> {
    Ok(serde_json::to_value(value)?)
}

/// Deserialize a stored document into a typed model
pub fn from_document<T: DeserializeOwned>(document: Value) -> Result<T, BlogError> {
    serde_json::from_value(document)
        .map_err(|e| BlogError::Storage(format!("corrupt document: {}", e)))
}

/// SQLite-backed document store
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) a store at the given path; `:memory:` opens a private in-memory store
    pub fn open(path: &str) -> Result<Self, BlogError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        info!("Opened document store at {}", path);
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, BlogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, BlogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, collection: &str, id: &str, document: Value) -> Result<(), BlogError> {
        let body = serde_json::to_string(&document)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id, body],
        )?;
        debug!("Inserted {}/{}", collection, id);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, BlogError> {
        let conn = self.conn.lock().await;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| parse_body(&b)).transpose()
    }

    async fn find_one(&self, collection: &str, filters: &[Filter]) -> Result<Option<Value>, BlogError> {
        let options = FindOptions {
            filters: filters.to_vec(),
            limit: Some(1),
            ..FindOptions::default()
        };
        Ok(self.find(collection, &options).await?.into_iter().next())
    }

    async fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Value>, BlogError> {
        let mut sql_params = vec![SqlValue::Text(collection.to_string())];
        let where_clause = build_where(&options.filters, &mut sql_params)?;

        let mut order_terms = Vec::with_capacity(options.sort.len() + 1);
        for sort in &options.sort {
            sql_params.push(SqlValue::Text(json_path(&sort.field)?));
            let direction = if sort.descending { "DESC" } else { "ASC" };
            order_terms.push(format!("json_extract(body, ?) COLLATE NOCASE {}", direction));
        }
        order_terms.push("id ASC".to_string());

        let limit = options.limit.map(|l| l as i64).unwrap_or(-1);
        sql_params.push(SqlValue::Integer(limit));
        sql_params.push(SqlValue::Integer(options.skip as i64));

        let sql = format!(
            "SELECT body FROM documents WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            where_clause,
            order_terms.join(", ")
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params.iter()), |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(parse_body(&row?)?);
        }
        Ok(documents)
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, BlogError> {
        let mut sql_params = vec![SqlValue::Text(collection.to_string())];
        let where_clause = build_where(filters, &mut sql_params)?;
        let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", where_clause);

        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(&sql, params_from_iter(sql_params.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn replace(&self, collection: &str, id: &str, document: Value) -> Result<bool, BlogError> {
        let body = serde_json::to_string(&document)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection, id, body],
        )?;
        Ok(changed > 0)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, BlogError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(changed > 0)
    }

    async fn increment(&self, collection: &str, id: &str, field: &str) -> Result<bool, BlogError> {
        let path = json_path(field)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE documents
             SET body = json_set(body, ?3, COALESCE(json_extract(body, ?3), 0) + 1)
             WHERE collection = ?1 AND id = ?2",
            params![collection, id, path],
        )?;
        Ok(changed > 0)
    }

    async fn pull(&self, collection: &str, field: &str, value: Value) -> Result<u64, BlogError> {
        let path = json_path(field)?;
        let value = to_sql_value(&value)?;
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE documents
             SET body = json_set(body, ?2, json((
                 SELECT json_group_array(value) FROM (
                     SELECT value FROM json_each(documents.body, ?2) WHERE value IS NOT ?3 ORDER BY key
                 )
             )))
             WHERE collection = ?1
               AND EXISTS (SELECT 1 FROM json_each(documents.body, ?2) WHERE json_each.value IS ?3)",
            params![collection, path, value],
        )?;
        debug!("Removed a value from {}.{} in {} document(s)", collection, field, changed);
        Ok(changed as u64)
    }

    async fn sum(&self, collection: &str, field: &str, filters: &[Filter]) -> Result<u64, BlogError> {
        let mut sql_params = vec![SqlValue::Text(json_path(field)?), SqlValue::Text(collection.to_string())];
        let where_clause = build_where(filters, &mut sql_params)?;
        let sql = format!(
            "SELECT CAST(COALESCE(SUM(json_extract(body, ?)), 0) AS INTEGER) FROM documents WHERE {}",
            where_clause
        );

        let conn = self.conn.lock().await;
        let total: i64 = conn.query_row(&sql, params_from_iter(sql_params.iter()), |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }
}

fn parse_body(body: &str) -> Result<Value, BlogError> {
    serde_json::from_str(body).map_err(|e| BlogError::Storage(format!("corrupt document body: {}", e)))
}

fn json_path(field: &str) -> Result<String, BlogError> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(BlogError::Validation(format!("Invalid field name: {}", field)));
    }
    Ok(format!("$.{}", field))
}

fn to_sql_value(value: &Value) -> Result<SqlValue, BlogError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        // JSON1 reports booleans as integers
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(BlogError::Validation(format!("Unsupported number: {}", n)))
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        _ => Err(BlogError::Validation("Only scalar values can be used in filters".to_string())),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the WHERE clause for a collection; the collection parameter must already be in `sql_params`
fn build_where(filters: &[Filter], sql_params: &mut Vec<SqlValue>) -> Result<String, BlogError> {
    let mut clauses = vec!["collection = ?".to_string()];

    for filter in filters {
        match filter {
            Filter::Eq(field, value) => {
                sql_params.push(SqlValue::Text(json_path(field)?));
                sql_params.push(to_sql_value(value)?);
                clauses.push("json_extract(body, ?) IS ?".to_string());
            }
            Filter::Ne(field, value) => {
                sql_params.push(SqlValue::Text(json_path(field)?));
                sql_params.push(to_sql_value(value)?);
                clauses.push("json_extract(body, ?) IS NOT ?".to_string());
            }
            Filter::Contains(field, value) => {
                sql_params.push(SqlValue::Text(json_path(field)?));
                sql_params.push(to_sql_value(value)?);
                clauses.push(
                    "EXISTS (SELECT 1 FROM json_each(documents.body, ?) WHERE json_each.value IS ?)"
                        .to_string(),
                );
            }
            Filter::Search(fields, term) => {
                if fields.is_empty() {
                    return Err(BlogError::Validation("Search requires at least one field".to_string()));
                }
                let pattern = format!("%{}%", escape_like(&term.to_ascii_lowercase()));
                let mut alternatives = Vec::with_capacity(fields.len());
                for field in fields {
                    sql_params.push(SqlValue::Text(json_path(field)?));
                    sql_params.push(SqlValue::Text(pattern.clone()));
                    alternatives.push("lower(json_extract(body, ?)) LIKE ? ESCAPE '\\'".to_string());
                }
                clauses.push(format!("({})", alternatives.join(" OR ")));
            }
        }
    }

    Ok(clauses.join(" AND "))
}
