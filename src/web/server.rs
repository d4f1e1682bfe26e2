use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_files as fs;
use actix_web::{web, App, HttpServer, middleware};
use log::info;

use crate::auth::{PasswordHasher, TokenIssuer};
use crate::core::config::AppConfig;
use crate::core::error::BlogError;
use crate::core::pagination::PageRequest;
use crate::core::store::DocumentStore;
use crate::services::{ArticleService, CategoryService, TagService, UserService};
use crate::web::handlers;

/// Shared application state for web handlers
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub tokens: TokenIssuer,
    pub users: UserService,
    pub articles: ArticleService,
    pub categories: CategoryService,
    pub tags: TagService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        let tokens = TokenIssuer::new(&config.token_secret, config.token_ttl_hours);
        let hasher = PasswordHasher::new(config.password_iterations);

        Self {
            users: UserService::new(store.clone(), hasher, tokens.clone()),
            articles: ArticleService::new(store.clone()),
            categories: CategoryService::new(store.clone()),
            tags: TagService::new(store.clone()),
            store,
            tokens,
            config,
            started_at: Instant::now(),
        }
    }

    /// Normalise raw paging parameters with the configured page sizes
    pub fn page_request(&self, page: Option<u64>, limit: Option<u64>) -> PageRequest {
        PageRequest::from_query(page, limit, self.config.default_page_size, self.config.max_page_size)
    }
}

/// Register the `/api` routes
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .app_data(query_config())
            // System
            .route("/health", web::get().to(handlers::system::health))
            .route("/stats", web::get().to(handlers::system::stats))

            // Auth
            .route("/auth/register", web::post().to(handlers::auth::register))
            .route("/auth/login", web::post().to(handlers::auth::login))
            .route("/auth/me", web::get().to(handlers::auth::me))
            .route("/auth/me", web::put().to(handlers::auth::update_me))
            .route("/auth/password", web::put().to(handlers::auth::change_password))

            // Users
            .route("/users", web::get().to(handlers::users::list_users))
            .route("/users/{id}", web::get().to(handlers::users::get_user))
            .route("/users/{id}/role", web::put().to(handlers::users::set_role))
            .route("/users/{id}", web::delete().to(handlers::users::delete_user))

            // Articles
            .route("/articles", web::get().to(handlers::articles::list_articles))
            .route("/articles", web::post().to(handlers::articles::create_article))
            .route("/articles/id/{id}", web::get().to(handlers::articles::get_article_by_id))
            .route("/articles/{slug}", web::get().to(handlers::articles::get_article))
            .route("/articles/{id}", web::put().to(handlers::articles::update_article))
            .route("/articles/{id}", web::delete().to(handlers::articles::delete_article))

            // Categories
            .route("/categories", web::get().to(handlers::categories::list_categories))
            .route("/categories", web::post().to(handlers::categories::create_category))
            .route("/categories/{slug}", web::get().to(handlers::categories::get_category))
            .route("/categories/{id}", web::put().to(handlers::categories::update_category))
            .route("/categories/{id}", web::delete().to(handlers::categories::delete_category))

            // Tags
            .route("/tags", web::get().to(handlers::tags::list_tags))
            .route("/tags", web::post().to(handlers::tags::create_tag))
            .route("/tags/{slug}", web::get().to(handlers::tags::get_tag))
            .route("/tags/{id}", web::put().to(handlers::tags::update_tag))
            .route("/tags/{id}", web::delete().to(handlers::tags::delete_tag)),
    );
}

/// Malformed bodies are reported with the JSON error envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1024 * 1024)
        .error_handler(|err, _req| BlogError::Validation(format!("Invalid JSON body: {}", err)).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| BlogError::Validation(format!("Invalid query string: {}", err)).into())
}

fn cors(origin: Option<&str>) -> Cors {
    let cors = match origin {
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default().allow_any_origin(),
    };
    cors.allow_any_method().allow_any_header().max_age(3600)
}

/// Start the HTTP server for the blog API
pub async fn start_web_server(state: web::Data<AppState>) -> std::io::Result<()> {
    let config = state.config.clone();
    let address = config.bind_address();
    info!("Starting web server on http://{}", address);
    if let Some(dir) = &config.admin_dir {
        info!("Serving admin frontend from {} at /admin", dir);
    }

    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors(config.cors_origin.as_deref()))
            .app_data(state.clone())
            .configure(configure_api);

        // Pre-built admin frontend
        if let Some(dir) = &config.admin_dir {
            app = app.service(fs::Files::new("/admin", dir).index_file("index.html"));
        }

        // Default route for 404
        app.default_service(web::route().to(handlers::system::not_found))
    })
    .bind(address)?
    .run()
    .await
}

/// State over a fresh in-memory store with cheap password hashing
#[cfg(test)]
pub fn test_state() -> web::Data<AppState> {
    use crate::core::store::SqliteDocumentStore;

    let config = AppConfig {
        database_path: ":memory:".to_string(),
        token_secret: "test-secret".to_string(),
        password_iterations: 10,
        ..AppConfig::default()
    };
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    web::Data::new(AppState::new(config, store))
}

/// Build the API service around a state, the way the server does
#[cfg(test)]
#[macro_export]
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .configure($crate::web::server::configure_api)
                .default_service(actix_web::web::route().to($crate::web::handlers::system::not_found)),
        )
        .await
    };
}
