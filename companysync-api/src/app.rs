/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use companysync_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        security::SecurityHeadersLayer,
        session::{require_admin, require_support_staff, session_auth},
    },
    routes,
};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use companysync_shared::storage::{local::LocalDiskStore, BlobStore};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Uploaded files never render or run scripts in the app's origin
const UPLOAD_DISPOSITION: &str = "attachment";
const UPLOAD_CSP: &str = "sandbox; default-src 'none'";

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Where uploaded files go
    pub storage: Arc<dyn BlobStore>,
}

impl AppState {
    /// Creates state backed by the local upload directory from `config`
    pub fn new(db: PgPool, config: Config) -> Self {
        let storage = LocalDiskStore::new(&config.uploads.dir, &config.uploads.public_path);
        Self::with_storage(db, config, Arc::new(storage))
    }

    pub fn with_storage(db: PgPool, config: Config, storage: Arc<dyn BlobStore>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            storage,
        }
    }
}

/// Builds the complete router with all routes and middleware
///
/// # Layout
///
/// ```text
/// /health                          public
/// /v1/auth/{register,login}        public
/// /v1/auth/{logout,me}             session
/// /v1/companies/...                session, membership checked per handler
/// /v1/{finance,notes,tasks}/...    session, mutation policy per handler
/// /v1/support/...                  session; threads and purge need staff
/// /v1/admin/...                    session + global admin
/// /uploads/*                       static, read-only, served as attachments
/// ```
pub fn build_router(state: AppState) -> Router {
    let public_auth = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let session_auth_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me));

    let company_routes = Router::new()
        .route(
            "/companies",
            get(routes::companies::list_companies).post(routes::companies::create_company),
        )
        .route(
            "/companies/:company_id",
            get(routes::companies::get_company)
                .put(routes::companies::update_company)
                .delete(routes::companies::delete_company),
        )
        .route(
            "/companies/:company_id/employees",
            get(routes::employees::list_employees).post(routes::employees::add_employee),
        )
        .route(
            "/companies/:company_id/employees/:user_id",
            put(routes::employees::update_employee).delete(routes::employees::remove_employee),
        )
        .route(
            "/companies/:company_id/finance",
            get(routes::finance::list_records).post(routes::finance::create_record),
        )
        .route(
            "/companies/:company_id/notes",
            get(routes::notes::list_notes).post(routes::notes::create_note),
        )
        .route(
            "/companies/:company_id/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/companies/:company_id/files",
            get(routes::files::list_company_files).post(routes::files::upload_company_file),
        );

    let resource_routes = Router::new()
        .route(
            "/finance/:record_id",
            put(routes::finance::update_record).delete(routes::finance::delete_record),
        )
        .route("/finance/:record_id/status", put(routes::finance::set_status))
        .route(
            "/finance/:record_id/files",
            get(routes::files::list_finance_files).post(routes::files::upload_finance_file),
        )
        .route("/finance-files/:file_id", delete(routes::files::delete_finance_file))
        .route("/company-files/:file_id", delete(routes::files::delete_company_file))
        .route(
            "/notes/:note_id",
            put(routes::notes::update_note).delete(routes::notes::delete_note),
        )
        .route(
            "/tasks/:task_id",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        );

    let support_staff_routes = Router::new()
        .route("/threads", get(routes::support::list_threads))
        .route(
            "/threads/:user_id",
            get(routes::support::read_thread).post(routes::support::reply),
        )
        .route("/purge", post(routes::support::purge))
        .route_layer(middleware::from_fn(require_support_staff));

    let support_routes = Router::new()
        .route(
            "/messages",
            get(routes::support::my_messages).post(routes::support::send_message),
        )
        .route("/unread", get(routes::support::unread_count))
        .merge(support_staff_routes);

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/:user_id/ban", post(routes::admin::ban_user))
        .route("/users/:user_id/unban", post(routes::admin::unban_user))
        .route("/users/:user_id/role", put(routes::admin::change_role))
        .route("/users/:user_id", delete(routes::admin::delete_user))
        .route("/companies", get(routes::admin::list_companies))
        .route("/logs", get(routes::admin::list_logs))
        .route("/logs/export", get(routes::admin::export_logs))
        .route("/settings", get(routes::admin::list_settings))
        .route("/settings/:key", put(routes::admin::update_setting))
        .route_layer(middleware::from_fn(require_admin));

    // Everything below requires a session
    let authenticated = Router::new()
        .nest("/auth", session_auth_routes)
        .merge(company_routes)
        .merge(resource_routes)
        .nest("/support", support_routes)
        .nest("/admin", admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), session_auth));

    let v1_routes = Router::new()
        .nest("/auth", public_auth)
        .merge(authenticated);

    let uploads = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static(UPLOAD_DISPOSITION),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(UPLOAD_CSP),
        ))
        .service(ServeDir::new(&state.config.uploads.dir));
    let body_limit = state.config.uploads.max_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .nest_service(&state.config.uploads.public_path, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Permissive CORS for `*`, otherwise an explicit origin list with
/// credentials so the session cookie is sent
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
