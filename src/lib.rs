use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod query;
pub mod repository;
pub mod storage;

// Routers grouped by access level (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every `/api` endpoint, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health_check, handlers::list_villas, handlers::get_featured_villas,
        handlers::get_categories, handlers::get_villa, handlers::create_villa,
        handlers::update_villa, handlers::delete_villa, handlers::register, handlers::login,
        handlers::get_profile, handlers::update_profile, handlers::change_password,
        handlers::verify_token, handlers::logout, handlers::get_dashboard,
        handlers::get_admin_villas, handlers::upload_images, handlers::delete_image,
        handlers::get_logs, handlers::list_users, handlers::update_user_role,
        handlers::toggle_user_status, handlers::delete_user
    ),
    components(
        schemas(
            models::Villa, models::Location, models::Coordinates, models::Features,
            models::VillaImage, models::Availability, models::Rating, models::Category,
            models::VillaStatus, models::Role, models::User, models::Profile,
            models::CreateVillaRequest, models::UpdateVillaRequest, models::RegisterRequest,
            models::LoginRequest, models::AuthResponse, models::UpdateProfileRequest,
            models::ChangePasswordRequest, models::UpdateRoleRequest, models::Pagination,
            models::VillaListResponse, models::UserListResponse, models::DashboardStats,
            models::RecentVilla, models::MessageResponse, models::VerifyResponse,
            models::ToggleStatusResponse, models::HealthResponse, models::UploadedImage,
            models::UploadImagesResponse, models::LogsResponse, error::FieldError,
        )
    ),
    tags(
        (name = "villa-catalog", description = "Villa rental catalog API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloneable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Object store for uploaded villa images.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets `AuthUser` (and any future extractor) pull single components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Resolving `AuthUser` is the whole check: a failed extraction rejects the request
/// with the extractor's 401/403 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the full application: `/` banner, Swagger UI, and the `/api` tree with
/// the observability and CORS layers around it.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        );

    let base_router = Router::new()
        .route("/", get(handlers::root))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Tags every request span with the `x-request-id` so all log lines of one request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
