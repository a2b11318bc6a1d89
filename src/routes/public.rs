use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. The catalog listing only ever returns `active` villas; a
/// villa fetched by id is returned whatever its status.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Monitoring and container healthcheck.
        .route("/health", get(handlers::health_check))
        // GET /villas?search=&category=&minPrice=&maxPrice=&bedrooms=&guests=&sortBy=&sortOrder=&page=&limit=
        // Paginated catalog of active villas.
        .route("/villas", get(handlers::list_villas))
        // GET /villas/featured/list
        // Homepage selection: top rated active villas.
        .route("/villas/featured/list", get(handlers::get_featured_villas))
        // GET /villas/categories/list
        // Distinct categories currently in use, for the filter dropdown.
        .route("/villas/categories/list", get(handlers::get_categories))
        // GET /villas/{id}
        .route("/villas/{id}", get(handlers::get_villa))
        // POST /auth/register
        // New accounts always start as `viewer`.
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
}
