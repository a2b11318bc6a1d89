use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the auth middleware, so handlers always receive a
/// resolved `AuthUser`. Villa writes additionally require the editor or admin role.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        // GET/PUT /auth/profile
        // Read or edit the caller's own username, email and profile details.
        .route(
            "/auth/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        // PUT /auth/change-password
        // Requires the current password.
        .route("/auth/change-password", put(handlers::change_password))
        // GET /auth/verify
        // Token check used by the frontend on page load.
        .route("/auth/verify", get(handlers::verify_token))
        // POST /auth/logout
        .route("/auth/logout", post(handlers::logout))
        // --- Villa Management (staff) ---
        // POST /villas
        .route("/villas", post(handlers::create_villa))
        // PUT/DELETE /villas/{id}
        // Partial update is re-validated as a whole before it is stored.
        .route(
            "/villas/{id}",
            put(handlers::update_villa).delete(handlers::delete_villa),
        )
}
