use crate::{
    AppState, handlers,
    storage::{MAX_IMAGE_BYTES, MAX_IMAGES_PER_UPLOAD},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Room for a full batch of images plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGES_PER_UPLOAD * MAX_IMAGE_BYTES + 1024 * 1024;

/// Admin Router Module
///
/// Mounted at `/api/admin` behind the auth middleware. Dashboard, villa and image
/// routes are open to editors and admins; user management is admin only. Both gates
/// are enforced in the handlers.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/dashboard
        // Villa and user counters plus the newest villas.
        .route("/dashboard", get(handlers::get_dashboard))
        // GET /admin/villas?status=&category=&page=&limit=
        // All villas including inactive and maintenance ones.
        .route("/villas", get(handlers::get_admin_villas))
        // POST /admin/upload-images
        // Multipart upload of up to ten images. Raises the default body limit for this route only.
        .route(
            "/upload-images",
            post(handlers::upload_images).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // DELETE /admin/delete-image/{filename}
        .route("/delete-image/{filename}", delete(handlers::delete_image))
        // GET /admin/logs
        .route("/logs", get(handlers::get_logs))
        // --- User Management (admin) ---
        // GET /admin/users?role=&page=&limit=
        .route("/users", get(handlers::list_users))
        // PUT /admin/users/{id}/role
        .route("/users/{id}/role", put(handlers::update_user_role))
        // PUT /admin/users/{id}/toggle-status
        .route(
            "/users/{id}/toggle-status",
            put(handlers::toggle_user_status),
        )
        // DELETE /admin/users/{id}
        .route("/users/{id}", delete(handlers::delete_user))
}
