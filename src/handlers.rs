use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{self, ApiError, ApiResult, FieldError},
    extract::{AppJson, AppPath, AppQuery},
    models::{
        self, AuthResponse, Category, ChangePasswordRequest, CreateVillaRequest, DashboardStats,
        HealthResponse, LoginRequest, LogsResponse, MessageResponse, NewUser, Pagination,
        RegisterRequest, Role, ToggleStatusResponse, UpdateProfileRequest, UpdateRoleRequest,
        UpdateVillaRequest, UploadImagesResponse, UploadedImage, User, UserListResponse,
        VerifyResponse, Villa, VillaListResponse,
    },
    query::{AdminVillaQuery, UserQuery, VillaQuery},
    storage::{self, MAX_IMAGE_BYTES, MAX_IMAGES_PER_UPLOAD, UPLOAD_PREFIX},
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

/// Number of villas surfaced on the homepage.
const FEATURED_LIMIT: i64 = 6;

const USER_EXISTS: &str = "User already exists";
const IDENTITY_IN_USE: &str = "Username or email already in use";

fn validated(errors: Vec<FieldError>) -> ApiResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

// --- Service Handlers ---

/// root
///
/// [Public Route] Liveness banner.
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Villa Catalog API is running"))
}

/// health_check
///
/// [Public Route] Used by load balancers and the container healthcheck.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "Villa Catalog API is healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

// --- Villa Catalog Handlers ---

/// list_villas
///
/// [Public Route] Lists active villas with search, filters, sorting and pagination.
#[utoipa::path(
    get,
    path = "/api/villas",
    params(VillaQuery),
    responses((status = 200, description = "One page of villas", body = VillaListResponse))
)]
pub async fn list_villas(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VillaQuery>,
) -> ApiResult<Json<VillaListResponse>> {
    let page = query.page_request();
    let (villas, total) = state.repo.list_villas(&query).await?;

    Ok(Json(VillaListResponse {
        villas,
        pagination: Pagination::new(page.page, page.limit, total),
    }))
}

/// get_featured_villas
///
/// [Public Route] Up to six active villas rated 4 or higher for the homepage.
#[utoipa::path(
    get,
    path = "/api/villas/featured/list",
    responses((status = 200, description = "Featured villas", body = [Villa]))
)]
pub async fn get_featured_villas(State(state): State<AppState>) -> ApiResult<Json<Vec<Villa>>> {
    Ok(Json(state.repo.get_featured_villas(FEATURED_LIMIT).await?))
}

/// get_categories
///
/// [Public Route] Categories that at least one villa currently uses.
#[utoipa::path(
    get,
    path = "/api/villas/categories/list",
    responses((status = 200, description = "Categories in use", body = [Category]))
)]
pub async fn get_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.get_categories().await?))
}

/// get_villa
///
/// [Public Route] A single villa by id, whatever its status (direct links keep working).
#[utoipa::path(
    get,
    path = "/api/villas/{id}",
    params(("id" = Uuid, Path, description = "Villa ID")),
    responses(
        (status = 200, description = "Found", body = Villa),
        (status = 404, description = "Villa not found")
    )
)]
pub async fn get_villa(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<Villa>> {
    state
        .repo
        .get_villa(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Villa not found".to_string()))
}

/// create_villa
///
/// [Staff Route] Validates and stores a new villa.
#[utoipa::path(
    post,
    path = "/api/villas",
    request_body = CreateVillaRequest,
    responses(
        (status = 201, description = "Created", body = Villa),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not staff")
    )
)]
pub async fn create_villa(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateVillaRequest>,
) -> ApiResult<(StatusCode, Json<Villa>)> {
    user.require_staff()?;

    let villa = payload.into_villa();
    validated(villa.validate())?;

    let created = state.repo.create_villa(villa).await?;
    tracing::info!(villa_id = %created.id, by = %user.id, "villa created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_villa
///
/// [Staff Route] Partial update. The merged record is re-validated before it is written.
#[utoipa::path(
    put,
    path = "/api/villas/{id}",
    params(("id" = Uuid, Path, description = "Villa ID")),
    request_body = UpdateVillaRequest,
    responses(
        (status = 200, description = "Updated", body = Villa),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Villa not found")
    )
)]
pub async fn update_villa(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateVillaRequest>,
) -> ApiResult<Json<Villa>> {
    user.require_staff()?;

    let not_found = || ApiError::NotFound("Villa not found".to_string());

    let mut villa = state.repo.get_villa(id).await?.ok_or_else(not_found)?;
    villa.apply_update(payload);
    validated(villa.validate())?;

    let updated = state.repo.update_villa(villa).await?.ok_or_else(not_found)?;
    Ok(Json(updated))
}

/// delete_villa
///
/// [Staff Route] Removes a villa. Its uploaded images are left in storage.
#[utoipa::path(
    delete,
    path = "/api/villas/{id}",
    params(("id" = Uuid, Path, description = "Villa ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Villa not found")
    )
)]
pub async fn delete_villa(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_staff()?;

    if state.repo.delete_villa(id).await? {
        tracing::info!(villa_id = %id, by = %user.id, "villa deleted");
        Ok(Json(MessageResponse::new("Villa deleted successfully")))
    } else {
        Err(ApiError::NotFound("Villa not found".to_string()))
    }
}

// --- Account Handlers ---

/// register
///
/// [Public Route] Creates a `viewer` account and logs it in straight away.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or user already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validated(payload.validate())?;

    let email = models::normalize_email(&payload.email);
    let username = payload.username.trim().to_string();

    if state
        .repo
        .identity_taken(Some(&email), Some(&username), None)
        .await?
    {
        return Err(ApiError::BadRequest(USER_EXISTS.to_string()));
    }

    let user = state
        .repo
        .create_user(NewUser {
            username,
            email,
            password_hash: auth::hash_password(&payload.password)?,
            role: Role::Viewer,
            profile: payload.profile,
        })
        .await
        .map_err(error::unique_violation_as(USER_EXISTS))?;

    let token = auth::issue_token(&user, &state.config)?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is deactivated")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .repo
        .find_user_by_email(&models::normalize_email(&payload.email))
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "failed login attempt");
        return Err(invalid());
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    let token = auth::issue_token(&user, &state.config)?;
    Ok(Json(AuthResponse { token, user }))
}

async fn load_current_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// get_profile
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<User>> {
    Ok(Json(load_current_user(&state, id).await?))
}

/// update_profile
///
/// [Authenticated Route] Changes the caller's username, email or profile details.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid input or already in use")
    )
)]
pub async fn update_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    validated(models::validate_identity(
        payload.username.as_deref(),
        payload.email.as_deref(),
    ))?;

    payload.email = payload.email.as_deref().map(models::normalize_email);
    payload.username = payload.username.map(|u| u.trim().to_string());

    if (payload.email.is_some() || payload.username.is_some())
        && state
            .repo
            .identity_taken(payload.email.as_deref(), payload.username.as_deref(), Some(id))
            .await?
    {
        return Err(ApiError::BadRequest(IDENTITY_IN_USE.to_string()));
    }

    state
        .repo
        .update_profile(id, payload)
        .await
        .map_err(error::unique_violation_as(IDENTITY_IN_USE))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// change_password
///
/// [Authenticated Route] Requires the current password before setting a new one.
#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Changed", body = MessageResponse),
        (status = 400, description = "Current password is incorrect")
    )
)]
pub async fn change_password(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = load_current_user(&state, id).await?;

    if !auth::verify_password(&payload.current_password, &user.password_hash) {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }
    if payload.new_password.chars().count() < models::MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(vec![FieldError::new(
            "newPassword",
            "Password must be at least 6 characters",
        )]));
    }

    let hash = auth::hash_password(&payload.new_password)?;
    state.repo.set_password(id, hash).await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// verify_token
///
/// [Authenticated Route] Lets the frontend confirm a stored token is still good.
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses((status = 200, description = "Token valid", body = VerifyResponse))
)]
pub async fn verify_token(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<VerifyResponse>> {
    let user = load_current_user(&state, id).await?;
    Ok(Json(VerifyResponse { valid: true, user }))
}

/// logout
///
/// [Authenticated Route] Tokens are stateless; the client simply discards its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(AuthUser { id, .. }: AuthUser) -> Json<MessageResponse> {
    tracing::debug!(user_id = %id, "logout");
    Json(MessageResponse::new("Logged out successfully"))
}

// --- Admin Handlers ---

/// get_dashboard
///
/// [Staff Route] Catalog and account counters plus the five newest villas.
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn get_dashboard(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<DashboardStats>> {
    user.require_staff()?;
    Ok(Json(state.repo.get_dashboard_stats().await?))
}

/// get_admin_villas
///
/// [Staff Route] Every villa regardless of status, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/villas",
    params(AdminVillaQuery),
    responses((status = 200, description = "One page of villas", body = VillaListResponse))
)]
pub async fn get_admin_villas(
    user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AdminVillaQuery>,
) -> ApiResult<Json<VillaListResponse>> {
    user.require_staff()?;

    let page = query.page_request();
    let (villas, total) = state.repo.list_admin_villas(&query).await?;
    Ok(Json(VillaListResponse {
        villas,
        pagination: Pagination::new(page.page, page.limit, total),
    }))
}

struct PendingImage {
    original_name: String,
    content_type: String,
    ext: String,
    data: Vec<u8>,
}

/// upload_images
///
/// [Staff Route] Accepts up to ten `images` parts of at most 5 MiB each. Every part is
/// checked before anything is stored, so a rejected request stores nothing.
#[utoipa::path(
    post,
    path = "/api/admin/upload-images",
    responses(
        (status = 200, description = "Stored", body = UploadImagesResponse),
        (status = 400, description = "No images, too many, too large or not an image")
    )
)]
pub async fn upload_images(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadImagesResponse>> {
    user.require_staff()?;

    let mut pending: Vec<PendingImage> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("images") {
            continue;
        }
        if pending.len() >= MAX_IMAGES_PER_UPLOAD {
            return Err(ApiError::BadRequest(format!(
                "Too many files. Maximum is {MAX_IMAGES_PER_UPLOAD} images"
            )));
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let ext = storage::image_extension(&original_name, &content_type)
            .ok_or_else(|| ApiError::BadRequest("Only image files are allowed!".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if data.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::BadRequest(
                "File too large. Maximum size is 5MB".to_string(),
            ));
        }

        pending.push(PendingImage {
            original_name,
            content_type,
            ext,
            data: data.to_vec(),
        });
    }

    if pending.is_empty() {
        return Err(ApiError::BadRequest("No images uploaded".to_string()));
    }

    let mut images = Vec::with_capacity(pending.len());
    for image in pending {
        let filename = storage::new_image_filename(&image.ext);
        let key = format!("{UPLOAD_PREFIX}/{filename}");
        let size = image.data.len() as u32;

        let url = state
            .storage
            .put_object(&key, &image.content_type, image.data)
            .await
            .map_err(ApiError::Storage)?;

        images.push(UploadedImage {
            url,
            filename,
            original_name: image.original_name,
            size,
        });
    }

    tracing::info!(count = images.len(), by = %user.id, "images uploaded");
    Ok(Json(UploadImagesResponse {
        message: "Images uploaded successfully".to_string(),
        images,
    }))
}

/// delete_image
///
/// [Staff Route] Removes a previously uploaded image by its stored filename.
#[utoipa::path(
    delete,
    path = "/api/admin/delete-image/{filename}",
    params(("filename" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Image not found")
    )
)]
pub async fn delete_image(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(filename): AppPath<String>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_staff()?;

    let key = storage::image_key(&filename)
        .ok_or_else(|| ApiError::BadRequest("Invalid filename".to_string()))?;

    if state
        .storage
        .delete_object(&key)
        .await
        .map_err(ApiError::Storage)?
    {
        Ok(Json(MessageResponse::new("Image deleted successfully")))
    } else {
        Err(ApiError::NotFound("Image not found".to_string()))
    }
}

/// get_logs
///
/// [Staff Route] Reserved for an audit log; always empty for now.
#[utoipa::path(
    get,
    path = "/api/admin/logs",
    responses((status = 200, description = "Logs", body = LogsResponse))
)]
pub async fn get_logs(user: AuthUser) -> ApiResult<Json<LogsResponse>> {
    user.require_staff()?;
    Ok(Json(LogsResponse {
        message: "System logs feature coming soon".to_string(),
        logs: vec![],
    }))
}

/// list_users
///
/// [Admin Route] Paginated accounts, optionally filtered by role.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserQuery),
    responses(
        (status = 200, description = "One page of users", body = UserListResponse),
        (status = 403, description = "Not admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserQuery>,
) -> ApiResult<Json<UserListResponse>> {
    user.require_admin()?;

    let page = query.page_request();
    let (users, total) = state.repo.list_users(&query).await?;
    Ok(Json(UserListResponse {
        users,
        pagination: Pagination::new(page.page, page.limit, total),
    }))
}

/// update_user_role
///
/// [Admin Route] Sets a user's role to `viewer`, `editor` or `admin`.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid role"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    user.require_admin()?;

    let role: Role = payload
        .role
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid role".to_string()))?;

    let updated = state
        .repo
        .set_user_role(id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, role = %role, by = %user.id, "role changed");
    Ok(Json(updated))
}

/// toggle_user_status
///
/// [Admin Route] Flips `isActive`. Deactivated users can no longer log in or use tokens.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/toggle-status",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Toggled", body = ToggleStatusResponse),
        (status = 400, description = "Cannot deactivate your own account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn toggle_user_status(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<ToggleStatusResponse>> {
    user.require_admin()?;

    if id == user.id {
        return Err(ApiError::BadRequest(
            "Cannot deactivate your own account".to_string(),
        ));
    }

    let updated = state
        .repo
        .toggle_user_active(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let verb = if updated.is_active { "activated" } else { "deactivated" };
    Ok(Json(ToggleStatusResponse {
        message: format!("User {verb} successfully"),
        user: updated,
    }))
}

/// delete_user
///
/// [Admin Route] Deletes an account. Admins cannot delete themselves.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Cannot delete your own account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    user.require_admin()?;

    let target = load_current_user(&state, id).await?;
    if target.id == user.id {
        return Err(ApiError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    if !state.repo.delete_user(id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, by = %user.id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
