use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::FieldError;

// --- Enumerations (Mapped to Postgres ENUM types) ---

/// Category
///
/// The fixed set of villa categories. Stored as the `villa_category` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[sqlx(type_name = "villa_category")]
pub enum Category {
    #[default]
    Luxury,
    Beachfront,
    Mountain,
    City,
    Rural,
    Family,
}

/// VillaStatus
///
/// Listing lifecycle. Only `active` villas are visible through the public catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "villa_status", rename_all = "lowercase")]
pub enum VillaStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

/// Role
///
/// Coarse RBAC level. `editor` and `admin` are both "staff" and may manage villas;
/// only `admin` may manage user accounts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Editor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Editor | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

// --- Villa Schemas ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub coordinates: Option<Coordinates>,
}

fn default_true() -> bool {
    true
}

/// Features
///
/// Capacity numbers are mandatory on input; the amenity flags fall back to the
/// same defaults the listing form pre-selects (wifi and kitchen on).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Features {
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub guests: i32,
    /// Floor area in square metres. May be fractional.
    pub area: f64,
    #[serde(default)]
    pub pool: bool,
    #[serde(default = "default_true")]
    pub wifi: bool,
    #[serde(default)]
    pub parking: bool,
    #[serde(default = "default_true")]
    pub kitchen: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            bedrooms: 1,
            bathrooms: 1,
            guests: 1,
            area: 1.0,
            pool: false,
            wifi: true,
            parking: false,
            kitchen: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VillaImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub caption: Option<String>,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct Availability {
    pub is_available: bool,
    /// Check-in time of day, `HH:MM`.
    pub check_in: String,
    pub check_out: String,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            is_available: true,
            check_in: "15:00".to_string(),
            check_out: "11:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(default)]
#[ts(export)]
pub struct Rating {
    /// Mean guest rating, 0 to 5.
    pub average: f64,
    pub count: i32,
}

/// Villa
///
/// The catalog record. Serialized with camelCase keys and `_id` as the identifier,
/// which is the shape the frontend renders.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Villa {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Nightly price.
    pub price: f64,
    pub location: Location,
    pub amenities: Vec<String>,
    pub features: Features,
    pub images: Vec<VillaImage>,
    pub availability: Availability,
    pub rating: Rating,
    pub category: Category,
    pub status: VillaStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Villa {
    /// validate
    ///
    /// Checks every field rule of the villa schema and returns all violations at once,
    /// so the admin form can highlight each offending input.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push(FieldError::new("title", "Title is required"));
        }
        if self.description.trim().is_empty() {
            errors.push(FieldError::new("description", "Description is required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            errors.push(FieldError::new("price", "Price must be a non-negative number"));
        }
        if self.location.address.trim().is_empty() {
            errors.push(FieldError::new("location.address", "Address is required"));
        }
        if self.location.city.trim().is_empty() {
            errors.push(FieldError::new("location.city", "City is required"));
        }
        if self.location.country.trim().is_empty() {
            errors.push(FieldError::new("location.country", "Country is required"));
        }

        let capacities = [
            ("features.bedrooms", self.features.bedrooms, "Bedrooms must be at least 1"),
            ("features.bathrooms", self.features.bathrooms, "Bathrooms must be at least 1"),
            ("features.guests", self.features.guests, "Guests must be at least 1"),
        ];
        for (field, value, message) in capacities {
            if value < 1 {
                errors.push(FieldError::new(field, message));
            }
        }
        if !(self.features.area.is_finite() && self.features.area >= 1.0) {
            errors.push(FieldError::new("features.area", "Area must be at least 1"));
        }

        if self.images.iter().any(|image| image.url.trim().is_empty()) {
            errors.push(FieldError::new("images", "Image url is required"));
        }
        if !(0.0..=5.0).contains(&self.rating.average) {
            errors.push(FieldError::new("rating.average", "Rating must be between 0 and 5"));
        }
        if self.rating.count < 0 {
            errors.push(FieldError::new("rating.count", "Rating count cannot be negative"));
        }

        errors
    }

    /// apply_update
    ///
    /// Merges a partial update into the record. Nested objects (location, features, ...)
    /// are replaced wholesale when present.
    pub fn apply_update(&mut self, req: UpdateVillaRequest) {
        if let Some(title) = req.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            self.description = description;
        }
        if let Some(price) = req.price {
            self.price = price;
        }
        if let Some(location) = req.location {
            self.location = location;
        }
        if let Some(amenities) = req.amenities {
            self.amenities = normalize_amenities(amenities);
        }
        if let Some(features) = req.features {
            self.features = features;
        }
        if let Some(images) = req.images {
            self.images = images;
        }
        if let Some(availability) = req.availability {
            self.availability = availability;
        }
        if let Some(rating) = req.rating {
            self.rating = rating;
        }
        if let Some(category) = req.category {
            self.category = category;
        }
        if let Some(status) = req.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

fn normalize_amenities(amenities: Vec<String>) -> Vec<String> {
    amenities
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// RecentVilla
///
/// Slim projection used by the admin dashboard's "recently added" panel.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecentVilla {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub status: VillaStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- User Schemas ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub phone: Option<String>,
}

/// User
///
/// An account record. The password hash is loaded for credential checks but is never
/// serialized into any response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub profile: Profile,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the repository. The password is already hashed by the caller.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
}

// --- Request Payloads (Input Schemas) ---

/// CreateVillaRequest
///
/// Input payload for POST /api/villas. Everything except the core listing data has a default.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateVillaRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: Location,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub features: Features,
    #[serde(default)]
    pub images: Vec<VillaImage>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub status: VillaStatus,
}

impl CreateVillaRequest {
    /// Builds a fresh record with a new id and current timestamps.
    pub fn into_villa(self) -> Villa {
        let now = Utc::now();
        Villa {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description,
            price: self.price,
            location: self.location,
            amenities: normalize_amenities(self.amenities),
            features: self.features,
            images: self.images,
            availability: self.availability,
            rating: self.rating,
            category: self.category,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// UpdateVillaRequest
///
/// Partial update payload for PUT /api/villas/{id}. Absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateVillaRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub amenities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub features: Option<Features>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub images: Option<Vec<VillaImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub availability: Option<Availability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<VillaStatus>,
}

/// RegisterRequest
///
/// Input payload for POST /api/auth/register. New accounts always start as `viewer`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile: Profile,
}

impl RegisterRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = validate_identity(Some(&self.username), Some(&self.email));
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters",
            ));
        }
        errors
    }
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// validate_identity
///
/// Shared username/email rules for registration and profile edits. `None` means the
/// field is not being changed.
pub fn validate_identity(username: Option<&str>, email: Option<&str>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(username) = username {
        let len = username.trim().chars().count();
        if !(3..=30).contains(&len) {
            errors.push(FieldError::new(
                "username",
                "Username must be between 3 and 30 characters",
            ));
        }
    }
    if let Some(email) = email {
        let email = email.trim();
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            errors.push(FieldError::new("email", "Please enter a valid email"));
        }
    }
    errors
}

/// Emails are compared case-insensitively; they are stored trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// AuthResponse
///
/// Returned by register and login: the bearer token plus the user it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// UpdateRoleRequest
///
/// The role is taken as a plain string so an unknown value maps to a 400 "Invalid role"
/// rather than a body-deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: String,
}

// --- Response Schemas (Output) ---

/// Pagination
///
/// Paging metadata attached to every list response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

impl Pagination {
    pub fn new(current_page: i64, items_per_page: i64, total_items: i64) -> Self {
        let total_pages = if items_per_page > 0 {
            (total_items + items_per_page - 1) / items_per_page
        } else {
            0
        };
        Self {
            current_page,
            total_pages,
            total_items,
            items_per_page,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VillaListResponse {
    pub villas: Vec<Villa>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

/// DashboardStats
///
/// Output schema for the staff dashboard (GET /api/admin/dashboard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    pub total_villas: i64,
    pub active_villas: i64,
    pub total_users: i64,
    pub recent_villas: Vec<RecentVilla>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ToggleStatusResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

/// UploadedImage
///
/// Describes one stored upload. `url` is what the villa form saves into `images[].url`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UploadedImage {
    pub url: String,
    pub filename: String,
    pub original_name: String,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadImagesResponse {
    pub message: String,
    pub images: Vec<UploadedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogsResponse {
    pub message: String,
    pub logs: Vec<String>,
}
