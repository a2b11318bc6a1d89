#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, response::Response};
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use villa_catalog::{
    AppState,
    auth::{self, AuthUser},
    config::AppConfig,
    models::{
        Category, DashboardStats, Features, Location, NewUser, Profile, Rating, RecentVilla, Role,
        UpdateProfileRequest, User, Villa, VillaStatus,
    },
    query::{AdminVillaQuery, SortKey, SortOrder, UserQuery, VillaQuery},
    repository::{RepoResult, Repository},
    storage::MockStorageService,
};

// --- IN-MEMORY REPOSITORY ---

// Mirrors the Postgres repository closely enough for handler and router tests:
// the same filters, sort keys and paging rules, over two Vec tables.
#[derive(Default)]
pub struct InMemoryRepository {
    pub villas: Mutex<Vec<Villa>>,
    pub users: Mutex<Vec<User>>,
    // When set, every call fails like a lost database connection.
    pub fail: bool,
    // When set, user writes fail like a concurrent insert won the UNIQUE constraint.
    pub unique_conflict: bool,
}

/// A `users_email_key` violation, as Postgres reports a lost registration race.
#[derive(Debug)]
pub struct UniqueViolation;

impl std::fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("duplicate key value violates unique constraint \"users_email_key\"")
    }
}

impl std::error::Error for UniqueViolation {}

impl sqlx::error::DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint \"users_email_key\""
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some("users_email_key")
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_villas(villas: Vec<Villa>) -> Self {
        Self {
            villas: Mutex::new(villas),
            ..Self::default()
        }
    }

    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn insert_villa(&self, villa: Villa) {
        self.villas.lock().unwrap().push(villa);
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    fn check(&self) -> RepoResult<()> {
        if self.fail {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }

    fn check_user_write(&self) -> RepoResult<()> {
        self.check()?;
        if self.unique_conflict {
            Err(sqlx::Error::Database(Box::new(UniqueViolation)))
        } else {
            Ok(())
        }
    }
}

fn matches_filters(villa: &Villa, query: &VillaQuery) -> bool {
    if villa.status != VillaStatus::Active {
        return false;
    }
    if let Some(search) = query.search_text() {
        let needle = search.to_lowercase();
        let hit = [
            &villa.title,
            &villa.description,
            &villa.location.city,
            &villa.location.country,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    query.category.is_none_or(|c| villa.category == c)
        && query.min_price.is_none_or(|p| villa.price >= p)
        && query.max_price.is_none_or(|p| villa.price <= p)
        && query.bedrooms.is_none_or(|b| villa.features.bedrooms >= b)
        && query.guests.is_none_or(|g| villa.features.guests >= g)
}

fn sort_villas(villas: &mut [Villa], key: SortKey, order: SortOrder) {
    villas.sort_by(|a, b| {
        let ordering = match key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::Price => a.price.total_cmp(&b.price),
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Rating => a.rating.average.total_cmp(&b.rating.average),
            SortKey::Bedrooms => a.features.bedrooms.cmp(&b.features.bedrooms),
            SortKey::Guests => a.features.guests.cmp(&b.features.guests),
        }
        .then(a.id.cmp(&b.id));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn paginate<T: Clone>(items: &[T], offset: i64, limit: i64) -> Vec<T> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_villas(&self, query: &VillaQuery) -> RepoResult<(Vec<Villa>, i64)> {
        self.check()?;
        let mut matched: Vec<Villa> = self
            .villas
            .lock()
            .unwrap()
            .iter()
            .filter(|v| matches_filters(v, query))
            .cloned()
            .collect();
        let (key, order) = query.sort();
        sort_villas(&mut matched, key, order);
        let page = query.page_request();
        Ok((
            paginate(&matched, page.offset(), page.limit),
            matched.len() as i64,
        ))
    }

    async fn list_admin_villas(&self, query: &AdminVillaQuery) -> RepoResult<(Vec<Villa>, i64)> {
        self.check()?;
        let mut matched: Vec<Villa> = self
            .villas
            .lock()
            .unwrap()
            .iter()
            .filter(|v| query.status.is_none_or(|s| v.status == s))
            .filter(|v| query.category.is_none_or(|c| v.category == c))
            .cloned()
            .collect();
        sort_villas(&mut matched, SortKey::CreatedAt, SortOrder::Desc);
        let page = query.page_request();
        Ok((
            paginate(&matched, page.offset(), page.limit),
            matched.len() as i64,
        ))
    }

    async fn get_villa(&self, id: Uuid) -> RepoResult<Option<Villa>> {
        self.check()?;
        Ok(self.villas.lock().unwrap().iter().find(|v| v.id == id).cloned())
    }

    async fn create_villa(&self, villa: Villa) -> RepoResult<Villa> {
        self.check()?;
        self.villas.lock().unwrap().push(villa.clone());
        Ok(villa)
    }

    async fn update_villa(&self, villa: Villa) -> RepoResult<Option<Villa>> {
        self.check()?;
        let mut villas = self.villas.lock().unwrap();
        Ok(villas.iter_mut().find(|v| v.id == villa.id).map(|stored| {
            *stored = villa;
            stored.clone()
        }))
    }

    async fn delete_villa(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut villas = self.villas.lock().unwrap();
        let before = villas.len();
        villas.retain(|v| v.id != id);
        Ok(villas.len() < before)
    }

    async fn get_categories(&self) -> RepoResult<Vec<Category>> {
        self.check()?;
        let mut categories: Vec<Category> = Vec::new();
        for villa in self.villas.lock().unwrap().iter() {
            if !categories.contains(&villa.category) {
                categories.push(villa.category);
            }
        }
        Ok(categories)
    }

    async fn get_featured_villas(&self, limit: i64) -> RepoResult<Vec<Villa>> {
        self.check()?;
        let mut featured: Vec<Villa> = self
            .villas
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.status == VillaStatus::Active && v.rating.average >= 4.0)
            .cloned()
            .collect();
        featured.sort_by(|a, b| {
            b.rating
                .average
                .total_cmp(&a.rating.average)
                .then(b.created_at.cmp(&a.created_at))
        });
        featured.truncate(limit as usize);
        Ok(featured)
    }

    async fn get_dashboard_stats(&self) -> RepoResult<DashboardStats> {
        self.check()?;
        let mut villas = self.villas.lock().unwrap().clone();
        sort_villas(&mut villas, SortKey::CreatedAt, SortOrder::Desc);
        Ok(DashboardStats {
            total_villas: villas.len() as i64,
            active_villas: villas
                .iter()
                .filter(|v| v.status == VillaStatus::Active)
                .count() as i64,
            total_users: self.users.lock().unwrap().len() as i64,
            recent_villas: villas
                .iter()
                .take(5)
                .map(|v| RecentVilla {
                    id: v.id,
                    title: v.title.clone(),
                    status: v.status,
                    created_at: v.created_at,
                })
                .collect(),
        })
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.check()?;
        Ok(self.user(id))
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn identity_taken(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        exclude: Option<Uuid>,
    ) -> RepoResult<bool> {
        self.check()?;
        Ok(self.users.lock().unwrap().iter().any(|u| {
            Some(u.id) != exclude
                && (email == Some(u.email.as_str()) || username == Some(u.username.as_str()))
        }))
    }

    async fn create_user(&self, new_user: NewUser) -> RepoResult<User> {
        self.check_user_write()?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_active: true,
            profile: new_user.profile,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<Option<User>> {
        self.check_user_write()?;
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            if let Some(username) = req.username {
                user.username = username;
            }
            if let Some(email) = req.email {
                user.email = email;
            }
            if let Some(profile) = req.profile {
                user.profile = profile;
            }
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> RepoResult<bool> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users
            .iter_mut()
            .find(|u| u.id == id)
            .map(|user| user.password_hash = password_hash)
            .is_some())
    }

    async fn list_users(&self, query: &UserQuery) -> RepoResult<(Vec<User>, i64)> {
        self.check()?;
        let mut matched: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| query.role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let page = query.page_request();
        Ok((
            paginate(&matched, page.offset(), page.limit),
            matched.len() as i64,
        ))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> RepoResult<Option<User>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn toggle_user_active(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.is_active = !user.is_active;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}

// --- FIXTURES ---

pub const ADMIN_ID: Uuid = Uuid::from_u128(1);
pub const EDITOR_ID: Uuid = Uuid::from_u128(2);
pub const VIEWER_ID: Uuid = Uuid::from_u128(3);
pub const INACTIVE_ID: Uuid = Uuid::from_u128(4);

/// A user with an unusable password hash. Use `user_with_password` for login tests.
pub fn user(id: Uuid, username: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@villalux.com"),
        password_hash: "not-a-real-hash".to_string(),
        role,
        is_active: true,
        profile: Profile::default(),
        created_at: now,
        updated_at: now,
    }
}

pub fn user_with_password(id: Uuid, username: &str, role: Role, password: &str) -> User {
    User {
        password_hash: auth::hash_password(password).unwrap(),
        ..user(id, username, role)
    }
}

/// Repository preloaded with one admin, one editor, one viewer and one deactivated viewer.
pub fn repo_with_accounts() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.insert_user(user(ADMIN_ID, "admin", Role::Admin));
    repo.insert_user(user(EDITOR_ID, "editor", Role::Editor));
    repo.insert_user(user(VIEWER_ID, "viewer", Role::Viewer));
    repo.insert_user(User {
        is_active: false,
        ..user(INACTIVE_ID, "inactive", Role::Viewer)
    });
    repo
}

/// A valid, active villa. `age_hours` pushes `created_at` into the past so ordering is
/// deterministic.
pub fn villa(title: &str, price: f64, category: Category, rating: f64, age_hours: i64) -> Villa {
    let created = Utc::now() - Duration::hours(age_hours);
    Villa {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{title} description"),
        price,
        location: Location {
            address: "1 Test Road".to_string(),
            city: "Ubud".to_string(),
            country: "Indonesia".to_string(),
            coordinates: None,
        },
        amenities: vec!["WiFi".to_string()],
        features: Features {
            bedrooms: 2,
            bathrooms: 1,
            guests: 4,
            area: 120.0,
            ..Features::default()
        },
        images: vec![],
        availability: Default::default(),
        rating: Rating {
            average: rating,
            count: 10,
        },
        category,
        status: VillaStatus::Active,
        created_at: created,
        updated_at: created,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

pub fn test_state(repo: InMemoryRepository) -> AppState {
    test_state_with(Arc::new(repo), MockStorageService::new())
}

pub fn test_state_with(repo: Arc<InMemoryRepository>, storage: MockStorageService) -> AppState {
    AppState {
        repo,
        storage: Arc::new(storage),
        config: test_config(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        id: ADMIN_ID,
        role: Role::Admin,
    }
}

pub fn editor() -> AuthUser {
    AuthUser {
        id: EDITOR_ID,
        role: Role::Editor,
    }
}

pub fn viewer() -> AuthUser {
    AuthUser {
        id: VIEWER_ID,
        role: Role::Viewer,
    }
}

/// Bearer header value for a user known to the repository.
pub fn bearer_for(user: &User) -> String {
    format!("Bearer {}", auth::issue_token(user, &test_config()).unwrap())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
