use crate::models::{
    Availability, Category, Coordinates, DashboardStats, Features, Location, NewUser, Profile,
    Rating, RecentVilla, Role, UpdateProfileRequest, User, Villa, VillaImage, VillaStatus,
};
use crate::query::{self, AdminVillaQuery, PageRequest, UserQuery, VillaQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, PgPool, Postgres, QueryBuilder,
    postgres::PgArguments,
    query::QueryAs,
    types::Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// RepoResult
///
/// Every persistence call surfaces the driver error; handlers turn it into a 500.
pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers can be
/// exercised against an in-memory implementation in tests.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Villa Catalog ---
    /// Public listing. Only `active` villas; returns the page and the total match count.
    async fn list_villas(&self, query: &VillaQuery) -> RepoResult<(Vec<Villa>, i64)>;
    /// Staff listing, any status.
    async fn list_admin_villas(&self, query: &AdminVillaQuery) -> RepoResult<(Vec<Villa>, i64)>;
    async fn get_villa(&self, id: Uuid) -> RepoResult<Option<Villa>>;
    async fn create_villa(&self, villa: Villa) -> RepoResult<Villa>;
    /// Full overwrite of the stored record; `None` when the id no longer exists.
    async fn update_villa(&self, villa: Villa) -> RepoResult<Option<Villa>>;
    async fn delete_villa(&self, id: Uuid) -> RepoResult<bool>;
    async fn get_categories(&self) -> RepoResult<Vec<Category>>;
    /// Active villas rated 4 or higher, best rated first.
    async fn get_featured_villas(&self, limit: i64) -> RepoResult<Vec<Villa>>;
    async fn get_dashboard_stats(&self) -> RepoResult<DashboardStats>;

    // --- Accounts ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// True when another account (other than `exclude`) already uses the email or username.
    async fn identity_taken(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        exclude: Option<Uuid>,
    ) -> RepoResult<bool>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<Option<User>>;
    async fn set_password(&self, id: Uuid, password_hash: String) -> RepoResult<bool>;
    async fn list_users(&self, query: &UserQuery) -> RepoResult<(Vec<User>, i64)>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> RepoResult<Option<User>>;
    async fn toggle_user_active(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row Types ---

/// VillaRow
///
/// Flat mirror of the `villas` table. Nested API objects are spread over plain columns
/// (images live in a JSONB column) and reassembled in `From<VillaRow> for Villa`.
#[derive(Debug, FromRow)]
struct VillaRow {
    id: Uuid,
    title: String,
    description: String,
    price: f64,
    address: String,
    city: String,
    country: String,
    lat: Option<f64>,
    lng: Option<f64>,
    amenities: Vec<String>,
    bedrooms: i32,
    bathrooms: i32,
    guests: i32,
    area: f64,
    pool: bool,
    wifi: bool,
    parking: bool,
    kitchen: bool,
    images: Json<Vec<VillaImage>>,
    is_available: bool,
    check_in: String,
    check_out: String,
    rating_average: f64,
    rating_count: i32,
    category: Category,
    status: VillaStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VillaRow> for Villa {
    fn from(row: VillaRow) -> Self {
        let coordinates = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        };
        Villa {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            location: Location {
                address: row.address,
                city: row.city,
                country: row.country,
                coordinates,
            },
            amenities: row.amenities,
            features: Features {
                bedrooms: row.bedrooms,
                bathrooms: row.bathrooms,
                guests: row.guests,
                area: row.area,
                pool: row.pool,
                wifi: row.wifi,
                parking: row.parking,
                kitchen: row.kitchen,
            },
            images: row.images.0,
            availability: Availability {
                is_available: row.is_available,
                check_in: row.check_in,
                check_out: row.check_out,
            },
            rating: Rating {
                average: row.rating_average,
                count: row.rating_count,
            },
            category: row.category,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: Role,
    is_active: bool,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role,
            is_active: row.is_active,
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash, role, is_active,
    first_name, last_name, phone, created_at, updated_at
"#;

type VillaQueryAs<'q> = QueryAs<'q, Postgres, VillaRow, PgArguments>;

/// bind_villa_fields
///
/// Binds every writable villa column in `$2..=$26` order (title through status). The id
/// is always `$1` and is bound by the caller.
fn bind_villa_fields(query: VillaQueryAs<'_>, villa: Villa) -> VillaQueryAs<'_> {
    let (lat, lng) = match villa.location.coordinates {
        Some(Coordinates { lat, lng }) => (Some(lat), Some(lng)),
        None => (None, None),
    };
    query
        .bind(villa.title)
        .bind(villa.description)
        .bind(villa.price)
        .bind(villa.location.address)
        .bind(villa.location.city)
        .bind(villa.location.country)
        .bind(lat)
        .bind(lng)
        .bind(villa.amenities)
        .bind(villa.features.bedrooms)
        .bind(villa.features.bathrooms)
        .bind(villa.features.guests)
        .bind(villa.features.area)
        .bind(villa.features.pool)
        .bind(villa.features.wifi)
        .bind(villa.features.parking)
        .bind(villa.features.kitchen)
        .bind(Json(villa.images))
        .bind(villa.availability.is_available)
        .bind(villa.availability.check_in)
        .bind(villa.availability.check_out)
        .bind(villa.rating.average)
        .bind(villa.rating.count)
        .bind(villa.category)
        .bind(villa.status)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_villa_page(
        &self,
        mut list: QueryBuilder<'_, Postgres>,
        mut count: QueryBuilder<'_, Postgres>,
    ) -> RepoResult<(Vec<Villa>, i64)> {
        let rows = list
            .build_query_as::<VillaRow>()
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok((rows.into_iter().map(Villa::from).collect(), total))
    }

    async fn count(&self, sql: &str) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_villas
    ///
    /// Runs the filtered page query and a COUNT over identical filters, both built by
    /// `query::villa_list_query` / `query::villa_count_query`.
    async fn list_villas(&self, query: &VillaQuery) -> RepoResult<(Vec<Villa>, i64)> {
        self.fetch_villa_page(query::villa_list_query(query), query::villa_count_query(query))
            .await
            .inspect_err(|e| tracing::error!("list_villas error: {:?}", e))
    }

    async fn list_admin_villas(&self, query: &AdminVillaQuery) -> RepoResult<(Vec<Villa>, i64)> {
        self.fetch_villa_page(
            query::admin_villa_list_query(query),
            query::admin_villa_count_query(query),
        )
        .await
        .inspect_err(|e| tracing::error!("list_admin_villas error: {:?}", e))
    }

    async fn get_villa(&self, id: Uuid) -> RepoResult<Option<Villa>> {
        let sql = format!("SELECT {} FROM villas WHERE id = $1", query::VILLA_COLUMNS);
        let row = sqlx::query_as::<_, VillaRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Villa::from))
    }

    /// create_villa
    ///
    /// Inserts a fully-formed record (id and timestamps are assigned by the caller) and
    /// returns it as stored.
    async fn create_villa(&self, villa: Villa) -> RepoResult<Villa> {
        let sql = format!(
            r#"
            INSERT INTO villas (
                id, title, description, price,
                address, city, country, lat, lng,
                amenities,
                bedrooms, bathrooms, guests, area, pool, wifi, parking, kitchen,
                images,
                is_available, check_in, check_out,
                rating_average, rating_count,
                category, status, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28
            )
            RETURNING {}
            "#,
            query::VILLA_COLUMNS
        );
        let (id, created_at, updated_at) = (villa.id, villa.created_at, villa.updated_at);
        let row = bind_villa_fields(sqlx::query_as::<_, VillaRow>(&sql).bind(id), villa)
            .bind(created_at)
            .bind(updated_at)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("create_villa error: {:?}", e))?;
        Ok(row.into())
    }

    /// update_villa
    ///
    /// Overwrites every writable column and bumps `updated_at`. The caller merges the
    /// partial update and validates the result beforehand.
    async fn update_villa(&self, villa: Villa) -> RepoResult<Option<Villa>> {
        let sql = format!(
            r#"
            UPDATE villas SET
                title = $2, description = $3, price = $4,
                address = $5, city = $6, country = $7, lat = $8, lng = $9,
                amenities = $10,
                bedrooms = $11, bathrooms = $12, guests = $13, area = $14,
                pool = $15, wifi = $16, parking = $17, kitchen = $18,
                images = $19,
                is_available = $20, check_in = $21, check_out = $22,
                rating_average = $23, rating_count = $24,
                category = $25, status = $26,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            query::VILLA_COLUMNS
        );
        let id = villa.id;
        let row = bind_villa_fields(sqlx::query_as::<_, VillaRow>(&sql).bind(id), villa)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("update_villa error: {:?}", e))?;
        Ok(row.map(Villa::from))
    }

    async fn delete_villa(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM villas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// get_categories
    ///
    /// Distinct categories currently in use (not the full enum), in enum order.
    async fn get_categories(&self) -> RepoResult<Vec<Category>> {
        sqlx::query_scalar::<_, Category>(
            "SELECT DISTINCT category FROM villas ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_featured_villas(&self, limit: i64) -> RepoResult<Vec<Villa>> {
        let sql = format!(
            r#"
            SELECT {} FROM villas
            WHERE status = 'active' AND rating_average >= 4
            ORDER BY rating_average DESC, created_at DESC
            LIMIT $1
            "#,
            query::VILLA_COLUMNS
        );
        let rows = sqlx::query_as::<_, VillaRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Villa::from).collect())
    }

    /// get_dashboard_stats
    ///
    /// Compiles all counters for the staff dashboard plus the five newest villas.
    async fn get_dashboard_stats(&self) -> RepoResult<DashboardStats> {
        let total_villas = self.count("SELECT COUNT(*) FROM villas").await?;
        let active_villas = self
            .count("SELECT COUNT(*) FROM villas WHERE status = 'active'")
            .await?;
        let total_users = self.count("SELECT COUNT(*) FROM users").await?;
        let recent_villas = sqlx::query_as::<_, RecentVilla>(
            "SELECT id, title, status, created_at FROM villas ORDER BY created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(DashboardStats {
            total_villas,
            active_villas,
            total_users,
            recent_villas,
        })
    }

    // --- ACCOUNTS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn identity_taken(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        exclude: Option<Uuid>,
    ) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE (email = $1 OR username = $2)
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_active,
                               first_name, last_name, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, true, $6, $7, $8, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.role)
            .bind(user.profile.first_name)
            .bind(user.profile.last_name)
            .bind(user.profile.phone)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("create_user error: {:?}", e))?;
        Ok(row.into())
    }

    /// update_profile
    ///
    /// COALESCE keeps columns whose request field is `None`. A present `profile` object
    /// replaces all three profile columns together.
    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<Option<User>> {
        let replace_profile = req.profile.is_some();
        let profile = req.profile.unwrap_or_default();
        let sql = format!(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = CASE WHEN $4 THEN $5 ELSE first_name END,
                last_name = CASE WHEN $4 THEN $6 ELSE last_name END,
                phone = CASE WHEN $4 THEN $7 ELSE phone END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(req.username)
            .bind(req.email)
            .bind(replace_profile)
            .bind(profile.first_name)
            .bind(profile.last_name)
            .bind(profile.phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, query: &UserQuery) -> RepoResult<(Vec<User>, i64)> {
        let page: PageRequest = query.page_request();

        let mut list: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
        if let Some(role) = query.role {
            list.push(" WHERE role = ");
            list.push_bind(role);
            count.push(" WHERE role = ");
            count.push_bind(role);
        }
        list.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        list.push_bind(page.limit);
        list.push(" OFFSET ");
        list.push_bind(page.offset());

        let rows = list
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn toggle_user_active(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
