use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use utoipa::IntoParams;

use crate::models::{Category, Role, VillaStatus};

/// Columns every villa query selects. Kept in one place so the listing, detail and
/// write paths all decode into the same row type.
pub const VILLA_COLUMNS: &str = r#"
    id, title, description, price,
    address, city, country, lat, lng,
    amenities,
    bedrooms, bathrooms, guests, area, pool, wifi, parking, kitchen,
    images,
    is_available, check_in, check_out,
    rating_average, rating_count,
    category, status, created_at, updated_at
"#;

pub const DEFAULT_VILLA_PAGE_SIZE: i64 = 12;
pub const DEFAULT_ADMIN_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// --- Paging ---

/// PageRequest
///
/// A normalized page/limit pair. Page numbers are 1-based; out-of-range input is
/// clamped instead of rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates instead of overflowing; an absurd page simply lands past the last row.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

// --- Sorting ---

/// SortKey
///
/// The whitelist of sortable villa fields. Query strings name fields the way the
/// frontend does (`createdAt`, `rating.average`); each maps to exactly one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Price,
    Title,
    Rating,
    Bedrooms,
    Guests,
}

impl SortKey {
    /// Unknown names fall back to `createdAt`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("updatedAt") => SortKey::UpdatedAt,
            Some("price") => SortKey::Price,
            Some("title") => SortKey::Title,
            Some("rating") | Some("rating.average") => SortKey::Rating,
            Some("bedrooms") | Some("features.bedrooms") => SortKey::Bedrooms,
            Some("guests") | Some("features.guests") => SortKey::Guests,
            _ => SortKey::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
            SortKey::Price => "price",
            SortKey::Title => "title",
            SortKey::Rating => "rating_average",
            SortKey::Bedrooms => "bedrooms",
            SortKey::Guests => "guests",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Only the literal `desc` sorts descending; any other supplied value sorts ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => SortOrder::Desc,
            Some(value) if value.trim() == "desc" => SortOrder::Desc,
            Some(_) => SortOrder::Asc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

// --- Query Parameter Structs ---

/// VillaQuery
///
/// Query parameters for the public listing endpoint (GET /api/villas). Every filter is
/// optional; present ones are AND-ed together on top of the `status = 'active'` base.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VillaQuery {
    /// 1-based page number (default 1).
    pub page: Option<i64>,
    /// Page size (default 12, max 100).
    pub limit: Option<i64>,
    /// Case-insensitive match against title, description, city and country.
    pub search: Option<String>,
    pub category: Option<Category>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Minimum number of bedrooms.
    pub bedrooms: Option<i32>,
    /// Minimum guest capacity.
    pub guests: Option<i32>,
    /// createdAt | updatedAt | price | title | rating | bedrooms | guests
    pub sort_by: Option<String>,
    /// `desc` (default) or anything else for ascending.
    pub sort_order: Option<String>,
}

impl VillaQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_VILLA_PAGE_SIZE)
    }

    pub fn sort(&self) -> (SortKey, SortOrder) {
        (
            SortKey::parse(self.sort_by.as_deref()),
            SortOrder::parse(self.sort_order.as_deref()),
        )
    }

    /// The trimmed search text, or `None` when absent or blank.
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// AdminVillaQuery
///
/// Query parameters for the staff listing (GET /api/admin/villas). Unlike the public
/// listing this does not hide non-active villas.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminVillaQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<VillaStatus>,
    pub category: Option<Category>,
}

impl AdminVillaQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_ADMIN_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<Role>,
}

impl UserQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_ADMIN_PAGE_SIZE)
    }
}

// --- SQL Construction ---

/// push_villa_filters
///
/// Appends the WHERE clause for a public listing. Values are always bound parameters;
/// the SQL text itself only ever contains fixed column names.
fn push_villa_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &VillaQuery) {
    builder.push(" WHERE status = ");
    builder.push_bind(VillaStatus::Active);

    if let Some(search) = query.search_text() {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR city ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR country ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(category) = query.category {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }

    if let Some(min_price) = query.min_price {
        builder.push(" AND price >= ");
        builder.push_bind(min_price);
    }

    if let Some(max_price) = query.max_price {
        builder.push(" AND price <= ");
        builder.push_bind(max_price);
    }

    if let Some(bedrooms) = query.bedrooms {
        builder.push(" AND bedrooms >= ");
        builder.push_bind(bedrooms);
    }

    if let Some(guests) = query.guests {
        builder.push(" AND guests >= ");
        builder.push_bind(guests);
    }
}

/// Escapes LIKE wildcards so user input is matched literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// villa_list_query
///
/// SELECT for one page of the public listing: filters, whitelisted ORDER BY (with the id
/// as a tie-breaker so pages never overlap), LIMIT and OFFSET.
pub fn villa_list_query(query: &VillaQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {VILLA_COLUMNS} FROM villas"));
    push_villa_filters(&mut builder, query);

    let (key, order) = query.sort();
    builder.push(format!(
        " ORDER BY {} {}, id {}",
        key.column(),
        order.keyword(),
        order.keyword()
    ));

    let page = query.page_request();
    builder.push(" LIMIT ");
    builder.push_bind(page.limit);
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
    builder
}

/// villa_count_query
///
/// COUNT(*) over exactly the same filters as `villa_list_query`.
pub fn villa_count_query(query: &VillaQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM villas");
    push_villa_filters(&mut builder, query);
    builder
}

fn push_admin_villa_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &AdminVillaQuery) {
    builder.push(" WHERE TRUE");
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(category) = query.category {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }
}

pub fn admin_villa_list_query(query: &AdminVillaQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {VILLA_COLUMNS} FROM villas"));
    push_admin_villa_filters(&mut builder, query);
    builder.push(" ORDER BY created_at DESC, id DESC");

    let page = query.page_request();
    builder.push(" LIMIT ");
    builder.push_bind(page.limit);
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
    builder
}

pub fn admin_villa_count_query(query: &AdminVillaQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM villas");
    push_admin_villa_filters(&mut builder, query);
    builder
}
