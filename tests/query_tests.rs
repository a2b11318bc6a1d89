use villa_catalog::{
    models::{Category, VillaStatus},
    query::{
        self, AdminVillaQuery, PageRequest, SortKey, SortOrder, VillaQuery,
        DEFAULT_ADMIN_PAGE_SIZE, DEFAULT_VILLA_PAGE_SIZE,
    },
};

// --- Paging ---

#[test]
fn test_page_request_defaults_and_clamping() {
    assert_eq!(
        PageRequest::new(None, None, DEFAULT_VILLA_PAGE_SIZE),
        PageRequest { page: 1, limit: 12 }
    );
    assert_eq!(PageRequest::new(Some(-3), Some(0), 12), PageRequest { page: 1, limit: 1 });
    assert_eq!(PageRequest::new(Some(2), Some(500), 12).limit, 100);
    assert_eq!(PageRequest::new(Some(3), Some(12), 12).offset(), 24);
    assert_eq!(
        AdminVillaQuery::default().page_request().limit,
        DEFAULT_ADMIN_PAGE_SIZE
    );
}

#[test]
fn test_huge_page_saturates_offset() {
    let page = PageRequest::new(Some(i64::MAX), Some(12), 12);
    assert_eq!(page.page, i64::MAX);
    assert_eq!(page.offset(), i64::MAX);

    // Building the listing must not overflow either.
    let query = VillaQuery {
        page: Some(i64::MAX),
        ..VillaQuery::default()
    };
    let builder = query::villa_list_query(&query);
    assert!(builder.sql().contains("OFFSET"));
}

// --- Sorting ---

#[test]
fn test_sort_key_whitelist() {
    assert_eq!(SortKey::parse(None), SortKey::CreatedAt);
    assert_eq!(SortKey::parse(Some("price")), SortKey::Price);
    assert_eq!(SortKey::parse(Some("rating.average")), SortKey::Rating);
    assert_eq!(SortKey::parse(Some("features.bedrooms")), SortKey::Bedrooms);
    assert_eq!(SortKey::parse(Some("price; DROP TABLE villas")), SortKey::CreatedAt);
    assert_eq!(SortKey::Rating.column(), "rating_average");
}

#[test]
fn test_sort_order_parsing() {
    assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
    assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
    assert_eq!(SortOrder::parse(Some("DESC")), SortOrder::Asc);
    assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Asc);
}

// --- SQL construction ---

#[test]
fn test_default_listing_sql() {
    let query = VillaQuery::default();
    let builder = query::villa_list_query(&query);
    let sql = builder.sql();

    assert!(sql.contains("FROM villas WHERE status = $1"));
    assert!(!sql.contains("ILIKE"));
    assert!(sql.contains("ORDER BY created_at DESC, id DESC"));
    assert!(sql.trim_end().ends_with("LIMIT $2 OFFSET $3"));
}

#[test]
fn test_full_filter_sql_uses_bind_parameters() {
    let query = VillaQuery {
        search: Some("bali' OR 1=1 --".to_string()),
        category: Some(Category::Beachfront),
        min_price: Some(100.0),
        max_price: Some(500.0),
        bedrooms: Some(2),
        guests: Some(4),
        sort_by: Some("price".to_string()),
        sort_order: Some("asc".to_string()),
        ..VillaQuery::default()
    };
    let builder = query::villa_list_query(&query);
    let sql = builder.sql();

    assert!(!sql.contains("bali"));
    assert!(sql.contains(
        "(title ILIKE $2 OR description ILIKE $3 OR city ILIKE $4 OR country ILIKE $5)"
    ));
    assert!(sql.contains("AND category = $6"));
    assert!(sql.contains("AND price >= $7"));
    assert!(sql.contains("AND price <= $8"));
    assert!(sql.contains("AND bedrooms >= $9"));
    assert!(sql.contains("AND guests >= $10"));
    assert!(sql.contains("ORDER BY price ASC, id ASC"));
    assert!(sql.contains("LIMIT $11 OFFSET $12"));
}

#[test]
fn test_blank_search_is_ignored() {
    let query = VillaQuery {
        search: Some("   ".to_string()),
        ..VillaQuery::default()
    };
    assert_eq!(query.search_text(), None);
    assert!(!query::villa_count_query(&query).sql().contains("ILIKE"));
}

#[test]
fn test_count_matches_list_filters() {
    let query = VillaQuery {
        category: Some(Category::City),
        guests: Some(2),
        ..VillaQuery::default()
    };
    let count = query::villa_count_query(&query);
    let count_sql = count.sql();

    assert!(count_sql.starts_with("SELECT COUNT(*) FROM villas WHERE status = $1"));
    assert!(count_sql.contains("AND category = $2 AND guests >= $3"));
    assert!(!count_sql.contains("LIMIT"));
}

#[test]
fn test_admin_listing_sql() {
    let all = AdminVillaQuery::default();
    let builder = query::admin_villa_list_query(&all);
    assert!(builder.sql().contains("WHERE TRUE ORDER BY created_at DESC"));

    let filtered = AdminVillaQuery {
        status: Some(VillaStatus::Maintenance),
        category: Some(Category::Rural),
        ..AdminVillaQuery::default()
    };
    let count = query::admin_villa_count_query(&filtered);
    assert!(count.sql().contains("AND status = $1 AND category = $2"));
}
