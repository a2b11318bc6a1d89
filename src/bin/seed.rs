use serde_json::json;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use villa_catalog::{
    auth,
    models::{CreateVillaRequest, NewUser, Profile, Role},
    repository::{PostgresRepository, Repository},
};

/// Sample catalog inserted into an empty database.
fn sample_villas() -> serde_json::Value {
    json!([
        {
            "title": "Luxury Beachfront Villa",
            "description": "Beachfront villa with panoramic ocean views, a private pool and direct beach access.",
            "price": 450.0,
            "location": { "address": "123 Beach Road", "city": "Bali", "country": "Indonesia",
                          "coordinates": { "lat": -8.3405, "lng": 115.0920 } },
            "features": { "bedrooms": 4, "bathrooms": 3, "guests": 8, "area": 350,
                          "pool": true, "wifi": true, "parking": true, "kitchen": true },
            "amenities": ["Private Pool", "Beach Access", "WiFi", "Parking", "Kitchen", "Air Conditioning"],
            "images": [
                { "url": "https://images.unsplash.com/photo-1582268611958-ebfd161ef9cf?w=800", "isMain": true, "caption": "Main Villa View" },
                { "url": "https://images.unsplash.com/photo-1571896349842-33c89424de2d?w=800", "isMain": false, "caption": "Pool Area" }
            ],
            "category": "Beachfront",
            "rating": { "average": 4.8, "count": 24 }
        },
        {
            "title": "Mountain Retreat Villa",
            "description": "Quiet mountain villa surrounded by forest, for guests who want views and calm.",
            "price": 320.0,
            "location": { "address": "456 Mountain View Drive", "city": "Ubud", "country": "Indonesia",
                          "coordinates": { "lat": -8.5069, "lng": 115.2625 } },
            "features": { "bedrooms": 3, "bathrooms": 2, "guests": 6, "area": 280,
                          "pool": false, "wifi": true, "parking": true, "kitchen": true },
            "amenities": ["Mountain Views", "WiFi", "Parking", "Kitchen", "Garden"],
            "images": [
                { "url": "https://images.unsplash.com/photo-1512917774080-9991f1c4c750?w=800", "isMain": true, "caption": "Mountain Villa" }
            ],
            "category": "Mountain",
            "rating": { "average": 4.6, "count": 18 }
        },
        {
            "title": "Modern City Villa",
            "description": "Contemporary villa in the city centre, close to shopping, dining and nightlife.",
            "price": 280.0,
            "location": { "address": "789 City Center", "city": "Jakarta", "country": "Indonesia",
                          "coordinates": { "lat": -6.2088, "lng": 106.8456 } },
            "features": { "bedrooms": 2, "bathrooms": 2, "guests": 4, "area": 200,
                          "pool": true, "wifi": true, "parking": true, "kitchen": true },
            "amenities": ["City Views", "WiFi", "Parking", "Kitchen", "Gym Access"],
            "images": [
                { "url": "https://images.unsplash.com/photo-1600596542815-ffad4c1539a9?w=800", "isMain": true, "caption": "Modern Villa Interior" }
            ],
            "category": "City",
            "rating": { "average": 4.4, "count": 15 }
        },
        {
            "title": "Tropical Garden Villa",
            "description": "Villa set in tropical gardens with a private pool and an outdoor dining area.",
            "price": 380.0,
            "location": { "address": "321 Garden Lane", "city": "Seminyak", "country": "Indonesia",
                          "coordinates": { "lat": -8.6833, "lng": 115.1667 } },
            "features": { "bedrooms": 3, "bathrooms": 2, "guests": 6, "area": 300,
                          "pool": true, "wifi": true, "parking": true, "kitchen": true },
            "amenities": ["Tropical Gardens", "Private Pool", "WiFi", "Parking", "Kitchen", "Outdoor Dining"],
            "images": [
                { "url": "https://images.unsplash.com/photo-1600607687939-ce8a6c25118c?w=800", "isMain": true, "caption": "Garden Villa" }
            ],
            "category": "Rural",
            "rating": { "average": 4.7, "count": 22 }
        },
        {
            "title": "Luxury Cliff Villa",
            "description": "Cliff-top villa with ocean views and an infinity pool.",
            "price": 650.0,
            "location": { "address": "654 Cliff Road", "city": "Uluwatu", "country": "Indonesia",
                          "coordinates": { "lat": -8.8167, "lng": 115.1000 } },
            "features": { "bedrooms": 5, "bathrooms": 4, "guests": 10, "area": 450,
                          "pool": true, "wifi": true, "parking": true, "kitchen": true },
            "amenities": ["Cliff Views", "Infinity Pool", "WiFi", "Parking", "Kitchen", "Butler Service"],
            "images": [
                { "url": "https://images.unsplash.com/photo-1600607687644-c7171b42498b?w=800", "isMain": true, "caption": "Cliff Villa" }
            ],
            "category": "Luxury",
            "rating": { "average": 4.9, "count": 31 }
        },
        {
            "title": "Traditional Balinese Villa",
            "description": "Balinese villa with traditional architecture and hand-carved details.",
            "price": 290.0,
            "location": { "address": "987 Traditional Street", "city": "Gianyar", "country": "Indonesia",
                          "coordinates": { "lat": -8.5417, "lng": 115.3250 } },
            "features": { "bedrooms": 2, "bathrooms": 2, "guests": 4, "area": 250,
                          "pool": true, "wifi": true, "parking": true, "kitchen": true },
            "amenities": ["Traditional Architecture", "Garden", "WiFi", "Parking", "Kitchen"],
            "images": [
                { "url": "https://images.unsplash.com/photo-1600607687920-4e2a09cf159d?w=800", "isMain": true, "caption": "Traditional Villa" }
            ],
            "category": "Family",
            "rating": { "average": 4.5, "count": 19 }
        }
    ])
}

struct SeedAccount {
    username: &'static str,
    email: &'static str,
    password: String,
    role: Role,
    first_name: &'static str,
}

/// seed
///
/// Idempotent bootstrap for a fresh database: sample villas when the catalog is empty,
/// plus an admin and an editor account when they do not exist yet.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed=info,villa_catalog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_url = env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = PostgresRepository::new(pool);

    // --- Villas ---
    let stats = repo
        .get_dashboard_stats()
        .await
        .expect("FATAL: Failed to count villas");

    if stats.total_villas == 0 {
        let villas: Vec<CreateVillaRequest> =
            serde_json::from_value(sample_villas()).expect("sample villas must deserialize");

        for request in villas {
            let villa = request.into_villa();
            let title = villa.title.clone();
            repo.create_villa(villa)
                .await
                .unwrap_or_else(|e| panic!("FATAL: Failed to insert '{title}': {e}"));
            tracing::info!("Created villa: {}", title);
        }
    } else {
        tracing::info!(
            "Catalog already has {} villas, skipping sample data",
            stats.total_villas
        );
    }

    // --- Accounts ---
    let accounts = [
        SeedAccount {
            username: "admin",
            email: "admin@villalux.com",
            password: env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
            role: Role::Admin,
            first_name: "Admin",
        },
        SeedAccount {
            username: "editor",
            email: "editor@villalux.com",
            password: env::var("SEED_EDITOR_PASSWORD")
                .unwrap_or_else(|_| "editor123".to_string()),
            role: Role::Editor,
            first_name: "Editor",
        },
    ];

    for account in accounts {
        let exists = repo
            .identity_taken(Some(account.email), Some(account.username), None)
            .await
            .expect("FATAL: Failed to look up users");
        if exists {
            tracing::info!("User {} already exists, skipping", account.email);
            continue;
        }

        let password_hash =
            auth::hash_password(&account.password).expect("FATAL: Failed to hash password");

        let user = repo
            .create_user(NewUser {
                username: account.username.to_string(),
                email: account.email.to_string(),
                password_hash,
                role: account.role,
                profile: Profile {
                    first_name: Some(account.first_name.to_string()),
                    last_name: Some("User".to_string()),
                    phone: None,
                },
            })
            .await
            .expect("FATAL: Failed to create user");

        tracing::info!("Created {} account: {} ({})", user.role, user.username, user.email);
    }

    tracing::info!("Seeding complete");
}
