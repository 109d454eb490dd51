use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use deskrank::config::{LoggingSettings, Settings, StoreBackend};
use deskrank::models::NewItem;
use deskrank::routes::{self, handle_json_payload_error, handle_path_error, handle_query_payload_error, AppState};
use deskrank::services::{CacheManager, MemoryStore, PostgresStore, RatingStore, StoreError};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Settings are read first so the [logging] section can configure tracing
    let loaded = Settings::load();
    let logging = match &loaded {
        Ok(settings) => settings.logging.clone(),
        Err(_) => LoggingSettings::default(),
    }
    .with_env_overrides(std::env::var("LOG_LEVEL").ok(), std::env::var("LOG_FORMAT").ok());

    init_tracing(&logging);

    info!("Starting Deskrank ranking service...");

    let settings = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");

    let store = build_store(&settings).await.map_err(|e| {
        error!("Failed to initialize store: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    if let Err(e) = seed_showcase_items(store.as_ref(), &settings).await {
        warn!("Failed to seed showcase items: {}", e);
    }

    // Redis is optional; fall back to the in-process cache
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(30);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.cache.redis_url {
        Some(redis_url) => match CacheManager::new(redis_url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized with Redis (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::local_only(l1_cache_size, cache_ttl)
            }
        },
        None => {
            info!("Cache manager initialized (L1 only: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
            CacheManager::local_only(l1_cache_size, cache_ttl)
        }
    };

    let app_state = AppState::new(store, Arc::new(cache), &settings);

    info!(
        "Rating engine: K={}, baseline={}, own items paired: {}, deletion: {:?}",
        settings.rating.k_factor,
        settings.rating.baseline,
        settings.pairing.include_own_items,
        settings.items.deletion_policy
    );

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.is_pretty() {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

async fn build_store(settings: &Settings) -> Result<Arc<dyn RatingStore>, StoreError> {
    match settings.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; ratings are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let db = &settings.database;
            let store = PostgresStore::from_settings(
                &db.url,
                db.max_connections,
                db.min_connections,
                db.acquire_timeout_secs,
                db.idle_timeout_secs,
            )
            .await?;
            info!("PostgreSQL store initialized (max: {} connections)", db.max_connections.unwrap_or(10));
            Ok(Arc::new(store))
        }
    }
}

/// Create the configured showcase items when the store is empty
async fn seed_showcase_items(store: &dyn RatingStore, settings: &Settings) -> Result<(), StoreError> {
    if settings.seed.titles.is_empty() || store.count_items().await? > 0 {
        return Ok(());
    }

    for title in &settings.seed.titles {
        let item = store
            .create_item(
                NewItem {
                    title: Some(title.clone()),
                    owner_id: None,
                },
                settings.rating.baseline,
            )
            .await?;
        info!("Seeded showcase item {} ({})", item.id, title);
    }

    Ok(())
}
