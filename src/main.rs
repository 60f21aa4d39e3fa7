use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use squad_backend::{
    AppState,
    config::Config,
    middleware::{RateLimiter, rate_limit},
    routes,
    storage::ObjectStorage,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cors_layer(config: &Config) -> CorsLayer {
    if cfg!(debug_assertions) {
        tracing::debug!("using permissive CORS for development");
        return CorsLayer::permissive();
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);
    match config
        .cors_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => {
            tracing::warn!("CORS_ORIGIN not set; cross-origin requests will be refused");
            layer
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("failed to load configuration");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'squad_backend';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let redis = Arc::new(redis::Client::open(config.redis_url.clone()).expect("invalid REDIS_URL"));

    let storage = ObjectStorage::from_config(&config);
    if storage.is_none() {
        tracing::warn!("STORAGE_URL or STORAGE_SERVICE_KEY missing; image uploads are disabled");
    }

    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis.clone(),
        storage,
    };
    let rate_limiter = Arc::new(RateLimiter::new(redis, config.clone()));

    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(cors_layer(&config))
            .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit)),
    );

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("invalid SERVER_HOST, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
