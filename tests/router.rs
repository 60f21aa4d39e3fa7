use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use squad_backend::{AppState, config::Config, routes, utils::error_codes};
use tower::ServiceExt;

fn config() -> Config {
    Config {
        database_url: "postgres://postgres@127.0.0.1:1/unused".into(),
        redis_url: "redis://127.0.0.1/".into(),
        jwt_secret: "access-secret".into(),
        jwt_refresh_secret: "refresh-secret".into(),
        jwt_expiration_secs: 3600,
        refresh_token_expiration_secs: 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        cors_origin: None,
        cookie_secure: false,
        profile_default_image: None,
        storage_url: None,
        storage_service_key: None,
    }
}

/// Requests in this file are rejected before any query runs, so the pool
/// never has to connect.
fn app() -> Router {
    let config = config();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    let redis = redis::Client::open(config.redis_url.clone()).expect("redis url");
    routes::router(AppState {
        pool,
        config,
        redis: Arc::new(redis),
        storage: None,
    })
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let response = app()
        .oneshot(Request::get("/api/users/profile").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], error_codes::AUTH_FAILED);
    assert!(body.get("resp_data").is_none());
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let response = app()
        .oneshot(
            Request::get("/api/statistics/team")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_validates_before_touching_the_database() {
    let response = app()
        .oneshot(
            Request::post("/api/auth/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"not-an-email","password":"secret1","name":"Kim"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let response = app()
        .oneshot(Request::post("/api/auth/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app()
        .oneshot(
            Request::post("/api/auth/refresh")
                .header(header::COOKIE, "refreshToken=garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn routes_live_under_the_base_path() {
    let response = app()
        .oneshot(Request::get("/users/profile").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
