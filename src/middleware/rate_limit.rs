use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// Fixed-window request counter per client IP, kept in Redis.
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    /// Bumps the counter for `ip` and returns the new count.
    async fn hit(&self, ip: &str) -> redis::RedisResult<u32> {
        let key = format!("rate_limit:{}", ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let count: u32 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn
                .expire(&key, self.config.rate_limit_window().as_secs() as i64)
                .await?;
        }
        Ok(count)
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        let ip = client_ip(req.headers(), remote_ip.as_deref());

        match self.hit(&ip).await {
            Ok(count) if count > self.config.rate_limit_requests => {
                tracing::warn!("rate limit exceeded for {}", ip);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "too many requests, retry in {} seconds",
                            self.config.rate_limit_window().as_secs()
                        ),
                    ),
                )
                    .into_response()
            }
            Ok(_) => next.run(req).await,
            Err(e) => {
                // limiter unavailable; serve the request anyway
                tracing::warn!("rate limiter unavailable: {}", e);
                next.run(req).await
            }
        }
    }
}

/// Proxy headers first, then the peer address.
fn client_ip(headers: &HeaderMap, remote_ip: Option<&str>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip)
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_real_ip_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, Some("127.0.0.1")), "10.0.0.1");
    }

    #[test]
    fn takes_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.2"));
        assert_eq!(client_ip(&headers, None), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some("127.0.0.1")), "127.0.0.1");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
