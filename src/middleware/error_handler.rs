use axum::{
    body::{Body, to_bytes},
    http::{Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::error;

const MAX_LOGGED_BODY: usize = 1024;

/// Logs status and body of every 5xx response on its way out.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!("{} {} failed with {}, body unreadable: {}", method, uri, parts.status, e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        "{} {} failed with {}: {}",
        method,
        uri,
        parts.status,
        String::from_utf8_lossy(&bytes)
    );

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
