use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

use super::middleware::USER_HEADER;

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let user = request
        .headers()
        .get(USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|user| !user.is_empty())
        .unwrap_or("anonymous")
        .to_string();

    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        user = %user,
        "HTTP request"
    );

    response
}
