use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use crate::shared::models::{AppState, User};

/// Header naming the user on whose behalf a request is made.
pub const USER_HEADER: &str = "x-user";

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

pub async fn user_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let username = request
        .headers()
        .get(USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    let user = state.user(username);
    debug!(
        user = %user.username,
        configured = user.agent_user_group.is_some(),
        "Resolved request user"
    );
    request.extensions_mut().insert(AuthContext { user });

    Ok(next.run(request).await)
}
