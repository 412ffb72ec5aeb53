use axum::{
    body::Bytes,
    extract::{Extension, Query, State},
    http::Method,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::operator::{ApiCall, ApiMethod, ApiReply};
use crate::server::rest::error::{ApiError, ApiResult};
use crate::server::rest::middleware::AuthContext;
use crate::shared::models::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListShellsQuery {
    /// Only list shells owned by this user.
    pub user: Option<String>,
}

/// Single entry point for `/shells`. Method dispatch happens inside the
/// session manager so reads and launches are serialized with each other.
pub async fn shells(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    method: Method,
    Query(query): Query<ListShellsQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    let method_name = method.to_string();
    let method = match method {
        Method::GET => ApiMethod::Read,
        Method::POST => ApiMethod::Create,
        other => ApiMethod::Other(other.to_string()),
    };

    let reply = state
        .manager
        .handle_api(ApiCall {
            method,
            user: auth.user,
            user_filter: query.user,
            body: body.to_vec(),
        })
        .await?;

    match reply {
        ApiReply::Sessions(sessions) => Ok(Json(sessions).into_response()),
        ApiReply::Launched(summary) => Ok(Json(summary).into_response()),
        ApiReply::Rejected(err) => Err(err.into()),
        ApiReply::MethodNotAllowed => Err(ApiError::MethodNotAllowed(method_name)),
    }
}
