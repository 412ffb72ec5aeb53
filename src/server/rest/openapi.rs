use utoipa::OpenApi;

use crate::server::rest::{
    error::{ErrorDetails, ErrorResponse},
    handlers::shells::ListShellsQuery,
};
use crate::shared::models::{
    AgentUserGroup, CommandConfig, CommandParams, Environment, Resources, SessionState,
    SessionSummary, UserFile,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::server::rest::openapi::health,
        crate::server::rest::openapi::list_shells,
        crate::server::rest::openapi::create_shell,
    ),
    components(
        schemas(
            AgentUserGroup,
            CommandConfig,
            CommandParams,
            Environment,
            Resources,
            SessionState,
            SessionSummary,
            UserFile,
            ErrorResponse,
            ErrorDetails,
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Shells", description = "Interactive shell sessions"),
    ),
    info(
        title = "shellmgr API",
        version = "0.1.0",
        description = "Launches SSH-accessible shell sessions and reports their state",
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
)]
#[allow(dead_code)]
pub async fn health() {}

#[utoipa::path(
    get,
    path = "/shells",
    tag = "Shells",
    params(
        ("X-User" = String, Header, description = "Requesting user"),
        ListShellsQuery,
    ),
    responses(
        (status = 200, description = "Shell sessions", body = Vec<SessionSummary>),
        (status = 401, description = "Missing user", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn list_shells() {}

#[utoipa::path(
    post,
    path = "/shells",
    tag = "Shells",
    params(
        ("X-User" = String, Header, description = "Requesting user"),
    ),
    request_body = CommandParams,
    responses(
        (status = 200, description = "Shell launched", body = SessionSummary),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing user", body = ErrorResponse),
        (status = 500, description = "Shell could not be launched", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn create_shell() {}
