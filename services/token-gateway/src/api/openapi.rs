//! OpenAPI schema aggregation for the gateway API.
use crate::api::system;
use crate::api::types::{
    ChatTokenRequest, ChatTokenResponse, ErrorResponse, HealthStatus, SystemInfo,
};
use crate::auth::issue;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "token-gateway",
        version = "v1",
        description = "Issues Ensemble chat tokens for verified users"
    ),
    paths(system::system_info, system::system_health, issue::issue_chat_token),
    components(schemas(
        ChatTokenRequest,
        ChatTokenResponse,
        ErrorResponse,
        SystemInfo,
        HealthStatus
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "auth", description = "Chat token issuance")
    )
)]
pub struct ApiDoc;
