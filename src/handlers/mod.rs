//! HTTP handlers. Each one validates its input, resolves the caller and makes a
//! single call into the repository.

use axum::Json;

use crate::models::MessageResponse;

pub mod blogs;
pub mod users;

/// hello
///
/// [Public Route] Liveness probe under the API prefix.
#[utoipa::path(
    get,
    path = "/api/",
    responses((status = 200, description = "Greeting", body = MessageResponse))
)]
pub async fn hello() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello World!"))
}
