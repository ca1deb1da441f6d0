//! POST /generate-message/ - placeholder-bearing marketing messages.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::{MessageGenerationRequest, MessageGenerationResponse};

pub async fn generate_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<MessageGenerationRequest>, JsonRejection>,
) -> Result<Json<MessageGenerationResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if req.user_prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("user_prompt must not be empty".to_string()));
    }

    tracing::info!(user = %user.username, "Generating message");

    let generated_message = state
        .generator
        .generate(&req.user_prompt)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Message generation failed");
            ApiError::Internal(format!(
                "An error occurred while generating the message: {:#}",
                e
            ))
        })?;

    Ok(Json(MessageGenerationResponse { generated_message }))
}
