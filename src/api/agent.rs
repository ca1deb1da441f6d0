//! POST /run-agent/ - hand an instruction to the messaging API agent.

use std::sync::Arc;

use axum::{extract::State, Json};
use bytes::Bytes;
use serde_json::Value;

use super::error::ApiError;
use super::routes::AppState;
use super::types::AgentResponse;

/// Pick the instruction out of an arbitrary body, falling back to `default`.
///
/// Empty bodies, non-object bodies and objects without a string `prompt` all
/// use the default; only malformed JSON is rejected.
pub fn extract_prompt(body: &[u8], default: &str) -> Result<String, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(default.to_string());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    Ok(value
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string()))
}

pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AgentResponse>, ApiError> {
    let prompt = extract_prompt(&body, &state.config.default_agent_prompt)?;

    tracing::info!(prompt_chars = prompt.len(), "Running agent");

    let response = state.agent.run(&prompt).await.map_err(|e| {
        tracing::error!(error = %e, "Agent run failed");
        ApiError::Internal(format!("An error occurred while running the agent: {:#}", e))
    })?;

    Ok(Json(AgentResponse { response }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = "default instruction";

    #[test]
    fn test_extract_prompt_defaults() {
        assert_eq!(extract_prompt(b"", DEFAULT).unwrap(), DEFAULT);
        assert_eq!(extract_prompt(b"  \n", DEFAULT).unwrap(), DEFAULT);
        assert_eq!(extract_prompt(b"{}", DEFAULT).unwrap(), DEFAULT);
        assert_eq!(extract_prompt(b"[1,2]", DEFAULT).unwrap(), DEFAULT);
        assert_eq!(extract_prompt(br#"{"prompt": 5}"#, DEFAULT).unwrap(), DEFAULT);
    }

    #[test]
    fn test_extract_prompt_uses_given_prompt() {
        assert_eq!(
            extract_prompt(br#"{"prompt": "send the sale template"}"#, DEFAULT).unwrap(),
            "send the sale template"
        );
    }

    #[test]
    fn test_extract_prompt_rejects_malformed_json() {
        let err = extract_prompt(b"{not json", DEFAULT).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
