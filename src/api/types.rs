//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to generate a marketing message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageGenerationRequest {
    /// Free-text description of the message wanted
    pub user_prompt: String,
}

/// Generated message, with `{placeholder}` fields left for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageGenerationResponse {
    pub generated_message: String,
}

/// Final text produced by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Credentials exchanged for a JWT.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub password: String,

    /// Optional principal name recorded in the token (defaults to `admin`)
    #[serde(default)]
    pub username: Option<String>,
}

/// Issued JWT and its expiry (Unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub exp: i64,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
