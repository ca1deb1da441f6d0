//! HTTP API.
//!
//! ## Endpoints
//!
//! - `POST /generate-message/` - Generate a marketing message with placeholders (auth required)
//! - `POST /run-agent/` - Run the messaging API agent on an instruction
//! - `POST /api/auth/login` - Exchange the dashboard password for a JWT
//! - `GET /api/health` - Health check

mod agent;
pub mod auth;
mod error;
mod message;
mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::{router, serve, AppState};
