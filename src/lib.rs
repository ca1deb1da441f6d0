//! # WotNot Agent
//!
//! A thin HTTP service in front of a Bedrock-hosted language model.
//!
//! This library provides:
//! - A message generator that fills a fixed marketing-copy template and asks
//!   the model for a message with `{placeholder}` fields
//! - An agent whose tools are the operations of the WotNot messaging API,
//!   derived from its OpenAPI document
//! - An HTTP API exposing both, with JWT bearer authentication
//!
//! ## Architecture
//!
//! The model client, toolset and agent are built once at startup and shared
//! by every request through `api::AppState`. The agent follows the
//! "tools in a loop" pattern:
//! 1. Receive an instruction via the API
//! 2. Build context with system prompt and available operations
//! 3. Call the LLM, execute any requested API calls
//! 4. Feed results back to the LLM, repeat until it answers
//!
//! ## Example
//!
//! ```rust,ignore
//! use wotnot_agent::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod message;
pub mod openapi;
pub mod tools;

pub use config::Config;
