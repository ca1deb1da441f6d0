//! Configuration management for the WotNot agent service.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `BEDROCK_MODEL_ID` - Optional. Bedrock model identifier.
//! - `AWS_REGION` / `AWS_DEFAULT_REGION` - Optional. Bedrock region. Defaults to `us-east-1`.
//! - `BEDROCK_ENDPOINT` - Optional. Overrides the regional Bedrock Runtime endpoint.
//! - `LLM_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.2`.
//! - `LLM_MAX_TOKENS` - Optional. Completion ceiling. Defaults to `1024`.
//! - `LLM_TIMEOUT_SECS` - Optional. Per-call timeout. Unset means no ceiling.
//! - `AWS_BEARER_TOKEN_BEDROCK` - Optional. Bedrock API key.
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN` - Optional. SigV4 credentials.
//! - `OPENAPI_SPEC_PATH` - Optional. Messaging API OpenAPI document. Defaults to `wotnot_openapi.json`.
//! - `MESSAGING_API_BASE_URL` - Optional. Defaults to `https://api.wotnot.io`.
//! - `MESSAGING_API_TOKEN` - Optional. Bearer token for messaging API calls.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `15`.
//! - `DEFAULT_AGENT_PROMPT` - Optional. Instruction used when `/run-agent/` gets no prompt.
//! - `DEV_MODE` - Optional. Disables auth. Defaults to `true` in debug builds.
//! - `DASHBOARD_PASSWORD` / `JWT_SECRET` / `JWT_TTL_DAYS` - Auth settings.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Instruction handed to the agent when a request does not carry one.
pub const DEFAULT_AGENT_PROMPT: &str =
    "Find content for template, create it, and send to today's contacts.";

/// Default base URL of the messaging platform API.
pub const DEFAULT_MESSAGING_API_BASE_URL: &str = "https://api.wotnot.io";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Static AWS credentials used for SigV4 signing.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Language-model backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bedrock model identifier
    pub model_id: String,

    /// Deployment region
    pub region: String,

    /// Endpoint override (defaults to the regional Bedrock Runtime host)
    pub endpoint: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Completion ceiling
    pub max_tokens: u32,

    /// Optional per-call timeout
    pub timeout: Option<Duration>,

    /// Bedrock API key, sent as a bearer token
    pub api_key: Option<String>,

    /// SigV4 credentials, used when no API key is set
    pub credentials: Option<AwsCredentials>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            temperature: 0.2,
            max_tokens: 1024,
            timeout: None,
            api_key: None,
            credentials: None,
        }
    }
}

impl LlmConfig {
    /// Base URL of the Bedrock Runtime API for this configuration.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

/// Messaging platform (toolset) configuration.
#[derive(Debug, Clone)]
pub struct MessagingApiConfig {
    /// Path to the raw OpenAPI document
    pub spec_path: PathBuf,

    /// Base URL requests are sent to
    pub base_url: String,

    /// Bearer token attached to every operation call
    pub token: Option<String>,
}

impl Default for MessagingApiConfig {
    fn default() -> Self {
        Self {
            spec_path: PathBuf::from("wotnot_openapi.json"),
            base_url: DEFAULT_MESSAGING_API_BASE_URL.to_string(),
            token: None,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Instruction used by `/run-agent/` when the body has no prompt
    pub default_agent_prompt: String,

    /// Development mode (disables auth)
    pub dev_mode: bool,

    /// API auth configuration
    pub auth: AuthConfig,

    /// Language-model backend
    pub llm: LlmConfig,

    /// Messaging API toolset
    pub messaging: MessagingApiConfig,
}

/// API auth configuration (single-tenant).
#[derive(Clone)]
pub struct AuthConfig {
    /// Password exchanged for a JWT at the login endpoint.
    pub dashboard_password: Option<String>,

    /// HMAC secret for signing/verifying JWTs.
    pub jwt_secret: Option<String>,

    /// JWT validity in days.
    pub jwt_ttl_days: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("dashboard_password", &self.dashboard_password.as_ref().map(|_| "<redacted>"))
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_ttl_days", &self.jwt_ttl_days)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dashboard_password: None,
            jwt_secret: None,
            jwt_ttl_days: 30,
        }
    }
}

impl AuthConfig {
    /// Whether auth is required for API requests.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode && self.dashboard_password.is_some() && self.jwt_secret.is_some()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numbers or booleans, and
    /// `ConfigError::MissingEnvVar` if auth secrets are missing outside dev mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_env("PORT")?.unwrap_or(8000);
        let max_iterations = parse_env("MAX_ITERATIONS")?.unwrap_or(15);

        let default_agent_prompt = non_empty_env("DEFAULT_AGENT_PROMPT")
            .unwrap_or_else(|| DEFAULT_AGENT_PROMPT.to_string());

        let dev_mode = std::env::var("DEV_MODE")
            .ok()
            .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue("DEV_MODE".to_string(), e)))
            .transpose()?
            // In debug builds, default to dev_mode=true; in release, default to false.
            .unwrap_or(cfg!(debug_assertions));

        let auth = AuthConfig {
            dashboard_password: non_empty_env("DASHBOARD_PASSWORD"),
            jwt_secret: non_empty_env("JWT_SECRET"),
            jwt_ttl_days: parse_env("JWT_TTL_DAYS")?.unwrap_or(30),
        };

        // In non-dev mode, require auth secrets to be set.
        if !dev_mode {
            if auth.dashboard_password.is_none() {
                return Err(ConfigError::MissingEnvVar("DASHBOARD_PASSWORD".to_string()));
            }
            if auth.jwt_secret.is_none() {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
            }
        }

        let defaults = LlmConfig::default();
        let credentials = match (
            non_empty_env("AWS_ACCESS_KEY_ID"),
            non_empty_env("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: non_empty_env("AWS_SESSION_TOKEN"),
            }),
            _ => None,
        };

        let llm = LlmConfig {
            model_id: non_empty_env("BEDROCK_MODEL_ID").unwrap_or(defaults.model_id),
            region: non_empty_env("AWS_REGION")
                .or_else(|| non_empty_env("AWS_DEFAULT_REGION"))
                .unwrap_or(defaults.region),
            endpoint: non_empty_env("BEDROCK_ENDPOINT"),
            temperature: parse_env("LLM_TEMPERATURE")?.unwrap_or(defaults.temperature),
            max_tokens: parse_env("LLM_MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
            timeout: parse_env::<u64>("LLM_TIMEOUT_SECS")?.map(Duration::from_secs),
            api_key: non_empty_env("AWS_BEARER_TOKEN_BEDROCK"),
            credentials,
        };

        let messaging = MessagingApiConfig {
            spec_path: non_empty_env("OPENAPI_SPEC_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("wotnot_openapi.json")),
            base_url: non_empty_env("MESSAGING_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MESSAGING_API_BASE_URL.to_string()),
            token: non_empty_env("MESSAGING_API_TOKEN"),
        };

        Ok(Self {
            host,
            port,
            max_iterations,
            default_agent_prompt,
            dev_mode,
            auth,
            llm,
            messaging,
        })
    }

    /// Create a dev-mode config with default values (useful for testing).
    pub fn new(spec_path: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_iterations: 15,
            default_agent_prompt: DEFAULT_AGENT_PROMPT.to_string(),
            dev_mode: true,
            auth: AuthConfig::default(),
            llm: LlmConfig::default(),
            messaging: MessagingApiConfig {
                spec_path,
                ..MessagingApiConfig::default()
            },
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    non_empty_env(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
