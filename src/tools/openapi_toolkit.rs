//! Tools generated from an OpenAPI document: one tool per operation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use url::Url;

use super::{Tool, ToolRegistry};
use crate::openapi::{OpenApiSpec, Operation, ParameterLocation};

/// Maximum response characters handed back to the model.
const MAX_RESPONSE_CHARS: usize = 20_000;

/// Builds a [`ToolRegistry`] exposing every operation of an API.
pub struct OpenApiToolkit {
    tools: Vec<Arc<OperationTool>>,
}

impl OpenApiToolkit {
    /// Create a toolkit for `spec`, sending requests to its base URL.
    ///
    /// `token`, when set, is sent as a bearer token with every call.
    pub fn from_spec(spec: &OpenApiSpec, token: Option<String>) -> anyhow::Result<Self> {
        let base_url = spec
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OpenAPI spec has no server URL"))?;
        // Validate once so per-call URL building only fails on bad arguments.
        Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid API base URL {}: {}", base_url, e))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("wotnot-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let tools = spec
            .operations()
            .into_iter()
            .map(|operation| {
                Arc::new(OperationTool::new(
                    operation,
                    base_url.trim_end_matches('/').to_string(),
                    token.clone(),
                    http.clone(),
                ))
            })
            .collect();

        Ok(Self { tools })
    }

    pub fn get_tools(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in &self.tools {
            registry.register(tool.clone());
        }
        registry
    }
}

/// A single API operation exposed as a tool.
pub struct OperationTool {
    operation: Operation,
    description: String,
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl OperationTool {
    fn new(
        operation: Operation,
        base_url: String,
        token: Option<String>,
        http: reqwest::Client,
    ) -> Self {
        let route = format!("{} {}", operation.method, operation.path);
        let description = match (&operation.summary, &operation.description) {
            (Some(summary), _) => format!("{} ({})", summary, route),
            (None, Some(description)) => format!("{} ({})", description, route),
            (None, None) => route,
        };
        Self {
            operation,
            description,
            base_url,
            token,
            http,
        }
    }

    /// Resolve path template and query arguments into a full URL.
    fn build_url(&self, args: &Value) -> anyhow::Result<Url> {
        let mut path = self.operation.path.clone();
        let path_args = args.get("path_params");

        for param in self
            .operation
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Path)
        {
            let placeholder = format!("{{{}}}", param.name);
            match path_args.and_then(|a| a.get(&param.name)).and_then(scalar_to_string) {
                Some(value) => {
                    path = path.replace(&placeholder, &urlencoding::encode(&value));
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "Missing required path parameter '{}' for {}",
                        param.name,
                        self.operation.name
                    ));
                }
            }
        }

        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;

        if let Some(query) = args.get("query").and_then(Value::as_object) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            if let Some(v) = scalar_to_string(item) {
                                pairs.append_pair(key, &v);
                            }
                        }
                    }
                    other => {
                        if let Some(v) = scalar_to_string(other) {
                            pairs.append_pair(key, &v);
                        }
                    }
                }
            }
        }

        // Avoid a dangling `?` when no query pairs were added.
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url)
    }

    fn group_schema(&self, location: ParameterLocation) -> Option<(Value, bool)> {
        let params: Vec<_> = self
            .operation
            .parameters
            .iter()
            .filter(|p| p.location == location)
            .collect();
        if params.is_empty() {
            return None;
        }

        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &params {
            let mut schema = param.schema.clone();
            if let (Some(description), Some(obj)) = (&param.description, schema.as_object_mut()) {
                obj.entry("description")
                    .or_insert_with(|| Value::String(description.clone()));
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        let any_required = !required.is_empty();
        Some((
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            any_required,
        ))
    }
}

#[async_trait]
impl Tool for OperationTool {
    fn name(&self) -> &str {
        &self.operation.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for location in [
            ParameterLocation::Path,
            ParameterLocation::Query,
            ParameterLocation::Header,
        ] {
            if let Some((schema, any_required)) = self.group_schema(location) {
                properties.insert(location.arg_key().to_string(), schema);
                if any_required {
                    required.push(Value::String(location.arg_key().to_string()));
                }
            }
        }

        if let Some(body) = &self.operation.request_body {
            properties.insert("body".to_string(), body.clone());
            if self.operation.body_required {
                required.push(Value::String("body".to_string()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let url = self.build_url(&args)?;
        let method = reqwest::Method::from_bytes(self.operation.method.as_bytes())?;

        tracing::info!(
            tool = %self.operation.name,
            method = %method,
            url = %url,
            "Calling messaging API"
        );

        let mut request = self
            .http
            .request(method, url)
            .header("accept", "application/json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        if let Some(headers) = args.get("headers").and_then(Value::as_object) {
            for param in self
                .operation
                .parameters
                .iter()
                .filter(|p| p.location == ParameterLocation::Header)
            {
                if let Some(value) = headers.get(&param.name).and_then(scalar_to_string) {
                    request = request.header(param.name.as_str(), value);
                }
            }
        }

        if self.operation.request_body.is_some() {
            match args.get("body") {
                Some(body) if !body.is_null() => request = request.json(body),
                _ if self.operation.body_required => {
                    return Err(anyhow::anyhow!(
                        "Missing required request body for {}",
                        self.operation.name
                    ));
                }
                _ => {}
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let body = truncate_chars(&body, MAX_RESPONSE_CHARS);

        if !status.is_success() {
            tracing::warn!(tool = %self.operation.name, status = %status, "Messaging API returned an error");
            return Ok(format!("HTTP {}: {}", status, body));
        }

        if body.trim().is_empty() {
            Ok(format!("HTTP {} (empty response)", status))
        } else {
            Ok(body)
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!(
            "{}... [content truncated, showing first {} chars]",
            &s[..idx],
            max_chars
        ),
        None => s.to_string(),
    }
}
