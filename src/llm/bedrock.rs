//! AWS Bedrock Runtime client (Converse API).

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::{
    sign_request, ChatMessage, ChatResponse, FunctionCall, LlmClient, Role, SigningParams,
    StopReason, ToolCall, ToolSchema,
};
use crate::config::LlmConfig;

/// Bedrock-hosted model reached through `POST /model/{id}/converse`.
pub struct BedrockClient {
    http: reqwest::Client,
    config: LlmConfig,
    endpoint: String,
}

impl BedrockClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let endpoint = config.endpoint_url();
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    fn converse_url(&self) -> anyhow::Result<Url> {
        let url = format!(
            "{}/model/{}/converse",
            self.endpoint,
            urlencoding::encode(&self.config.model_id)
        );
        Ok(Url::parse(&url)?)
    }
}

#[async_trait]
impl LlmClient for BedrockClient {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let url = self.converse_url()?;
        let body = build_converse_body(
            messages,
            tools,
            self.config.temperature,
            self.config.max_tokens,
        )?;
        let payload = serde_json::to_vec(&body)?;

        let mut request = self
            .http
            .post(url.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json");

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        } else if let Some(credentials) = &self.config.credentials {
            let params = SigningParams {
                credentials,
                region: &self.config.region,
                service: "bedrock",
                time: chrono::Utc::now(),
            };
            let signed = sign_request(
                "POST",
                &url,
                &[("content-type", "application/json")],
                &payload,
                &params,
            );
            for (name, value) in signed {
                request = request.header(name, value);
            }
        } else {
            tracing::warn!("No Bedrock credentials configured; sending unsigned request");
        }

        tracing::debug!(
            model = %self.config.model_id,
            messages = messages.len(),
            tools = tools.map_or(0, |t| t.len()),
            "Calling Bedrock converse"
        );

        let response = request.body(payload).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("Message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(text);
            return Err(anyhow::anyhow!("Bedrock returned {}: {}", status, message));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Invalid Bedrock response: {}", e))?;
        parse_converse_response(&value)
    }

    fn model(&self) -> &str {
        &self.config.model_id
    }
}

/// Build a Converse request body.
///
/// Consecutive turns that map to the same Bedrock role are merged, since the
/// API requires user and assistant turns to alternate.
pub(crate) fn build_converse_body(
    messages: &[ChatMessage],
    tools: Option<&[ToolSchema]>,
    temperature: f32,
    max_tokens: u32,
) -> anyhow::Result<Value> {
    let mut system = Vec::new();
    let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for message in messages {
        let (role, blocks) = match message.role {
            Role::System => {
                if let Some(text) = message.content.as_deref().filter(|t| !t.is_empty()) {
                    system.push(json!({ "text": text }));
                }
                continue;
            }
            Role::User => ("user", text_blocks(message)),
            Role::Assistant => {
                let mut blocks = text_blocks(message);
                for call in message.tool_calls.iter().flatten() {
                    let input: Value = serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| json!({}));
                    blocks.push(json!({
                        "toolUse": {
                            "toolUseId": call.id,
                            "name": call.function.name,
                            "input": input,
                        }
                    }));
                }
                ("assistant", blocks)
            }
            Role::Tool => {
                let id = message
                    .tool_call_id
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("Tool result message without tool_call_id"))?;
                let text = message
                    .content
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or("(empty)");
                let status = if text.starts_with("Error:") { "error" } else { "success" };
                (
                    "user",
                    vec![json!({
                        "toolResult": {
                            "toolUseId": id,
                            "content": [{ "text": text }],
                            "status": status,
                        }
                    })],
                )
            }
        };

        if blocks.is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some((last_role, content)) if *last_role == role => content.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }

    let turns: Vec<Value> = turns
        .into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect();

    let mut body = json!({
        "messages": turns,
        "inferenceConfig": {
            "temperature": temperature,
            "maxTokens": max_tokens,
        },
    });

    if !system.is_empty() {
        body["system"] = Value::Array(system);
    }

    if let Some(tools) = tools.filter(|t| !t.is_empty()) {
        let specs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.parameters },
                    }
                })
            })
            .collect();
        body["toolConfig"] = json!({ "tools": specs });
    }

    Ok(body)
}

fn text_blocks(message: &ChatMessage) -> Vec<Value> {
    match message.content.as_deref() {
        Some(text) if !text.trim().is_empty() => vec![json!({ "text": text })],
        _ => Vec::new(),
    }
}

/// Normalize a Converse response into a [`ChatResponse`].
pub(crate) fn parse_converse_response(value: &Value) -> anyhow::Result<ChatResponse> {
    let content = value
        .pointer("/output/message/content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Bedrock response has no output message"))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content {
        if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
            text.push_str(t);
        } else if let Some(tool_use) = block.get("toolUse") {
            let id = tool_use
                .get("toolUseId")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let name = tool_use
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("toolUse block without a name"))?;
            let input = tool_use.get("input").cloned().unwrap_or_else(|| json!({}));
            tool_calls.push(ToolCall {
                id,
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: input.to_string(),
                },
            });
        }
    }

    Ok(ChatResponse {
        content: (!text.is_empty()).then_some(text),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        stop_reason: value
            .get("stopReason")
            .and_then(|v| v.as_str())
            .map(StopReason::from_bedrock),
    })
}
