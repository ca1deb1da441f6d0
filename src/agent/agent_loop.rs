//! Core agent loop implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient, Role, StopReason, ToolCall};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;
use super::AgentRunner;

/// The messaging API agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    system_prompt: String,
    max_iterations: usize,
}

impl Agent {
    /// Create a new agent over the given model and toolset.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        api_base_url: &str,
        max_iterations: usize,
    ) -> Self {
        let system_prompt = build_system_prompt(api_base_url, &tools);
        Self {
            llm,
            tools,
            system_prompt,
            max_iterations,
        }
    }

    /// Execute a single tool call.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> anyhow::Result<String> {
        let args: serde_json::Value = serde_json::from_str(&tool_call.function.arguments)
            .unwrap_or(serde_json::Value::Null);

        self.tools.execute(&tool_call.function.name, args).await
    }
}

#[async_trait]
impl AgentRunner for Agent {
    async fn run(&self, instruction: &str) -> anyhow::Result<String> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(instruction),
        ];

        // Get tool schemas for LLM
        let tool_schemas = self.tools.get_tool_schemas();

        for iteration in 0..self.max_iterations {
            tracing::debug!(iteration = iteration + 1, model = %self.llm.model(), "Agent iteration");

            let response = self
                .llm
                .chat_completion(&messages, Some(tool_schemas.as_slice()))
                .await?;

            match &response.stop_reason {
                Some(StopReason::MaxTokens) => {
                    tracing::warn!(iteration = iteration + 1, "Model reply cut off at max_tokens")
                }
                Some(StopReason::GuardrailIntervened | StopReason::ContentFiltered) => {
                    tracing::warn!(stop_reason = ?response.stop_reason, "Model reply was filtered")
                }
                _ => {}
            }

            if let Some(tool_calls) = response.tool_calls.filter(|c| !c.is_empty()) {
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                    tool_call_id: None,
                });

                for tool_call in &tool_calls {
                    tracing::info!(
                        tool = %tool_call.function.name,
                        args = %truncate_for_log(&tool_call.function.arguments, 500),
                        "Calling tool"
                    );

                    let result_str = match self.execute_tool_call(tool_call).await {
                        Ok(output) => output,
                        Err(e) => format!("Error: {}", e),
                    };

                    tracing::debug!(
                        tool = %tool_call.function.name,
                        result = %truncate_for_log(&result_str, 1000),
                        "Tool finished"
                    );

                    messages.push(ChatMessage {
                        role: Role::Tool,
                        content: Some(result_str),
                        tool_calls: None,
                        tool_call_id: Some(tool_call.id.clone()),
                    });
                }

                continue;
            }

            // No tool calls - this is the final response
            return match response.content.filter(|c| !c.trim().is_empty()) {
                Some(content) => Ok(content),
                None => Err(anyhow::anyhow!("LLM returned empty response")),
            };
        }

        Err(anyhow::anyhow!(
            "Max iterations ({}) reached without completion",
            self.max_iterations
        ))
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}... [truncated]", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, ToolSchema};
    use crate::tools::Tool;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every conversation it receives.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct ListContacts;

    #[async_trait]
    impl Tool for ListContacts {
        fn name(&self) -> &str {
            "listContacts"
        }

        fn description(&self) -> &str {
            "List contacts"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _args: Value) -> anyhow::Result<String> {
            Ok(r#"[{"name":"Asha"}]"#.to_string())
        }
    }

    fn tool_call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse {
            content: Some(content.to_string()),
            ..ChatResponse::default()
        }
    }

    fn agent(llm: Arc<ScriptedLlm>, max_iterations: usize) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ListContacts));
        Agent::new(llm, tools, "https://api.wotnot.io", max_iterations)
    }

    #[tokio::test]
    async fn test_returns_text_when_no_tools_requested() {
        let llm = Arc::new(ScriptedLlm::new(vec![text("Nothing to do.")]));
        let out = agent(llm.clone(), 5).run("hello").await.unwrap();
        assert_eq!(out, "Nothing to do.");

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0][0].role, Role::System);
        assert!(seen[0][0].content.as_deref().unwrap().contains("listContacts"));
        assert_eq!(seen[0][1].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_feeds_tool_results_back_to_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ChatResponse {
                content: None,
                tool_calls: Some(vec![
                    tool_call("c1", "listContacts"),
                    tool_call("c2", "deleteEverything"),
                ]),
                stop_reason: Some(StopReason::ToolUse),
            },
            text("Sent to Asha."),
        ]));
        let out = agent(llm.clone(), 5).run("send").await.unwrap();
        assert_eq!(out, "Sent to Asha.");

        let seen = llm.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second.len(), 5);
        assert_eq!(second[2].role, Role::Assistant);
        assert_eq!(second[3].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(second[3].content.as_deref(), Some(r#"[{"name":"Asha"}]"#));
        assert!(second[4]
            .content
            .as_deref()
            .unwrap()
            .starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn test_stops_after_max_iterations() {
        let looping = (0..3)
            .map(|i| ChatResponse {
                content: None,
                tool_calls: Some(vec![tool_call(&format!("c{}", i), "listContacts")]),
                stop_reason: None,
            })
            .collect();
        let llm = Arc::new(ScriptedLlm::new(looping));
        let err = agent(llm, 2).run("loop").await.unwrap_err();
        assert!(err.to_string().contains("Max iterations (2)"));
    }

    #[tokio::test]
    async fn test_truncated_reply_is_still_returned() {
        let llm = Arc::new(ScriptedLlm::new(vec![ChatResponse {
            content: Some("Partial answer".to_string()),
            tool_calls: None,
            stop_reason: Some(StopReason::MaxTokens),
        }]));
        let out = agent(llm, 2).run("x").await.unwrap();
        assert_eq!(out, "Partial answer");
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![text("   ")]));
        let err = agent(llm, 2).run("x").await.unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn test_llm_errors_propagate() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let err = agent(llm, 2).run("x").await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("abc", 5), "abc");
        assert_eq!(truncate_for_log("abcdef", 3), "abc... [truncated]");
    }
}
