//! Agent module - the tool-using agent behind `/run-agent/`.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user instruction
//! 2. Call LLM with the messaging API tools
//! 3. If LLM requests tool calls, execute them and feed results back
//! 4. Repeat until LLM produces final response or max iterations reached

mod agent_loop;
mod prompt;

use async_trait::async_trait;

pub use agent_loop::Agent;
pub use prompt::build_system_prompt;

/// Anything that turns a natural-language instruction into a final answer.
///
/// Request handlers only depend on this, so the agent can be swapped out.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, instruction: &str) -> anyhow::Result<String>;
}
