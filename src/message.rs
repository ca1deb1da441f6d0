//! Marketing message generation.
//!
//! A fixed instruction template is filled with the caller's request and sent
//! to the model as a single user turn. The model is told to leave every
//! personalizable detail as a `{placeholder}` for the caller to fill in later.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::llm::{ChatMessage, LlmClient};

/// Instruction template. `{user_prompt}` is the only substitution point; the
/// other brace tokens are literal examples for the model.
pub const MESSAGE_TEMPLATE: &str = r#"You are an expert marketing copywriter. Your task is to generate a message based on the user's request.
The message you generate MUST include placeholders for any specific details that need to be personalized later, such as names, dates, or offers.
Use the format {placeholder_name} for all placeholders. The placeholders should be logical and self-explanatory.

Example Request: "A diwali wish for my customers"
Example Output: "Hello {customer_name}, wishing you a bright and joyous Diwali! To celebrate, we're offering you {offer_details}."

Now, please generate a message based on the following user request.

User Request: {user_prompt}
Generated Message:"#;

const USER_PROMPT_SLOT: &str = "{user_prompt}";

/// Fill the template with the caller's request.
pub fn render_message_prompt(user_prompt: &str) -> String {
    MESSAGE_TEMPLATE.replacen(USER_PROMPT_SLOT, user_prompt, 1)
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid"))
}

/// Distinct `{name}` placeholders in order of first appearance.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Produces placeholder-bearing marketing messages.
pub struct MessageGenerator {
    llm: Arc<dyn LlmClient>,
}

impl MessageGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Generate a message for `user_prompt`, trimmed of surrounding whitespace.
    pub async fn generate(&self, user_prompt: &str) -> anyhow::Result<String> {
        let prompt = render_message_prompt(user_prompt);
        let response = self
            .llm
            .chat_completion(&[ChatMessage::user(prompt)], None)
            .await?;

        let message = response.content.unwrap_or_default().trim().to_string();
        let placeholders = extract_placeholders(&message);
        tracing::debug!(
            model = %self.llm.model(),
            chars = message.len(),
            placeholders = ?placeholders,
            "Generated message"
        );
        if placeholders.is_empty() {
            tracing::warn!("Generated message contains no placeholders");
        }

        Ok(message)
    }
}
