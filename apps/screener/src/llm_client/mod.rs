/// LLM Client — the single point of entry for all text-generation calls.
///
/// ARCHITECTURAL RULE: no other module may call the Groq API directly.
/// Pipeline stages depend on the `TextGenerator` trait, never on the
/// concrete client, so tests can substitute a scripted double.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

/// Fast model used by the extraction-style stages (job requirements,
/// resume parsing, compatibility scoring).
pub const EXTRACTION_MODEL: &str = "llama-3.1-8b-instant";
/// Larger model used by the audit stage for more nuanced critique.
pub const AUDIT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One generation call: a fully rendered prompt plus per-stage model settings.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub temperature: f32,
}

/// Token counts reported by the generation API for a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of a successful generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// Seam between the pipeline and the concrete generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Generation, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageBlock>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBlock {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The production client. Wraps Groq's OpenAI-compatible chat-completions
/// endpoint with retry logic for rate limits and server errors.
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
}

impl GroqClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes one chat-completion call. Retries on 429 and 5xx with
    /// exponential backoff; all other failures are returned immediately.
    async fn call(&self, request: GenerationRequest<'_>) -> Result<Generation, LlmError> {
        let request_body = ChatRequest {
            model: request.model,
            max_tokens: MAX_TOKENS,
            temperature: request.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(GROQ_API_URL)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let chat: ChatResponse = response.json().await?;

            let usage = chat
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default();

            let text = chat
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or(LlmError::EmptyContent)?;

            debug!(
                "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
                request.model, usage.input_tokens, usage.output_tokens
            );

            return Ok(Generation { text, usage });
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for GroqClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Generation, LlmError> {
        self.call(request).await
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted test double for `TextGenerator`, shared across pipeline and
    //! workflow tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    enum Reply {
        Text(String),
        Fail,
    }

    /// Returns queued replies in order and records every rendered prompt.
    pub struct ScriptedGenerator {
        replies: Mutex<VecDeque<Reply>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Reply::Text(text.to_string()));
            self
        }

        pub fn fail(self) -> Self {
            self.replies.lock().unwrap().push_back(Reply::Fail);
            self
        }

        /// All prompts received so far, in call order.
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest<'_>,
        ) -> Result<Generation, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.prompt.to_string());
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Text(text)) => Ok(Generation {
                    text,
                    usage: TokenUsage {
                        input_tokens: 10,
                        output_tokens: 5,
                    },
                }),
                Some(Reply::Fail) => Err(LlmError::Api {
                    status: 500,
                    message: "scripted failure".to_string(),
                }),
                None => Err(LlmError::Api {
                    status: 500,
                    message: "no scripted reply left".to_string(),
                }),
            }
        }
    }
}
