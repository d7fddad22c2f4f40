//! The chat relay: forwards one user message to a completion provider and
//! returns the reply.
//!
//! The provider is any `text_completion::TextCompleter`; when none is
//! configured the relay answers every chat request as unavailable.

mod server;
pub use server::{router, serve};

use std::sync::Arc;
use text_completion::{CompletionError, CompletionRequest, TextCompleter};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::*;

pub const WELCOME: &str =
    "Welcome to the Simple Chatbot API. Use the /chat endpoint to start a conversation.";
pub const GREETING: &str = "Hello! What can I help you with today? 😊";
pub const AUTH_FAILURE_REPLY: &str = "Authentication failed. Please check the GROQ_API_KEY.";
pub const SERVICE_ISSUE_REPLY: &str =
    "I apologize, I'm currently experiencing a service issue. Please try again shortly.";

const SYSTEM_PROMPT: &str = "You are a friendly, concise, and highly intelligent \
    conversational assistant. You can answer questions, summarize topics, assist with \
    coding, and engage in general conversation. Keep your responses engaging and easy \
    to understand.";
const MAX_TOKENS: u32 = 2048;
const TEMPERATURE: f32 = 0.8;

#[derive(Error, Debug, PartialEq)]
pub enum RelayError {
    #[error("Chatbot service is unavailable. The GROQ_API_KEY may be missing or invalid.")]
    Unavailable,
    #[error("An internal server error occurred while generating the reply. 😔")]
    Internal(String),
}

pub struct ChatRelay {
    completer: Option<Arc<dyn TextCompleter + Send + Sync>>,
}

impl ChatRelay {
    pub fn new(completer: Arc<dyn TextCompleter + Send + Sync>) -> Self {
        ChatRelay {
            completer: Some(completer),
        }
    }

    /// A relay with no provider configured.
    pub fn unavailable() -> Self {
        ChatRelay { completer: None }
    }

    pub fn is_available(&self) -> bool {
        self.completer.is_some()
    }

    pub async fn process_message(&self, message: &str) -> Result<String, RelayError> {
        let completer = self.completer.as_ref().ok_or(RelayError::Unavailable)?;

        let prompt = message.trim();
        if prompt.is_empty() {
            return Ok(GREETING.to_string());
        }

        let (tx, rx) = oneshot::channel();
        completer.complete(
            CompletionRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                prompt: prompt.to_string(),
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
            },
            tx,
        );

        match rx.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) if e.is_provider_failure() => {
                warn!("Completion provider error: {}", e);
                Ok(soft_reply(&e).to_string())
            }
            Ok(Err(e)) => Err(RelayError::Internal(e.to_string())),
            Err(_) => Err(RelayError::Internal(
                "completion task ended without a result".to_string(),
            )),
        }
    }
}

//Provider failures stay HTTP 200, the failure is only in the text.
fn soft_reply(e: &CompletionError) -> &'static str {
    match e {
        CompletionError::Authentication(_) => AUTH_FAILURE_REPLY,
        _ => SERVICE_ISSUE_REPLY,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use text_completion::{CompletionRequest, CompletionResult, TextCompleter};
    use tokio::sync::oneshot::Sender;

    /// Answers every request with the same result and records what it was asked.
    pub struct FakeCompleter {
        pub result: Option<CompletionResult>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeCompleter {
        pub fn answering(result: CompletionResult) -> Self {
            FakeCompleter {
                result: Some(result),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Drops the result channel without answering.
        pub fn silent() -> Self {
            FakeCompleter {
                result: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl TextCompleter for FakeCompleter {
        fn complete(&self, request: CompletionRequest, result: Sender<CompletionResult>) {
            self.requests.lock().unwrap().push(request);
            if let Some(r) = &self.result {
                let _ = result.send(r.clone());
            }
        }
    }
}
