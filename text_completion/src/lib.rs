//! An interface for handling text completion requests
//!
//! This crate provides a `TextCompleter` trait that the chat relay talks to,
//! and the error taxonomy every provider maps its failures into.

use thiserror::Error;
use tokio::sync::oneshot::Sender;

/// One stateless completion: a system instruction plus a single user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },
    /// The provider answered, but not with something we can read a reply from.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Failures reported by the provider itself, as opposed to a reply we could not decode.
    pub fn is_provider_failure(&self) -> bool {
        !matches!(self, CompletionError::MalformedResponse(_))
    }
}

pub type CompletionResult = Result<String, CompletionError>;

pub trait TextCompleter {
    //The relay must not be linked to a specific provider crate,
    //so the provider is injected behind this trait.

    //The answer goes through the channel instead of a returned future
    //to keep the trait usable as `dyn TextCompleter`.
    fn complete(&self, request: CompletionRequest, result: Sender<CompletionResult>);
}
