//! A client for Groq's OpenAI-compatible chat completion API.
//!
//! `GroqHandler` implements `text_completion::TextCompleter`, so the chat relay
//! can use it without knowing which provider answers.

mod models;
pub use models::ChatMessage;
mod run_completion;
pub use run_completion::run_completion;

use text_completion::{CompletionRequest, CompletionResult, TextCompleter};
use tokio::sync::oneshot::Sender;

pub const API_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Clone)]
pub struct GroqHandler {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    //created once, reused for every request
    client: reqwest::Client,
}

impl GroqHandler {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        GroqHandler {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl TextCompleter for GroqHandler {
    fn complete(&self, request: CompletionRequest, result: Sender<CompletionResult>) {
        let handler = self.clone();
        tokio::spawn(async move {
            let r = run_completion(&handler, request).await;
            let _ = result.send(r);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use text_completion::CompletionError;

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    //A local stand-in for the provider, answering every completion with `status` and `body`.
    async fn spawn_provider(status: u16, body: Value) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let app = Router::new().route(
            "/chat/completions",
            post(move |headers: HeaderMap, Json(req): Json<Value>| {
                let recorded = recorded.clone();
                let body = body.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    recorded.lock().unwrap().push((auth, req));
                    (StatusCode::from_u16(status).unwrap(), Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    //Answers every completion with 200 and a body that is not JSON.
    async fn spawn_raw_provider(body: &'static str) -> String {
        let app = Router::new().route(
            "/chat/completions",
            post(move || async move { (StatusCode::OK, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "Be brief.".to_string(),
            prompt: prompt.to_string(),
            max_tokens: 2048,
            temperature: 0.8,
        }
    }

    async fn complete(handler: &GroqHandler, prompt: &str) -> CompletionResult {
        let (tx, rx) = tokio::sync::oneshot::channel();
        handler.complete(request(prompt), tx);
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_complete_success() {
        let (base_url, seen) = spawn_provider(
            200,
            json!({"choices": [{"message": {"role": "assistant", "content": "Hello from Groq"}}]}),
        )
        .await;
        let handler = GroqHandler::new("gsk_test", &format!("{}/", base_url));

        let reply = complete(&handler, "hi").await;
        assert_eq!(reply, Ok("Hello from Groq".to_string()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer gsk_test"));
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be brief.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!((body["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_complete_authentication_failure() {
        let (base_url, _) =
            spawn_provider(401, json!({"error": {"message": "Invalid API Key"}})).await;
        let handler = GroqHandler::new("bad", &base_url);

        assert_eq!(
            complete(&handler, "hi").await,
            Err(CompletionError::Authentication("Invalid API Key".into()))
        );
    }

    #[tokio::test]
    async fn test_complete_rate_limited() {
        let (base_url, _) = spawn_provider(429, json!({"error": {"message": "Rate limit"}})).await;
        let handler = GroqHandler::new("gsk_test", &base_url);

        assert_eq!(
            complete(&handler, "hi").await,
            Err(CompletionError::RateLimited("Rate limit".into()))
        );
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        let (base_url, _) =
            spawn_provider(503, json!({"error": {"message": "over capacity"}})).await;
        let handler = GroqHandler::new("gsk_test", &base_url);

        assert_eq!(
            complete(&handler, "hi").await,
            Err(CompletionError::Api {
                status: 503,
                message: "over capacity".into()
            })
        );
    }

    #[tokio::test]
    async fn test_complete_success_status_with_html_body() {
        let base_url = spawn_raw_provider("<html>Bad Gateway</html>").await;
        let handler = GroqHandler::new("gsk_test", &base_url);

        assert!(matches!(
            complete(&handler, "hi").await,
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_success_status_without_choices() {
        let (base_url, _) = spawn_provider(200, json!({"object": "chat.completion"})).await;
        let handler = GroqHandler::new("gsk_test", &base_url);

        assert!(matches!(
            complete(&handler, "hi").await,
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let handler = GroqHandler::new("gsk_test", &format!("http://{}", addr));

        assert!(matches!(
            complete(&handler, "hi").await,
            Err(CompletionError::Connection(_))
        ));
    }
}
