use reqwest::StatusCode;
use serde_json::{json, Value};
use text_completion::{CompletionError, CompletionRequest, CompletionResult};
use tracing::*;

use crate::{ChatMessage, GroqHandler};

pub async fn run_completion(handler: &GroqHandler, req: CompletionRequest) -> CompletionResult {
    trace!("run_completion prompt={}", req.prompt);

    let url = format!("{}/chat/completions", handler.base_url);
    let response = handler
        .client
        .post(&url)
        .bearer_auth(&handler.api_key)
        .json(&json!({
            "model": handler.model,
            "messages": [
                ChatMessage::system(&req.system_prompt),
                ChatMessage::user(&req.prompt),
            ],
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        }))
        .send()
        .await
        .map_err(|e| CompletionError::Connection(e.to_string()))?;

    trace!("POST {} {:?}", url, response);

    let status = response.status();
    if !status.is_success() {
        let err_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(classify_failure(status, &err_text));
    }

    let data: Value = response
        .json()
        .await
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
    trace!("POST {} {:?}", url, data);

    let reply = extract_reply(&data)?;

    debug!("run_completion prompt={} result={}", req.prompt, reply);
    Ok(reply)
}

/// Maps a non-success status to the provider error taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> CompletionError {
    let message = provider_message(body);
    match status {
        StatusCode::UNAUTHORIZED => CompletionError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited(message),
        _ => CompletionError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

//OpenAI-compatible providers wrap failures as {"error": {"message": ...}}
fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

pub(crate) fn extract_reply(data: &Value) -> CompletionResult {
    data.get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|array| array.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(String::from)
        .ok_or_else(|| {
            CompletionError::MalformedResponse(format!("No message content found in {}", data))
        })
}
