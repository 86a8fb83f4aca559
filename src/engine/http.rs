use crate::config::Settings;
use crate::error::{AppError, AppResult, Service};
use reqwest::{Client, Response};
use std::time::Duration;

/// Build the HTTP client shared by one remote service.
pub(crate) fn build_client(settings: &Settings, service: Service) -> AppResult<Client> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .timeout(settings.request_timeout)
        .build()
        .map_err(|e| AppError::from_reqwest(service, e))
}

/// Pull a human-readable message out of an error body.
///
/// Services put it under different keys; fall back to the raw text, then the status.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "msg"] {
            match v.get(key) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                    return s.trim().to_string()
                }
                Some(serde_json::Value::Object(inner)) => {
                    if let Some(s) = inner.get("message").and_then(|m| m.as_str()) {
                        return s.trim().to_string();
                    }
                }
                _ => {}
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        format!("request failed with status {status}")
    } else {
        body.chars().take(300).collect()
    }
}

/// Return the response if successful, otherwise its status and extracted message.
pub(crate) async fn check(
    service: Service,
    resp: Response,
) -> AppResult<Result<Response, (reqwest::StatusCode, String)>> {
    let status = resp.status();
    if status.is_success() {
        return Ok(Ok(resp));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| AppError::from_reqwest(service, e))?;
    Ok(Err((status, error_message(status, &body))))
}
