use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::agent::{AgentInfo, AgentPersona};
use crate::models::message::{Role, ToolCall};
use crate::models::settings::Settings;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";
const ENV_BASE_URL: &str = "ASSISTANT_DECK_BASE_URL";

/// Body of both chat endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// JSON reply of the non-streaming chat endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatResponse {
    /// The assistant text: `response` wins over `message`, first non-empty.
    pub fn text(&self) -> Option<&str> {
        [self.response.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

/// HTTP client for the assistant backend. One method per endpoint.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Base URL from `ASSISTANT_DECK_BASE_URL`, with a localhost default.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `POST /api/chat/stream`. Returns the raw response so the pipeline can
    /// consume the chunked body; non-2xx is already an error here.
    pub async fn send_chat_stream(&self, request: &ChatRequest) -> AppResult<reqwest::Response> {
        let response = self
            .client
            .post(self.url("/api/chat/stream"))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Stream request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Stream request failed with status {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// `POST /api/chat`, the non-streaming fallback.
    pub async fn send_chat(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Chat request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Chat request failed with status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Http(format!("Failed to parse chat response: {e}")))
    }

    /// `GET /api/chat/history?sessionId=...`
    pub async fn get_history(&self, session_id: &str) -> AppResult<HistoryResponse> {
        let response = self
            .client
            .get(self.url("/api/chat/history"))
            .query(&[("sessionId", session_id)])
            .send()
            .await
            .map_err(|e| AppError::Http(format!("History request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "History request failed with status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Http(format!("Failed to parse history: {e}")))
    }

    /// `POST /api/chat/clear`. Callers treat this as best-effort.
    pub async fn clear_history(&self, session_id: &str) -> AppResult<()> {
        let response = self
            .client
            .post(self.url("/api/chat/clear"))
            .json(&serde_json::json!({ "sessionId": session_id }))
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Clear request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Clear request failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// `GET /api/agents`
    pub async fn list_agents(&self) -> AppResult<Vec<AgentInfo>> {
        let response = self
            .client
            .get(self.url("/api/agents"))
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Agent list request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Agent list request failed with status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Http(format!("Failed to parse agent list: {e}")))
    }

    /// `GET /api/agents/:id`
    pub async fn get_agent(&self, id: &str) -> AppResult<AgentPersona> {
        let response = self
            .client
            .get(self.url(&format!("/api/agents/{id}")))
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Agent request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Agent {id} not found")));
        }
        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Agent request failed with status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Http(format!("Failed to parse agent: {e}")))
    }

    /// `PUT /api/agents/:id`
    pub async fn put_agent(&self, persona: &AgentPersona) -> AppResult<()> {
        let response = self
            .client
            .put(self.url(&format!("/api/agents/{}", persona.id)))
            .json(persona)
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Agent update failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Agent update failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// `DELETE /api/agents/:id`
    pub async fn delete_agent(&self, id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/api/agents/{id}")))
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Agent delete failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Agent delete failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// `GET /api/settings`
    pub async fn get_settings(&self) -> AppResult<Settings> {
        let response = self
            .client
            .get(self.url("/api/settings"))
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Settings request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Settings request failed with status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Http(format!("Failed to parse settings: {e}")))
    }

    /// `POST /api/settings`. Callers swallow failures per the contract.
    pub async fn post_settings(&self, settings: &Settings) -> AppResult<()> {
        let response = self
            .client
            .post(self.url("/api/settings"))
            .json(settings)
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Settings update failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Http(format!(
                "Settings update failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_text_prefers_first_non_empty() {
        let with_both: ChatResponse = serde_json::from_str(
            r#"{"response":"from response","message":"from message"}"#,
        )
        .expect("parse");
        assert_eq!(with_both.text(), Some("from response"));

        let empty_response: ChatResponse =
            serde_json::from_str(r#"{"response":"","message":"from message"}"#).expect("parse");
        assert_eq!(empty_response.text(), Some("from message"));

        let neither: ChatResponse = serde_json::from_str(r#"{}"#).expect("parse");
        assert_eq!(neither.text(), None);
    }

    #[test]
    fn test_chat_request_serializes_camel_case() {
        let request = ChatRequest {
            message: "hi".into(),
            session_id: "s-1".into(),
            agent_id: Some("coach".into()),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["agentId"], "coach");

        let no_agent = ChatRequest {
            message: "hi".into(),
            session_id: "s-1".into(),
            agent_id: None,
        };
        let json = serde_json::to_value(&no_agent).expect("serialize");
        assert!(json.get("agentId").is_none());
    }

    #[test]
    fn test_history_parses_optional_timestamp() {
        let history: HistoryResponse = serde_json::from_str(
            r#"{"messages":[
                {"role":"user","content":"hi","timestamp":"2026-08-01T10:00:00Z"},
                {"role":"assistant","content":"hello"}
            ]}"#,
        )
        .expect("parse");
        assert_eq!(history.messages.len(), 2);
        assert!(history.messages[0].timestamp.is_some());
        assert!(history.messages[1].timestamp.is_none());
        assert_eq!(history.messages[1].role, Role::Assistant);
    }
}
