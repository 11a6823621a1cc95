//! Request and event types shared by the relay and its adapters.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Chat request accepted by `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Which backend should serve the request.
    #[serde(default, rename = "model_type")]
    pub backend: Backend,

    /// Optional system prompt, forwarded in the backend's own way.
    #[serde(default, rename = "systemPrompt")]
    pub system_prompt: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}

impl ChatRequest {
    pub fn new(backend: Backend, messages: Vec<Message>) -> Self {
        Self {
            messages,
            backend,
            system_prompt: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Upstream provider selected for a request.
///
/// Any identifier other than `openrouter`, including a missing or null one,
/// selects Ollama.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ollama,
    OpenRouter,
}

impl Backend {
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            "openrouter" => Backend::OpenRouter,
            "ollama" => Backend::Ollama,
            other => {
                warn!(model_type = other, "Unrecognized backend identifier, using ollama");
                Backend::Ollama
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Ollama => "ollama",
            Backend::OpenRouter => "openrouter",
        }
    }
}

impl From<Option<String>> for Backend {
    fn from(identifier: Option<String>) -> Self {
        identifier
            .as_deref()
            .map(Backend::from_identifier)
            .unwrap_or_default()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One increment of model output, independent of the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A piece of generated text.
    Token { text: String },
    /// The upstream finished normally.
    Done,
    /// The upstream failed after streaming began.
    Error { message: String },
}

impl RelayEvent {
    pub fn token(text: impl Into<String>) -> Self {
        RelayEvent::Token { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        RelayEvent::Error {
            message: message.into(),
        }
    }

    /// `Done` and `Error` end a stream; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayEvent::Token { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.messages.is_empty());
        assert_eq!(req.backend, Backend::Ollama);
        assert_eq!(req.system_prompt, None);
        assert_eq!(req.temperature, 0.7);
        assert_eq!(req.max_tokens, 2000);
    }

    #[test]
    fn test_request_wire_names() {
        let req: ChatRequest = serde_json::from_str(
            r#"{
                "messages": [{"role": "user", "content": "hello"}],
                "model_type": "openrouter",
                "systemPrompt": "be brief",
                "temperature": 0.2,
                "max_tokens": 64
            }"#,
        )
        .unwrap();
        assert_eq!(req.messages, vec![Message::new(Role::User, "hello")]);
        assert_eq!(req.backend, Backend::OpenRouter);
        assert_eq!(req.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(req.temperature, 0.2);
        assert_eq!(req.max_tokens, 64);
    }

    #[test]
    fn test_backend_identifiers() {
        for (raw, expected) in [
            (r#"{"model_type": "ollama"}"#, Backend::Ollama),
            (r#"{"model_type": "openrouter"}"#, Backend::OpenRouter),
            (r#"{"model_type": "OpenRouter"}"#, Backend::Ollama),
            (r#"{"model_type": "gpt"}"#, Backend::Ollama),
            (r#"{"model_type": null}"#, Backend::Ollama),
        ] {
            let req: ChatRequest = serde_json::from_str(raw).unwrap();
            assert_eq!(req.backend, expected, "{raw}");
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let res = serde_json::from_str::<ChatRequest>(
            r#"{"messages": [{"role": "tool", "content": "x"}]}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_terminal_events() {
        assert!(!RelayEvent::token("a").is_terminal());
        assert!(RelayEvent::Done.is_terminal());
        assert!(RelayEvent::error("boom").is_terminal());
    }
}
