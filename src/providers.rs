//! Completion providers
//!
//! Each provider wraps one external text-completion backend behind the
//! `TextCompletionProvider` trait: role-tagged messages in, free text out.
//! A provider fault (quota, timeout, transport, bad payload) surfaces as
//! `QueryError::Provider` so the gateway can move on to the next entry in
//! the chain.

use crate::config::ProviderConfig;
use crate::error::{QueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A role-tagged message sent to a completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One interchangeable text-completion backend.
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Groq chat-completions backend (OpenAI-compatible API).
pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextCompletionProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.1,
            "max_tokens": 1024,
        });

        let response = self
            .client
            .post("https://api.groq.com/openai/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Provider(format!("groq: request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(QueryError::Provider(format!("groq: {}: {}", status, detail)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QueryError::Provider(format!("groq: invalid payload: {}", e)))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| QueryError::Provider("groq: no content in response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

/// Google Gemini backend.
///
/// Gemini takes a single user turn plus an optional system instruction, so
/// the message list is collapsed: system messages feed `systemInstruction`,
/// the last user message becomes the prompt.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextCompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let user_text = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let mut body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": user_text}],
            }],
        });
        if !system_text.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system_text.join("\n")}],
            });
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Provider(format!("gemini: request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(QueryError::Provider(format!("gemini: {}: {}", status, detail)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QueryError::Provider(format!("gemini: invalid payload: {}", e)))?;

        let content = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| QueryError::Provider("gemini: no content in response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

/// Local Ollama backend.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextCompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Provider(format!("ollama: request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(QueryError::Provider(format!("ollama: {}: {}", status, detail)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QueryError::Provider(format!("ollama: invalid payload: {}", e)))?;

        let content = payload["message"]["content"]
            .as_str()
            .ok_or_else(|| QueryError::Provider("ollama: no content in response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

/// Build the ordered provider chain from configuration.
///
/// The configured primary goes first; the remaining backends follow in the
/// fixed groq → gemini → ollama order. Keyed backends without credentials
/// are skipped. Ollama needs no credentials, so the chain is never empty.
pub fn build_chain(config: &ProviderConfig) -> Vec<std::sync::Arc<dyn TextCompletionProvider>> {
    use std::sync::Arc;

    let mut ranked = vec!["groq", "gemini", "ollama"];
    if let Some(pos) = ranked.iter().position(|n| *n == config.primary) {
        let primary = ranked.remove(pos);
        ranked.insert(0, primary);
    }

    let mut chain: Vec<Arc<dyn TextCompletionProvider>> = Vec::new();
    for name in ranked {
        match name {
            "groq" => {
                if let Some(ref key) = config.groq_api_key {
                    chain.push(Arc::new(GroqProvider::new(
                        key.clone(),
                        config.groq_model.clone(),
                    )));
                }
            }
            "gemini" => {
                if let Some(ref key) = config.google_api_key {
                    chain.push(Arc::new(GeminiProvider::new(
                        key.clone(),
                        config.gemini_model.clone(),
                    )));
                }
            }
            "ollama" => {
                chain.push(Arc::new(OllamaProvider::new(
                    config.ollama_url.clone(),
                    config.ollama_model.clone(),
                )));
            }
            _ => {}
        }
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(primary: &str) -> ProviderConfig {
        ProviderConfig {
            primary: primary.to_string(),
            groq_api_key: Some("k1".to_string()),
            groq_model: "llama-3.1-8b-instant".to_string(),
            google_api_key: Some("k2".to_string()),
            gemini_model: "gemini-1.5-flash".to_string(),
            ollama_model: "llama3".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
        }
    }

    #[test]
    fn test_chain_order_respects_primary() {
        let chain = build_chain(&config("gemini"));
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["gemini", "groq", "ollama"]);
    }

    #[test]
    fn test_chain_skips_unkeyed_backends() {
        let mut cfg = config("groq");
        cfg.groq_api_key = None;
        cfg.google_api_key = None;
        let chain = build_chain(&cfg);
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["ollama"]);
    }
}
