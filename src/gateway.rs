//! Reasoning-engine gateway
//!
//! One entry point over the ordered provider chain. Providers are tried in
//! rank order; the first reply wins. The gateway itself never retries a
//! provider and never caches — resilience here is the fallback walk only,
//! any retry policy belongs to the caller.

use crate::config::ProviderConfig;
use crate::error::{QueryError, Result};
use crate::providers::{build_chain, ChatMessage, TextCompletionProvider};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LlmGateway {
    providers: Vec<Arc<dyn TextCompletionProvider>>,
}

impl LlmGateway {
    /// Build a gateway over an explicit chain (primary first).
    pub fn new(providers: Vec<Arc<dyn TextCompletionProvider>>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(build_chain(config))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Send the messages to the chain and return the first usable reply.
    ///
    /// Every call is a fresh round trip. Once a provider answers, no
    /// further providers are contacted.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if self.providers.is_empty() {
            return Err(QueryError::ProvidersExhausted(
                "no providers configured".to_string(),
            ));
        }

        let mut last_error = String::new();
        for provider in &self.providers {
            debug!("Calling provider '{}'", provider.name());
            match provider.complete(messages).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Provider '{}' failed, trying next: {}", provider.name(), e);
                    last_error = e.to_string();
                }
            }
        }

        Err(QueryError::ProvidersExhausted(last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        name: &'static str,
        reply: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextCompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(QueryError::Provider(format!("{}: down", self.name))),
            }
        }
    }

    fn provider(
        name: &'static str,
        reply: Option<&'static str>,
    ) -> (Arc<dyn TextCompletionProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = Arc::new(ScriptedProvider {
            name,
            reply,
            calls: Arc::clone(&calls),
        });
        (p, calls)
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_success() {
        let (p1, c1) = provider("a", None);
        let (p2, c2) = provider("b", Some("reply from b"));
        let (p3, c3) = provider("c", Some("reply from c"));
        let gateway = LlmGateway::new(vec![p1, p2, p3]);

        let reply = gateway
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap();

        assert_eq!(reply, "reply from b");
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_exhaustion() {
        let (p1, _) = provider("a", None);
        let (p2, _) = provider("b", None);
        let gateway = LlmGateway::new(vec![p1, p2]);

        let err = gateway
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::ProvidersExhausted(_)));
    }
}
