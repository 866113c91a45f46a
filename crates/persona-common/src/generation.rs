/// Text generation with session-scoped memoization.
///
/// Re-sending an identical prompt with the same credential returns the earlier text.
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, SessionCache};
use crate::error::CommonError;
use crate::gemini::GeminiClient;

pub trait GenerationBackend: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        credential: &str,
    ) -> impl Future<Output = Result<String, CommonError>> + Send;
}

impl GenerationBackend for GeminiClient {
    async fn generate(&self, prompt: &str, credential: &str) -> Result<String, CommonError> {
        let response = self
            .generate_content(prompt, credential)
            .await
            .map_err(|e| CommonError::GenerationUnavailable(e.to_string()))?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                total_tokens = usage.total_token_count,
                "generation usage"
            );
        }

        response.text().ok_or_else(|| {
            let reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            CommonError::GenerationUnavailable(format!("response contained no text ({reason})"))
        })
    }
}

pub struct Generator<B> {
    backend: B,
    cache: Mutex<SessionCache<Arc<str>>>,
}

impl<B: GenerationBackend> Generator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: Mutex::new(SessionCache::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn generate(&self, prompt: &str, credential: &str) -> Result<Arc<str>, CommonError> {
        if prompt.trim().is_empty() {
            return Err(CommonError::EmptyRequest("generation"));
        }

        let key = cache_key("generate", &[credential, prompt]);
        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.get(&key) {
            debug!(prompt_len = prompt.len(), "generation cache hit");
            return Ok(hit);
        }

        info!(prompt_len = prompt.len(), "requesting generation");
        let text = self
            .backend
            .generate(prompt, credential)
            .await
            .inspect_err(|e| warn!(error = %e, "generation request failed"))?;

        let text: Arc<str> = Arc::from(text);
        cache.insert(key, Arc::clone(&text));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoBackend {
        calls: AtomicUsize,
    }

    impl GenerationBackend for EchoBackend {
        async fn generate(&self, prompt: &str, credential: &str) -> Result<String, CommonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if credential == "revoked" {
                return Err(CommonError::GenerationUnavailable("permission denied".to_string()));
            }
            Ok(format!("echo: {prompt}"))
        }
    }

    fn generator() -> Generator<EchoBackend> {
        Generator::new(EchoBackend {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_repeated_prompt_is_memoized() {
        let generator = generator();
        let a = generator.generate("plan", "key").await.unwrap();
        let b = generator.generate("plan", "key").await.unwrap();

        assert_eq!(&*a, "echo: plan");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(generator.backend().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates_and_is_not_cached() {
        let generator = generator();
        assert!(generator.generate("plan", "revoked").await.is_err());
        assert!(generator.generate("plan", "revoked").await.is_err());
        assert_eq!(generator.backend().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_refused() {
        let generator = generator();
        let err = generator.generate("   ", "key").await.unwrap_err();
        assert!(matches!(err, CommonError::EmptyRequest("generation")));
        assert_eq!(generator.backend().calls.load(Ordering::SeqCst), 0);
    }
}
