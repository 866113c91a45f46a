/// Embedding client with session-scoped memoization.
///
/// Texts are embedded with a task-type tag: persona descriptions as documents, the
/// topic context as a query. Vectors from different task types or models must never
/// be compared with each other.
///
/// Identical requests (same texts in the same order, same task type, same credential)
/// are answered from the cache with the very same `Arc`, without touching the backend.
/// A failed request caches nothing and is not retried.
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheStats, SessionCache};
use crate::error::CommonError;
use crate::gemini::GeminiClient;

/// A batch of vectors, index-aligned with the texts that produced it.
pub type EmbeddingBatch = Arc<Vec<Vec<f32>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Document,
    Query,
}

impl TaskType {
    /// Wire name understood by the embedding provider.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Something that turns texts into vectors. Implemented by the Gemini client and by
/// test doubles.
pub trait EmbeddingBackend: Send + Sync {
    fn embed_batch(
        &self,
        texts: &[String],
        task_type: TaskType,
        credential: &str,
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, CommonError>> + Send;
}

impl EmbeddingBackend for GeminiClient {
    async fn embed_batch(
        &self,
        texts: &[String],
        task_type: TaskType,
        credential: &str,
    ) -> Result<Vec<Vec<f32>>, CommonError> {
        self.batch_embed_contents(texts, task_type.as_str(), credential)
            .await
            .map_err(|e| CommonError::EmbeddingUnavailable(e.to_string()))
    }
}

pub struct Embedder<B> {
    backend: B,
    cache: Mutex<SessionCache<EmbeddingBatch>>,
}

impl<B: EmbeddingBackend> Embedder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: Mutex::new(SessionCache::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Embed `texts` under `task_type`, memoized per session.
    ///
    /// The cache lock is held across the backend call, so at most one embedding request
    /// is in flight and a repeated request waits for the first one instead of racing it.
    pub async fn embed(
        &self,
        texts: &[String],
        task_type: TaskType,
        credential: &str,
    ) -> Result<EmbeddingBatch, CommonError> {
        if texts.is_empty() {
            return Err(CommonError::EmptyRequest("embedding"));
        }

        let key = embedding_key(texts, task_type, credential);
        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.get(&key) {
            debug!(count = texts.len(), task = task_type.as_str(), "embedding cache hit");
            return Ok(hit);
        }

        info!(count = texts.len(), task = task_type.as_str(), "requesting embeddings");
        let vectors = self
            .backend
            .embed_batch(texts, task_type, credential)
            .await
            .inspect_err(|e| warn!(error = %e, "embedding request failed"))?;
        validate_batch(texts.len(), &vectors)?;

        let batch: EmbeddingBatch = Arc::new(vectors);
        cache.insert(key, Arc::clone(&batch));
        Ok(batch)
    }

    /// Embed persona descriptions for ranking.
    pub async fn embed_documents(
        &self,
        texts: &[String],
        credential: &str,
    ) -> Result<EmbeddingBatch, CommonError> {
        self.embed(texts, TaskType::Document, credential).await
    }

    /// Embed a single context string for ranking.
    pub async fn embed_query(&self, text: &str, credential: &str) -> Result<Vec<f32>, CommonError> {
        let batch = self
            .embed(&[text.to_string()], TaskType::Query, credential)
            .await?;
        batch
            .first()
            .cloned()
            .ok_or_else(|| CommonError::EmbeddingUnavailable("empty embedding result".to_string()))
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Forget every cached batch, e.g. when the session ends.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

fn embedding_key(texts: &[String], task_type: TaskType, credential: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(texts.len() + 2);
    parts.push(task_type.as_str());
    parts.push(credential);
    parts.extend(texts.iter().map(String::as_str));
    cache_key("embed", &parts)
}

/// A batch is usable only when it has one non-empty vector per input, every vector
/// has the same length and every component is finite.
fn validate_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<(), CommonError> {
    if vectors.len() != expected {
        return Err(CommonError::EmbeddingUnavailable(format!(
            "embedding count mismatch: expected {expected}, got {}",
            vectors.len()
        )));
    }
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let dim = first.len();
    if dim == 0 {
        return Err(CommonError::EmbeddingUnavailable(
            "provider returned an empty vector".to_string(),
        ));
    }
    if let Some(pos) = vectors.iter().position(|v| v.len() != dim) {
        return Err(CommonError::EmbeddingUnavailable(format!(
            "embedding dimension mismatch at index {pos}: expected {dim}, got {}",
            vectors[pos].len()
        )));
    }
    if let Some(pos) = vectors
        .iter()
        .position(|v| v.iter().any(|x| !x.is_finite()))
    {
        return Err(CommonError::EmbeddingUnavailable(format!(
            "embedding at index {pos} has non-finite components"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `[len, task marker]` per text and counts calls.
    struct CountingBackend {
        calls: AtomicUsize,
        fail: bool,
        drop_last: bool,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                drop_last: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EmbeddingBackend for CountingBackend {
        async fn embed_batch(
            &self,
            texts: &[String],
            task_type: TaskType,
            _credential: &str,
        ) -> Result<Vec<Vec<f32>>, CommonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CommonError::EmbeddingUnavailable("quota exceeded".to_string()));
            }
            let marker = match task_type {
                TaskType::Document => 1.0,
                TaskType::Query => -1.0,
            };
            let mut out: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| vec![t.len() as f32, marker])
                .collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_identical_requests_hit_backend_once() {
        let embedder = Embedder::new(CountingBackend::new());
        let input = texts(&["alpha", "beta"]);

        let first = embedder.embed(&input, TaskType::Document, "key").await.unwrap();
        let second = embedder.embed(&input, TaskType::Document, "key").await.unwrap();

        assert_eq!(embedder.backend().calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);

        let stats = embedder.cache_stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_cache_key_covers_task_credential_and_order() {
        let embedder = Embedder::new(CountingBackend::new());
        let input = texts(&["alpha", "beta"]);

        embedder.embed(&input, TaskType::Document, "key").await.unwrap();
        embedder.embed(&input, TaskType::Query, "key").await.unwrap();
        embedder.embed(&input, TaskType::Document, "other-key").await.unwrap();
        embedder
            .embed(&texts(&["beta", "alpha"]), TaskType::Document, "key")
            .await
            .unwrap();

        assert_eq!(embedder.backend().calls(), 4);
    }

    #[tokio::test]
    async fn test_vectors_are_index_aligned() {
        let embedder = Embedder::new(CountingBackend::new());
        let batch = embedder
            .embed_documents(&texts(&["a", "abc"]), "key")
            .await
            .unwrap();
        assert_eq!(*batch, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);

        let query = embedder.embed_query("abcd", "key").await.unwrap();
        assert_eq!(query, vec![4.0, -1.0]);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let mut backend = CountingBackend::new();
        backend.fail = true;
        let embedder = Embedder::new(backend);
        let input = texts(&["alpha"]);

        let err = embedder.embed(&input, TaskType::Document, "key").await.unwrap_err();
        assert!(matches!(err, CommonError::EmbeddingUnavailable(_)));

        let _ = embedder.embed(&input, TaskType::Document, "key").await;
        assert_eq!(embedder.backend().calls(), 2);
        assert_eq!(embedder.cache_stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_short_batch_is_unavailable() {
        let mut backend = CountingBackend::new();
        backend.drop_last = true;
        let embedder = Embedder::new(backend);

        let err = embedder
            .embed(&texts(&["a", "b", "c"]), TaskType::Document, "key")
            .await
            .unwrap_err();

        assert!(matches!(err, CommonError::EmbeddingUnavailable(_)));
        assert_eq!(embedder.cache_stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_refused_without_calling_backend() {
        let embedder = Embedder::new(CountingBackend::new());
        let err = embedder.embed(&[], TaskType::Query, "key").await.unwrap_err();

        assert!(matches!(err, CommonError::EmptyRequest("embedding")));
        assert_eq!(embedder.backend().calls(), 0);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_new_call() {
        let embedder = Embedder::new(CountingBackend::new());
        let input = texts(&["alpha"]);
        embedder.embed(&input, TaskType::Query, "key").await.unwrap();
        embedder.clear_cache().await;
        embedder.embed(&input, TaskType::Query, "key").await.unwrap();
        assert_eq!(embedder.backend().calls(), 2);
    }

    #[test]
    fn test_validate_batch_rejects_ragged_vectors() {
        let err = validate_batch(2, &[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("dimension mismatch at index 1"));
        assert!(validate_batch(1, &[vec![]]).is_err());
        assert!(validate_batch(2, &[vec![1.0], vec![2.0]]).is_ok());
    }

    #[test]
    fn test_validate_batch_rejects_non_finite_components() {
        let err = validate_batch(2, &[vec![1.0, 2.0], vec![f32::NAN, 0.0]]).unwrap_err();
        assert!(matches!(err, CommonError::EmbeddingUnavailable(_)));
        assert!(err.to_string().contains("index 1"));
        assert!(validate_batch(1, &[vec![f32::INFINITY, 1.0]]).is_err());
        assert!(validate_batch(1, &[vec![f32::NEG_INFINITY]]).is_err());
    }
}
