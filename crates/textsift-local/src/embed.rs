//! Embedding backends for the semantic dedup stage.
//!
//! Both HTTP backends send one batched request per document. Any transport,
//! status or shape problem is reported as `EmbeddingUnavailable`; the caller
//! decides whether to continue with fingerprint-only results.

use crate::content_key;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use textsift_core::{ContentStore, Embedder, Error, Result};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn check_base_url(base_url: &str) -> Result<String> {
    let u = url::Url::parse(base_url)
        .map_err(|e| Error::InvalidConfig(format!("bad embedding base url {base_url:?}: {e}")))?;
    if !matches!(u.scheme(), "http" | "https") {
        return Err(Error::InvalidConfig(format!(
            "embedding base url must be http(s): {base_url}"
        )));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

pub fn default_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("textsift-local/0.1")
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))
}

fn check_count(texts: &[String], got: usize) -> Result<()> {
    if got != texts.len() {
        return Err(Error::EmbeddingUnavailable(format!(
            "backend returned {got} vectors for {} texts",
            texts.len()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_ms: u64,
}

impl OllamaEmbedder {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: check_base_url(base_url)?,
            model: model.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    /// `TEXTSIFT_OLLAMA_BASE_URL` (default localhost:11434).
    pub fn from_env(client: reqwest::Client, model: &str) -> Result<Self> {
        let base_url =
            env("TEXTSIFT_OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        Self::new(client, &base_url, model)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_embed(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[async_trait::async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let resp = self
            .client
            .post(self.endpoint_embed())
            .timeout(Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::EmbeddingUnavailable(format!(
                "ollama embed HTTP {status}"
            )));
        }
        let parsed: OllamaEmbedResponse = resp
            .json()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;
        check_count(texts, parsed.embeddings.len())?;
        Ok(parsed.embeddings)
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiCompatEmbedder {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: check_base_url(base_url)?,
            api_key,
            model: model.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    /// `TEXTSIFT_OPENAI_COMPAT_BASE_URL` (required), `TEXTSIFT_OPENAI_COMPAT_API_KEY` (optional).
    pub fn from_env(client: reqwest::Client, model: &str) -> Result<Self> {
        let base_url = env("TEXTSIFT_OPENAI_COMPAT_BASE_URL").ok_or_else(|| {
            Error::NotConfigured("missing TEXTSIFT_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        Self::new(
            client,
            &base_url,
            env("TEXTSIFT_OPENAI_COMPAT_API_KEY"),
            model,
        )
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint_embeddings(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl Embedder for OpenAiCompatEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let mut rb = self
            .client
            .post(self.endpoint_embeddings())
            .timeout(Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }
        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::EmbeddingUnavailable(format!(
                "openai_compat embeddings HTTP {status}"
            )));
        }
        let mut parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;
        check_count(texts, parsed.data.len())?;
        // Servers may answer out of order, but every input needs exactly one vector.
        parsed.data.sort_by_key(|d| d.index);
        if let Some((i, d)) = parsed.data.iter().enumerate().find(|(i, d)| d.index != *i) {
            return Err(Error::EmbeddingUnavailable(format!(
                "embedding indices are not a permutation of 0..{}: position {i} has index {}",
                texts.len(),
                d.index
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Wraps an embedder with a content-addressed vector cache.
///
/// Only cache misses reach the inner embedder, still as a single batch.
pub struct CachedEmbedder<E, S> {
    inner: E,
    store: S,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E: Embedder, S: ContentStore> CachedEmbedder<E, S> {
    pub fn new(inner: E, store: S) -> Self {
        Self {
            inner,
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn key(&self, text: &str) -> String {
        content_key(&[self.inner.model_id(), text])
    }

    fn lookup(&self, text: &str) -> Option<Vec<f32>> {
        // A corrupt or unreadable entry is just a miss.
        match self.store.get(&self.key(text)) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "embedding cache read failed");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl<E: Embedder, S: ContentStore> Embedder for CachedEmbedder<E, S> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.lookup(t)).collect();
        let missing: Vec<usize> = (0..texts.len()).filter(|i| out[*i].is_none()).collect();
        self.hits
            .fetch_add((texts.len() - missing.len()) as u64, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|i| texts[*i].clone()).collect();
            let fresh = self.inner.embed(&batch).await?;
            check_count(&batch, fresh.len())?;
            for (i, v) in missing.into_iter().zip(fresh) {
                let bytes = serde_json::to_vec(&v)
                    .map_err(|e| Error::Store(format!("encode embedding: {e}")))?;
                if let Err(e) = self.store.put(&self.key(&texts[i]), &bytes) {
                    tracing::warn!(error = %e, "embedding cache write failed");
                }
                out[i] = Some(v);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use axum::{routing::post, Json, Router};
    use std::net::SocketAddr;
    use std::sync::Arc;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("axum serve");
        });
        addr
    }

    fn texts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// Deterministic fake: vector = [len, 1].
    struct LenEmbedder {
        calls: AtomicU64,
    }

    #[async_trait::async_trait]
    impl Embedder for LenEmbedder {
        fn model_id(&self) -> &str {
            "len"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn ollama_embedder_posts_batch_and_parses_vectors() {
        let app = Router::new().route(
            "/api/embed",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "all-minilm");
                let n = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
                let vecs: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 1.0]).collect();
                Json(serde_json::json!({ "embeddings": vecs }))
            }),
        );
        let addr = serve(app).await;
        let client = default_http_client().unwrap();
        let e = OllamaEmbedder::new(client, &format!("http://{addr}/"), "all-minilm").unwrap();
        assert_eq!(e.base_url(), format!("http://{addr}"));
        let out = e.embed(&texts(&["a", "b", "c"])).await.unwrap();
        assert_eq!(out, vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 1.0]]);
    }

    #[tokio::test]
    async fn ollama_embedder_surfaces_http_errors_as_unavailable() {
        let app = Router::new().route(
            "/api/embed",
            post(|| async { (axum::http::StatusCode::NOT_FOUND, "model not found") }),
        );
        let addr = serve(app).await;
        let e = OllamaEmbedder::new(
            default_http_client().unwrap(),
            &format!("http://{addr}"),
            "missing",
        )
        .unwrap();
        let err = e.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn openai_compat_embedder_reorders_by_index_and_sends_key() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(
                |headers: axum::http::HeaderMap, Json(_body): Json<serde_json::Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    assert_eq!(auth, "Bearer sekrit");
                    Json(serde_json::json!({
                        "data": [
                            { "index": 1, "embedding": [0.0, 1.0] },
                            { "index": 0, "embedding": [1.0, 0.0] }
                        ]
                    }))
                },
            ),
        );
        let addr = serve(app).await;
        let e = OpenAiCompatEmbedder::new(
            default_http_client().unwrap(),
            &format!("http://{addr}"),
            Some("sekrit".to_string()),
            "text-embedding-3-small",
        )
        .unwrap();
        let out = e.embed(&texts(&["first", "second"])).await.unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_an_error() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|| async { Json(serde_json::json!({ "data": [] })) }),
        );
        let addr = serve(app).await;
        let e = OpenAiCompatEmbedder::new(
            default_http_client().unwrap(),
            &format!("http://{addr}"),
            None,
            "m",
        )
        .unwrap();
        let err = e.embed(&texts(&["x"])).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn duplicate_indices_are_rejected() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|| async {
                Json(serde_json::json!({
                    "data": [
                        { "index": 0, "embedding": [1.0, 0.0] },
                        { "embedding": [0.0, 1.0] }
                    ]
                }))
            }),
        );
        let addr = serve(app).await;
        let e = OpenAiCompatEmbedder::new(
            default_http_client().unwrap(),
            &format!("http://{addr}"),
            None,
            "m",
        )
        .unwrap();
        let err = e.embed(&texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)), "{err:?}");
    }

    #[test]
    fn rejects_non_http_base_urls() {
        let client = default_http_client().unwrap();
        assert!(OllamaEmbedder::new(client.clone(), "ftp://x", "m").is_err());
        assert!(OllamaEmbedder::new(client, "not a url", "m").is_err());
    }

    #[tokio::test]
    async fn cached_embedder_only_sends_misses() {
        let inner = LenEmbedder {
            calls: AtomicU64::new(0),
        };
        let cached = CachedEmbedder::new(inner, MemoryStore::new());

        let first = cached.embed(&texts(&["aa", "bbb"])).await.unwrap();
        assert_eq!(first, vec![vec![2.0, 1.0], vec![3.0, 1.0]]);
        assert_eq!((cached.cache_hits(), cached.cache_misses()), (0, 2));

        let second = cached.embed(&texts(&["bbb", "c", "aa"])).await.unwrap();
        assert_eq!(second, vec![vec![3.0, 1.0], vec![1.0, 1.0], vec![2.0, 1.0]]);
        assert_eq!((cached.cache_hits(), cached.cache_misses()), (2, 3));

        let third = cached.embed(&texts(&["c"])).await.unwrap();
        assert_eq!(third, vec![vec![1.0, 1.0]]);
        assert_eq!(cached.inner.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn cached_embedder_works_behind_a_trait_object() {
        let cached: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(
            LenEmbedder {
                calls: AtomicU64::new(0),
            },
            MemoryStore::new(),
        ));
        assert_eq!(cached.model_id(), "len");
        assert!(cached.embed(&[]).await.unwrap().is_empty());
    }
}
