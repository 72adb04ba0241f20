//! Embedding provider selection and HTTP clients.
//!
//! One [`EmbeddingClient`] is chosen at startup by [`create_embedder`], a
//! pure function of [`EmbeddingConfig`]. The variants form a closed set:
//! - **[`HuggingFaceProvider`]**: Hugging Face inference feature-extraction pipeline.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAIProvider`]**: the OpenAI embeddings API.
//!
//! The client never switches provider at runtime, and construction does no
//! network I/O. A remote provider selected without its API key fails with
//! [`KbError::Config`] instead of falling back to another provider.
//!
//! # Retry Strategy
//!
//! All providers retry transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use kb_index_core::embedding::{Embedder, ModelIdentity};
use std::time::Duration;

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::error::{KbError, Result};

/// The selected embedding backend.
pub enum EmbeddingClient {
    HuggingFace(HuggingFaceProvider),
    Ollama(OllamaProvider),
    OpenAI(OpenAIProvider),
}

/// Build the embedding client described by `config`.
///
/// # Errors
///
/// [`KbError::Config`] when `huggingface` or `openai` is selected without an
/// API key.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<EmbeddingClient> {
    let http = HttpSettings::new(config)?;
    match config.provider {
        ProviderKind::HuggingFace => Ok(EmbeddingClient::HuggingFace(HuggingFaceProvider {
            api_key: require_key(config, "HUGGINGFACE_API_KEY")?,
            http,
        })),
        ProviderKind::Ollama => Ok(EmbeddingClient::Ollama(OllamaProvider { http })),
        ProviderKind::OpenAI => Ok(EmbeddingClient::OpenAI(OpenAIProvider {
            api_key: require_key(config, "OPENAI_API_KEY")?,
            http,
        })),
    }
}

fn require_key(config: &EmbeddingConfig, var: &str) -> Result<String> {
    config.api_key.clone().ok_or_else(|| {
        KbError::Config(format!(
            "{} must be set when EMBEDDING_PROVIDER is '{}'",
            var, config.provider
        ))
    })
}

/// Settings shared by every provider client.
struct HttpSettings {
    model: String,
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            model: config.model_name(),
            endpoint: config.endpoint(),
            max_retries: config.max_retries,
            client,
        })
    }

    /// POST `body` to `url`, retrying transient failures.
    async fn post_json(
        &self,
        label: &str,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(provider = label, attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }

                    bail!("{} API error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} connection error ({}): {}", label, url, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
    }
}

// ============ Hugging Face Provider ============

/// Hugging Face inference API client.
///
/// Calls `POST {endpoint}/{model}/pipeline/feature-extraction` with
/// `{"inputs": [...]}`.
pub struct HuggingFaceProvider {
    api_key: String,
    http: HttpSettings,
}

impl HuggingFaceProvider {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/{}/pipeline/feature-extraction",
            self.http.endpoint, self.http.model
        );
        let body = serde_json::json!({ "inputs": texts });
        let json = self
            .http
            .post_json("HuggingFace", &url, Some(&self.api_key), &body)
            .await?;
        parse_huggingface_response(&json)
    }
}

// ============ Ollama Provider ============

/// Local Ollama client.
///
/// Calls `POST {base}/api/embed`. Requires Ollama to be running with the
/// embedding model pulled.
pub struct OllamaProvider {
    http: HttpSettings,
}

impl OllamaProvider {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.http.endpoint);
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self.http.post_json("Ollama", &url, None, &body).await?;
        parse_ollama_response(&json)
    }
}

// ============ OpenAI Provider ============

/// OpenAI embeddings API client (`POST {base}/embeddings`).
pub struct OpenAIProvider {
    api_key: String,
    http: HttpSettings,
}

impl OpenAIProvider {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.http.endpoint);
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self
            .http
            .post_json("OpenAI", &url, Some(&self.api_key), &body)
            .await?;
        parse_openai_response(&json)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn identity(&self) -> ModelIdentity {
        let (provider, http) = match self {
            EmbeddingClient::HuggingFace(p) => (ProviderKind::HuggingFace, &p.http),
            EmbeddingClient::Ollama(p) => (ProviderKind::Ollama, &p.http),
            EmbeddingClient::OpenAI(p) => (ProviderKind::OpenAI, &p.http),
        };
        ModelIdentity::new(provider.as_str(), http.model.clone())
    }

    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = match self {
            EmbeddingClient::HuggingFace(p) => p.embed(texts).await?,
            EmbeddingClient::Ollama(p) => p.embed(texts).await?,
            EmbeddingClient::OpenAI(p) => p.embed(texts).await?,
        };
        if vectors.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

fn json_to_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Parse `{"data": [{"index": n, "embedding": [...]}, ...]}`, ordered by `index`.
fn parse_openai_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        let vector = item
            .get("embedding")
            .and_then(json_to_vector)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Parse `{"embeddings": [[...], ...]}`.
fn parse_ollama_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| {
            json_to_vector(e)
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not a number array"))
        })
        .collect()
}

/// Parse `[[...], ...]`, or a bare `[...]` for a single input.
fn parse_huggingface_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let items = json
        .as_array()
        .ok_or_else(|| anyhow!("Invalid HuggingFace response: expected an array"))?;

    if items.iter().all(|v| v.is_number()) && !items.is_empty() {
        return json_to_vector(json)
            .map(|v| vec![v])
            .ok_or_else(|| anyhow!("Invalid HuggingFace response: bad vector"));
    }

    items
        .iter()
        .map(|e| {
            json_to_vector(e).ok_or_else(|| {
                anyhow!("Invalid HuggingFace response: expected one pooled vector per input")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: ProviderKind, key: Option<&str>) -> EmbeddingConfig {
        EmbeddingConfig {
            provider,
            api_key: key.map(str::to_string),
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_remote_providers_require_key() {
        for provider in [ProviderKind::HuggingFace, ProviderKind::OpenAI] {
            let err = create_embedder(&config(provider, None)).err().unwrap();
            assert!(matches!(err, KbError::Config(_)), "{}", provider);
        }
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let client = create_embedder(&config(ProviderKind::Ollama, None)).unwrap();
        assert_eq!(
            client.identity(),
            ModelIdentity::new("ollama", crate::config::DEFAULT_OLLAMA_MODEL)
        );
    }

    #[test]
    fn test_identity_uses_configured_model() {
        let mut cfg = config(ProviderKind::OpenAI, Some("sk-test"));
        cfg.model = Some("text-embedding-3-large".into());
        let client = create_embedder(&cfg).unwrap();
        assert_eq!(client.identity().to_string(), "openai:text-embedding-3-large");
    }

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [2.0, 2.0]},
                {"index": 0, "embedding": [1.0, 1.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn test_parse_ollama() {
        let json = serde_json::json!({"embeddings": [[0.5, -0.5]]});
        assert_eq!(parse_ollama_response(&json).unwrap(), vec![vec![0.5, -0.5]]);
        assert!(parse_ollama_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_parse_huggingface_shapes() {
        let batch = serde_json::json!([[0.1, 0.2], [0.3, 0.4]]);
        assert_eq!(parse_huggingface_response(&batch).unwrap().len(), 2);

        let single = serde_json::json!([0.1, 0.2, 0.3]);
        assert_eq!(parse_huggingface_response(&single).unwrap()[0].len(), 3);

        let token_level = serde_json::json!([[[0.1], [0.2]]]);
        assert!(parse_huggingface_response(&token_level).is_err());
    }
}
