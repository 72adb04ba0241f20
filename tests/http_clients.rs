//! HTTP-level tests for the page fetcher and embedding providers against
//! a local mock server.

use kb_index::config::{EmbeddingConfig, ProviderKind};
use kb_index::embedding::create_embedder;
use kb_index::ingest::{Fetcher, HttpFetcher};
use kb_index::{Embedder, KbError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedding_config(provider: ProviderKind, base_url: String, key: Option<&str>) -> EmbeddingConfig {
    EmbeddingConfig {
        provider,
        model: Some("test-model".into()),
        base_url: Some(base_url),
        api_key: key.map(str::to_string),
        max_retries: 0,
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_fetcher_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Hi</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let body = fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
    assert_eq!(body, "<h1>Hi</h1>");
}

#[tokio::test]
async fn test_fetcher_maps_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/gone", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::Fetch(_)));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_fetcher_rejects_non_http_urls() {
    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    for url in ["file:///etc/passwd", "not a url"] {
        let err = fetcher.fetch(url).await.unwrap_err();
        assert!(matches!(err, KbError::InvalidInput(_)), "{}", url);
    }
}

#[tokio::test]
async fn test_ollama_embeds_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.25], [1.5, 2.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_embedder(&embedding_config(ProviderKind::Ollama, server.uri(), None)).unwrap();
    assert_eq!(client.identity().to_string(), "ollama:test-model");

    let vectors = client
        .embed_documents(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![0.5, 0.25], vec![1.5, 2.0]]);
}

#[tokio::test]
async fn test_openai_orders_by_index_and_sends_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [2.0] },
                { "index": 0, "embedding": [1.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_embedder(&embedding_config(
        ProviderKind::OpenAI,
        server.uri(),
        Some("sk-test"),
    ))
    .unwrap();
    let vectors = client
        .embed_documents(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
}

#[tokio::test]
async fn test_huggingface_query_accepts_bare_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-model/pipeline/feature-extraction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.5, 0.25])))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_embedder(&embedding_config(
        ProviderKind::HuggingFace,
        server.uri(),
        Some("hf-test"),
    ))
    .unwrap();
    let vector = client.embed_query("hello").await.unwrap();
    assert_eq!(vector, vec![0.5, 0.25]);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = embedding_config(ProviderKind::OpenAI, server.uri(), Some("sk-bad"));
    config.max_retries = 3;
    let client = create_embedder(&config).unwrap();

    let err = client.embed_query("hello").await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_vector_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
        .mount(&server)
        .await;

    let client = create_embedder(&embedding_config(ProviderKind::Ollama, server.uri(), None)).unwrap();
    let err = client
        .embed_documents(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("1 vectors for 2 inputs"));
}
