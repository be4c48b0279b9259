//! Contract tests for the OpenAI and Pinecone HTTP clients against a local
//! axum server.

#![cfg(all(feature = "openai", feature = "pinecone"))]

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use docchat_rag::{
    Chunk, ChunkMetadata, DocumentFilter, EmbeddedChunk, EmbeddingInput, EmbeddingProvider,
    GenerationRequest, OpenAIChatClient, OpenAIEmbeddingProvider, PineconeSettings,
    PineconeVectorStore, RagError, TextGenerator, VectorStore,
};
use serde_json::{Value, json};

#[derive(Default)]
struct Recorded {
    requests: Mutex<Vec<(String, HeaderMap, Value)>>,
    vectors: Mutex<Vec<Value>>,
}

impl Recorded {
    fn record(&self, path: &str, headers: HeaderMap, body: Value) {
        self.requests.lock().unwrap().push((path.to_string(), headers, body));
    }

    fn paths(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(p, _, _)| p.clone()).collect()
    }
}

type Shared = State<Arc<Recorded>>;

async fn spawn(router: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server run");
    });
    (format!("http://{addr}"), handle)
}

// ── OpenAI mock ────────────────────────────────────────────────────

async fn embeddings(
    State(rec): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let bearer = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default();
    if bearer != "Bearer sk-test" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "Incorrect API key provided" } })),
        );
    }
    let inputs: Vec<String> = serde_json::from_value(body["input"].clone()).unwrap_or_default();
    rec.record("/v1/embeddings", headers, body);

    // Reverse the order; pairing must rely on `index`.
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| json!({ "index": index, "embedding": [text.len() as f32, 1.0] }))
        .collect();
    (StatusCode::OK, Json(json!({ "data": data })))
}

async fn chat(
    State(rec): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    rec.record("/v1/chat/completions", headers, body);
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "The sky is blue." } }]
    }))
}

fn openai_router(rec: Arc<Recorded>) -> Router {
    Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat))
        .with_state(rec)
}

#[tokio::test]
async fn embeddings_are_paired_by_response_index() {
    let rec = Arc::new(Recorded::default());
    let (base, handle) = spawn(openai_router(rec.clone())).await;

    let provider =
        OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(format!("{base}/v1"));
    let inputs = [
        EmbeddingInput { id: "doc-0", text: "a" },
        EmbeddingInput { id: "doc-1", text: "bbb" },
        EmbeddingInput { id: "doc-2", text: "cc" },
    ];
    let mut embeddings = provider.embed_batch(&inputs).await.unwrap();
    embeddings.sort_by(|a, b| a.id.cmp(&b.id));

    let lengths: Vec<(String, f32)> = embeddings.into_iter().map(|e| (e.id, e.vector[0])).collect();
    assert_eq!(
        lengths,
        vec![("doc-0".into(), 1.0), ("doc-1".into(), 3.0), ("doc-2".into(), 2.0)]
    );

    let requests = rec.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].2["model"], "text-embedding-ada-002");
    assert_eq!(requests[0].2["input"], json!(["a", "bbb", "cc"]));

    handle.abort();
}

#[tokio::test]
async fn rejected_key_is_an_auth_error() {
    let rec = Arc::new(Recorded::default());
    let (base, handle) = spawn(openai_router(rec)).await;

    let provider =
        OpenAIEmbeddingProvider::new("sk-wrong").unwrap().with_base_url(format!("{base}/v1"));
    let err = provider.embed("hello").await.unwrap_err();
    match err {
        RagError::Auth { message, .. } => assert!(message.contains("Incorrect API key")),
        other => panic!("expected auth error, got {other}"),
    }

    handle.abort();
}

#[tokio::test]
async fn chat_request_uses_fixed_sampling_parameters() {
    let rec = Arc::new(Recorded::default());
    let (base, handle) = spawn(openai_router(rec.clone())).await;

    let client = OpenAIChatClient::new("sk-test").unwrap().with_base_url(format!("{base}/v1"));
    let request =
        GenerationRequest::answer("What colour is the sky?", "The sky is blue.", "gpt-4o-mini");
    let answer = client.generate(&request).await.unwrap();
    assert_eq!(answer, "The sky is blue.");

    let requests = rec.requests.lock().unwrap();
    let body = &requests[0].2;
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(body["max_tokens"], 500);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert!(body["messages"][1]["content"].as_str().unwrap().contains("The sky is blue."));

    handle.abort();
}

#[tokio::test]
async fn unreachable_service_is_an_upstream_error() {
    let client = OpenAIChatClient::new("sk-test").unwrap().with_base_url("http://127.0.0.1:1/v1");
    let request = GenerationRequest::answer("q", "c", "gpt-4o-mini");
    assert!(client.generate(&request).await.unwrap_err().is_upstream());
}

// ── Pinecone mock ──────────────────────────────────────────────────

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("api-key").and_then(|v| v.to_str().ok()) == Some("pc-test")
}

async fn describe_index(Path(name): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    // The host is filled in by the test through the `Host` header.
    let host = headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    (StatusCode::OK, Json(json!({ "name": name, "host": format!("http://{host}") })))
}

async fn delete_vectors(
    State(rec): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let namespace = body["namespace"].as_str().unwrap_or_default().to_string();
    rec.record("/vectors/delete", headers, body);
    let mut vectors = rec.vectors.lock().unwrap();
    if vectors.is_empty() {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Namespace not found" })));
    }
    vectors.retain(|v| v["namespace"] != namespace.as_str());
    (StatusCode::OK, Json(json!({})))
}

async fn upsert_vectors(
    State(rec): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let namespace = body["namespace"].clone();
    let mut count = 0;
    for vector in body["vectors"].as_array().cloned().unwrap_or_default() {
        let mut vector = vector;
        vector["namespace"] = namespace.clone();
        rec.vectors.lock().unwrap().push(vector);
        count += 1;
    }
    rec.record("/vectors/upsert", headers, body);
    (StatusCode::OK, Json(json!({ "upsertedCount": count })))
}

async fn query_vectors(
    State(rec): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    let wanted = body["filter"]["documentName"]["$eq"].clone();
    let top_k = body["topK"].as_u64().unwrap_or(10) as usize;
    let matches: Vec<Value> = rec
        .vectors
        .lock()
        .unwrap()
        .iter()
        .filter(|v| v["namespace"] == body["namespace"])
        .filter(|v| wanted.is_null() || v["metadata"]["documentName"] == wanted)
        .take(top_k)
        .enumerate()
        .map(|(rank, v)| {
            let mut metadata = v["metadata"].clone();
            // Pinecone hands numbers back as floats.
            metadata["size"] = json!(metadata["size"].as_f64());
            json!({ "id": v["id"], "score": 0.9 - rank as f64 * 0.1, "metadata": metadata })
        })
        .collect();
    rec.record("/query", headers, body);
    (StatusCode::OK, Json(json!({ "matches": matches, "namespace": "docs" })))
}

fn pinecone_router(rec: Arc<Recorded>) -> Router {
    Router::new()
        .route("/indexes/{name}", get(describe_index))
        .route("/vectors/delete", post(delete_vectors))
        .route("/vectors/upsert", post(upsert_vectors))
        .route("/query", post(query_vectors))
        .with_state(rec)
}

fn embedded(id: &str, document: &str, content: &str) -> EmbeddedChunk {
    EmbeddedChunk {
        chunk: Chunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata {
                document_name: document.to_string(),
                doc_type: "application/pdf".to_string(),
                size: 1024,
                created_at: Utc::now(),
            },
        },
        embedding: vec![0.1, 0.2, 0.3],
    }
}

fn settings(api_key: &str, index_host: Option<String>) -> PineconeSettings {
    PineconeSettings {
        api_key: api_key.to_string(),
        index_name: "docs-index".to_string(),
        index_host,
        namespace: "docs".to_string(),
    }
}

#[tokio::test]
async fn pinecone_round_trip_with_resolved_host() {
    let rec = Arc::new(Recorded::default());
    let (base, handle) = spawn(pinecone_router(rec.clone())).await;

    let store = PineconeVectorStore::new(&settings("pc-test", None))
        .unwrap()
        .with_control_plane_url(&base);

    // Deleting an unknown namespace is not an error.
    store.delete_namespace("docs").await.unwrap();

    store
        .upsert(
            "docs",
            &[
                embedded("a.pdf-0", "a.pdf", "first"),
                embedded("b.pdf-0", "b.pdf", "other"),
                embedded("a.pdf-1", "a.pdf", "second"),
            ],
        )
        .await
        .unwrap();

    let results =
        store.query("docs", &[0.1, 0.2, 0.3], &DocumentFilter::document("a.pdf"), 2).await.unwrap();
    let contents: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second"]);
    assert_eq!(results[0].chunk.metadata.size, 1024);
    assert!(results[0].score > results[1].score);

    assert_eq!(rec.paths(), vec!["/vectors/delete", "/vectors/upsert", "/query"]);
    let requests = rec.requests.lock().unwrap();
    assert_eq!(requests[0].2, json!({ "deleteAll": true, "namespace": "docs" }));
    assert_eq!(requests[2].2["filter"], json!({ "documentName": { "$eq": "a.pdf" } }));
    assert_eq!(requests[2].2["includeMetadata"], true);

    handle.abort();
}

#[tokio::test]
async fn pinecone_rejected_key_is_an_auth_error() {
    let rec = Arc::new(Recorded::default());
    let (base, handle) = spawn(pinecone_router(rec)).await;

    let store = PineconeVectorStore::new(&settings("pc-wrong", Some(base))).unwrap();
    let err = store.upsert("docs", &[embedded("a-0", "a", "x")]).await.unwrap_err();
    assert!(matches!(err, RagError::Auth { .. }), "{err}");

    handle.abort();
}

#[tokio::test]
async fn non_ascii_chunk_ids_are_encoded_for_pinecone() {
    let rec = Arc::new(Recorded::default());
    let (base, handle) = spawn(pinecone_router(rec.clone())).await;

    let store = PineconeVectorStore::new(&settings("pc-test", Some(base))).unwrap();
    store.upsert("docs", &[embedded("résumé.pdf-0", "résumé.pdf", "skills")]).await.unwrap();

    let stored_id = rec.vectors.lock().unwrap()[0]["id"].as_str().unwrap().to_string();
    assert!(stored_id.is_ascii());
    assert_eq!(stored_id, "r%C3%A9sum%C3%A9.pdf-0");

    let results = store
        .query("docs", &[0.1, 0.2, 0.3], &DocumentFilter::document("résumé.pdf"), 1)
        .await
        .unwrap();
    assert_eq!(results[0].chunk.id, "résumé.pdf-0");
    assert_eq!(results[0].chunk.metadata.document_name, "résumé.pdf");

    handle.abort();
}
