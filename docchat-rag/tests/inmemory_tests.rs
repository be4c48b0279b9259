//! Property tests for in-memory vector store search ordering and filtering.

use std::collections::HashMap;

use chrono::Utc;
use docchat_rag::document::{Chunk, ChunkMetadata, EmbeddedChunk};
use docchat_rag::inmemory::InMemoryVectorStore;
use docchat_rag::vectorstore::{DocumentFilter, VectorStore};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an embedded chunk belonging to one of two documents.
fn arb_chunk(dim: usize) -> impl Strategy<Value = EmbeddedChunk> {
    let document = prop_oneof![Just("a.pdf"), Just("b.pdf")];
    ("[a-z]{3,8}", "[a-z ]{5,30}", document, arb_normalized_embedding(dim)).prop_map(
        |(id, content, document, embedding)| EmbeddedChunk {
            chunk: Chunk {
                id,
                content,
                metadata: ChunkMetadata {
                    document_name: document.to_string(),
                    doc_type: "application/pdf".to_string(),
                    size: 100,
                    created_at: Utc::now(),
                },
            },
            embedding,
        },
    )
}

/// For any set of chunks stored in an InMemoryVectorStore, a filtered query
/// returns only chunks of the requested document, ordered by descending
/// cosine similarity, and at most `top_k` of them.
mod prop_inmemory_query {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_filtered_ordered_and_bounded_by_top_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, matching) = rt.block_on(async {
                let store = InMemoryVectorStore::new();

                // Deduplicate chunks by id to avoid upsert overwriting
                let mut deduped: HashMap<String, EmbeddedChunk> = HashMap::new();
                for chunk in &chunks {
                    deduped.entry(chunk.chunk.id.clone()).or_insert_with(|| chunk.clone());
                }
                let unique: Vec<EmbeddedChunk> = deduped.into_values().collect();
                let matching =
                    unique.iter().filter(|c| c.chunk.metadata.document_name == "a.pdf").count();

                store.upsert("test", &unique).await.unwrap();
                let results = store
                    .query("test", &query, &DocumentFilter::document("a.pdf"), top_k)
                    .await
                    .unwrap();
                (results, matching)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), matching.min(top_k));
            prop_assert!(results.iter().all(|r| r.chunk.metadata.document_name == "a.pdf"));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
