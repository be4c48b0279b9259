//! Keyword-overlap context selection.
//!
//! This is the fallback used when no vector store is configured or the
//! vector path fails. It is a lexical heuristic: recall and precision are both
//! low, and it is only meant to keep question answering usable without
//! embeddings.

use crate::document::Document;

/// Maximum number of matching sentences returned.
pub const MAX_SENTENCES: usize = 2;

/// Number of leading characters returned when no sentence matches.
pub const FALLBACK_PREFIX_CHARS: usize = 500;

/// Marker appended to the leading-characters fallback.
pub const ELLIPSIS: &str = "...";

fn sentences(content: &str) -> impl Iterator<Item = &str> {
    content.split(['.', '!', '?']).map(str::trim).filter(|s| !s.is_empty())
}

/// Select the part of `document` most likely relevant to `query`.
///
/// The query is lower-cased and split on whitespace. The content is split into
/// sentences on `.`, `!` and `?`. Sentences containing every query word are
/// preferred; if there are none, sentences containing any query word are used.
/// Matching is a case-insensitive substring test. The first two selected
/// sentences are joined with `". "` and terminated with `"."`.
///
/// When nothing matches, the first 500 characters of the content are returned
/// followed by `"..."`.
///
/// # Example
///
/// ```rust
/// use docchat_rag::{Document, context::select_context};
///
/// let doc = Document::new(
///     "pets.pdf",
///     "Cats are mammals. Dogs are mammals too. The sky is blue.",
///     0,
///     "application/pdf",
/// );
/// assert_eq!(select_context("dogs mammals", &doc), "Dogs are mammals too.");
/// ```
pub fn select_context(query: &str, document: &Document) -> String {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();

    if !words.is_empty() {
        let candidates: Vec<(&str, usize)> = sentences(&document.content)
            .map(|sentence| {
                let lower = sentence.to_lowercase();
                let hits = words.iter().filter(|w| lower.contains(*w)).count();
                (sentence, hits)
            })
            .filter(|(_, hits)| *hits > 0)
            .collect();

        let all_words: Vec<&str> = candidates
            .iter()
            .filter(|(_, hits)| *hits == words.len())
            .map(|(s, _)| *s)
            .take(MAX_SENTENCES)
            .collect();

        let selected = if all_words.is_empty() {
            candidates.iter().map(|(s, _)| *s).take(MAX_SENTENCES).collect()
        } else {
            all_words
        };

        if !selected.is_empty() {
            return format!("{}.", selected.join(". "));
        }
    }

    let prefix: String = document.content.chars().take(FALLBACK_PREFIX_CHARS).collect();
    format!("{prefix}{ELLIPSIS}")
}
