//! Token cost estimation for history accounting.
//!
//! Generators bill by token, not by character, so the history window
//! budgets entries by an approximate token count derived from the word
//! count. The estimate only needs to be stable and monotonic; it is
//! never compared against a real tokenizer.

/// Approximate the token count of a text blob.
///
/// Uses the common ~4 tokens per 3 words heuristic, rounded up.
/// Whitespace-only text costs nothing.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 4).div_ceil(3)
}
