//! Signature extraction: matchable fingerprints derived from symptom text.
//!
//! Both fingerprints are pure functions of the entry text, computed once at
//! load time. The same normalization rules are applied to incoming queries
//! so matching compares like with like.

use crate::types::Signature;
use std::collections::BTreeSet;

const MIN_TOKEN_LEN: usize = 2;
const MIN_HEX_LEN: usize = 6;

/// Collapse runs of whitespace to single spaces and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized form used for exact-substring containment matching.
#[must_use]
pub fn normalize_exact(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Words carrying filesystem paths are variable per machine and never
/// discriminative, so they are dropped before tokenization.
#[must_use]
fn looks_path_like(word: &str) -> bool {
    (word.contains('/') || word.contains('\\'))
        && word.chars().any(|c| c.is_ascii_alphanumeric())
}

#[must_use]
fn is_numeric(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
}

/// Container ids, commit hashes and similar hex blobs. Requires at least one
/// decimal digit so ordinary words spelled from a-f survive.
#[must_use]
fn is_hex_like(token: &str) -> bool {
    token.len() >= MIN_HEX_LEN
        && token.chars().all(|c| c.is_ascii_hexdigit())
        && token.chars().any(|c| c.is_ascii_digit())
}

/// Split text into the normalized token set used for fuzzy matching.
///
/// Path-like words are dropped whole; the rest is split on non-alphanumeric
/// boundaries, lowercased, and stripped of numeric and hex-looking tokens.
#[must_use]
pub fn token_set(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for word in text.split_whitespace() {
        if looks_path_like(word) {
            continue;
        }
        for raw in word.split(|c: char| !c.is_alphanumeric()) {
            let token = raw.to_lowercase();
            if token.len() < MIN_TOKEN_LEN {
                continue;
            }
            if is_numeric(&token) || is_hex_like(&token) {
                continue;
            }
            tokens.insert(token);
        }
    }
    tokens
}

/// Derive both fingerprints for one entry.
#[must_use]
pub fn extract(title: &str, symptom_excerpt: &str) -> Signature {
    let primary = collapse_whitespace(symptom_excerpt);
    let primary_match = primary.to_lowercase();
    let mut tokens = token_set(&primary);
    tokens.extend(token_set(title));
    Signature {
        primary,
        primary_match,
        tokens,
    }
}
