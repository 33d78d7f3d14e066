//! Confidence math for the two match passes.

use std::collections::BTreeSet;

/// Exact-pass confidence: the band `[0.9, 1.0]`, scaled by the length ratio
/// of the contained text to the longer side. Equality scores 1.0.
#[must_use]
pub fn exact_confidence(contained_len: usize, longer_len: usize) -> f64 {
    debug_assert!(contained_len <= longer_len);
    if longer_len == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = contained_len as f64 / longer_len as f64;
    0.9 + 0.1 * ratio
}

/// Jaccard similarity of two token sets.
///
/// Self-similarity is exactly 1.0 and disjoint sets score exactly 0.0. Two
/// empty sets count as identical.
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let similarity = intersection as f64 / union as f64;
    similarity
}

/// Rescale a similarity from `[floor, 1.0]` onto `[floor, ceiling]` so fuzzy
/// confidences stay strictly below the exact band.
#[must_use]
pub fn fuzzy_confidence(similarity: f64, floor: f64, ceiling: f64) -> f64 {
    debug_assert!(floor < ceiling && ceiling < 0.9);
    if similarity <= floor {
        return floor;
    }
    floor + (similarity - floor) * (ceiling - floor) / (1.0 - floor)
}
