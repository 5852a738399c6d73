use std::collections::BTreeSet;

use crate::utils::normalize::normalize_name_for_comparison;

/// Share of the shorter name's tokens that must appear in the longer one.
pub const TOKEN_OVERLAP_THRESHOLD: f64 = 0.8;

fn tokens(name: &str) -> BTreeSet<&str> {
    name.split_whitespace().collect()
}

/// Overlap of the two token sets relative to the smaller set. Symmetric.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let (a, b) = (tokens(a), tokens(b));
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / smaller as f64
}

/// Whether two free-text names plausibly belong to the same person.
///
/// Exact match, containment in either direction, or a token overlap of at
/// least [`TOKEN_OVERLAP_THRESHOLD`], all after accent, case and parenthetical
/// stripping. Blank names never match.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize_name_for_comparison(a);
    let b = normalize_name_for_comparison(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }
    token_overlap(&a, &b) >= TOKEN_OVERLAP_THRESHOLD
}
