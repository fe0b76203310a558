//! Fuzzy product-name resolution.
//!
//! Exact case-insensitive match wins outright; otherwise the candidate
//! with the highest edit-distance ratio is accepted when it clears the
//! threshold. Ties keep the first candidate in input order, so resolution
//! is deterministic for a fixed catalog.

use mesa_common::Product;

/// Minimum similarity score (0-100) to accept a fuzzy match.
pub const MATCH_THRESHOLD: u32 = 70;

/// Resolve a spoken/typed item name against the candidate list.
pub fn resolve<'a>(query: &str, candidates: &'a [Product]) -> Option<&'a Product> {
    // Exact match short-circuits without scoring
    if let Some(exact) = candidates.iter().find(|p| p.name_matches(query)) {
        return Some(exact);
    }

    let mut best: Option<(&Product, u32)> = None;
    for candidate in candidates {
        let score = similarity(query, &candidate.name);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }

    match best {
        Some((product, score)) if score >= MATCH_THRESHOLD => Some(product),
        _ => None,
    }
}

/// Normalized similarity: 100 minus the Levenshtein distance as a share
/// of the longer string. Case-insensitive.
pub fn similarity(a: &str, b: &str) -> u32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }
    let dist = levenshtein(&a, &b);
    (100.0 * (1.0 - dist as f64 / max_len as f64)).round() as u32
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, &ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}
