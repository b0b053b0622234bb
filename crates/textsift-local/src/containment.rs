//! Second-pass deduplication: keep the longest representative of each
//! containment cluster.
//!
//! Candidates are decided longest-first (by normalized length), so a short
//! fragment embedded in a longer accepted paragraph is dropped. Output keeps the
//! original relative order of the survivors.

use crate::textprep::containment_key;

/// Indices (ascending) of paragraphs that survive containment dedup.
pub fn surviving_indices<S: AsRef<str>>(paragraphs: &[S]) -> Vec<usize> {
    let mut items: Vec<(usize, String, usize)> = paragraphs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let key = containment_key(p.as_ref());
            let len = key.chars().count();
            (i, key, len)
        })
        .collect();
    // Stable: equal lengths keep input order.
    items.sort_by(|a, b| b.2.cmp(&a.2));

    let mut accepted: Vec<String> = Vec::new();
    let mut kept: Vec<usize> = Vec::new();
    for (idx, key, _) in items {
        if accepted.iter().any(|longer| longer.contains(key.as_str())) {
            continue;
        }
        accepted.push(key);
        kept.push(idx);
    }
    kept.sort_unstable();
    kept
}

/// Original (non-normalized) survivors, in input order.
pub fn dedup_keep_longest<S: AsRef<str>>(paragraphs: &[S]) -> Vec<String> {
    surviving_indices(paragraphs)
        .into_iter()
        .map(|i| paragraphs[i].as_ref().to_string())
        .collect()
}
