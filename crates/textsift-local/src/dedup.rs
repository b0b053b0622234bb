//! First-pass deduplication over live blocks: exact fingerprint, then optional
//! embedding similarity.

use crate::textprep::fingerprint;
use std::collections::HashSet;
use textsift_core::{Block, DuplicateReason, Error, Result};

/// Survivors in input order, plus the blocks dropped (tagged with a reason).
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub kept: Vec<Block>,
    pub dropped: Vec<Block>,
}

/// Drops every block whose fingerprint was already seen. First occurrence wins.
pub fn dedup_fingerprint(blocks: Vec<Block>) -> DedupOutcome {
    let mut seen: HashSet<String> = HashSet::with_capacity(blocks.len());
    let mut out = DedupOutcome::default();
    for mut b in blocks {
        if seen.insert(fingerprint(&b.text)) {
            out.kept.push(b);
        } else {
            b.duplicate_reason = Some(DuplicateReason::Exact);
            out.dropped.push(b);
        }
    }
    out
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Greedy near-duplicate removal.
///
/// A block survives only if its similarity to every previously kept embedding is
/// below `threshold`. Dropped blocks never join the comparison set.
pub fn dedup_semantic(
    blocks: Vec<Block>,
    embeddings: Vec<Vec<f32>>,
    threshold: f64,
) -> Result<DedupOutcome> {
    if blocks.len() != embeddings.len() {
        return Err(Error::EmbeddingUnavailable(format!(
            "expected {} embeddings, got {}",
            blocks.len(),
            embeddings.len()
        )));
    }

    let mut out = DedupOutcome::default();
    for (mut b, emb) in blocks.into_iter().zip(embeddings) {
        let is_dup = out.kept.iter().any(|k| {
            k.embedding
                .as_deref()
                .is_some_and(|kept| cosine_similarity(&emb, kept) as f64 >= threshold)
        });
        if is_dup {
            b.duplicate_reason = Some(DuplicateReason::Semantic);
            out.dropped.push(b);
        } else {
            b.embedding = Some(emb);
            out.kept.push(b);
        }
    }
    Ok(out)
}
