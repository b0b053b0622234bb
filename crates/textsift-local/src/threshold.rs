//! Corpus-adaptive keep/drop cutoff.

use textsift_core::{Block, ThresholdBounds};

/// Score at the configured percentile of `scores`, clamped into `[min, max]`.
///
/// Empty input yields `min`.
pub fn calibrate(scores: &[f64], bounds: &ThresholdBounds) -> f64 {
    if scores.is_empty() {
        return bounds.min;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = (sorted.len() as f64 * bounds.percentile / 100.0).floor() as usize;
    let idx = idx.min(sorted.len() - 1);
    sorted[idx].clamp(bounds.min, bounds.max)
}

pub fn calibrate_blocks(blocks: &[Block], bounds: &ThresholdBounds) -> f64 {
    let scores: Vec<f64> = blocks.iter().map(|b| b.score).collect();
    calibrate(&scores, bounds)
}

/// Keeps blocks with `score >= threshold`, in order.
pub fn retain_above(blocks: Vec<Block>, threshold: f64) -> Vec<Block> {
    blocks.into_iter().filter(|b| b.score >= threshold).collect()
}
