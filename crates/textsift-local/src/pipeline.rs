//! End-to-end driver: collect → score → threshold → fingerprint → [semantic]
//! → records, then the containment pass over the record stream.
//!
//! Every stage consumes its whole input before the next starts. The only await
//! point is the single batched embedding call.

use crate::collect::BlockCollector;
use crate::containment::dedup_keep_longest;
use crate::dedup::{dedup_fingerprint, dedup_semantic};
use crate::records::{read_paragraphs, render_paragraphs, to_jsonl_string};
use crate::threshold::{calibrate_blocks, retain_above};
use serde::Serialize;
use std::io::BufRead;
use textsift_core::{Block, Embedder, Error, ExtractConfig, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub collected: usize,
    pub threshold: f64,
    pub above_threshold: usize,
    pub exact_duplicates: usize,
    /// `None` when the semantic stage did not run.
    pub semantic_threshold: Option<f64>,
    pub semantic_duplicates: usize,
    pub survivors: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub threshold: f64,
    /// Surviving blocks in document order.
    pub blocks: Vec<Block>,
    /// Blocks removed by dedup, tagged with the reason.
    pub dropped: Vec<Block>,
    pub stats: PipelineStats,
}

impl PipelineOutput {
    pub fn to_jsonl(&self) -> Result<String> {
        to_jsonl_string(&self.blocks)
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    cfg: ExtractConfig,
    collector: BlockCollector,
}

impl Pipeline {
    pub fn new(cfg: ExtractConfig) -> Result<Self> {
        cfg.validate()?;
        let collector = BlockCollector::from_config(&cfg);
        Ok(Self { cfg, collector })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.cfg
    }

    /// Collection, threshold filter and fingerprint dedup. Never fails.
    pub fn first_pass(&self, html: &str) -> PipelineOutput {
        let blocks = self.collector.collect_html(html);
        let collected = blocks.len();
        let threshold = calibrate_blocks(&blocks, &self.cfg.threshold);
        let retained = retain_above(blocks, threshold);
        let above_threshold = retained.len();

        let fp = dedup_fingerprint(retained);
        tracing::debug!(
            collected,
            threshold,
            above_threshold,
            exact_duplicates = fp.dropped.len(),
            "first pass done"
        );
        PipelineOutput {
            threshold,
            stats: PipelineStats {
                collected,
                threshold,
                above_threshold,
                exact_duplicates: fp.dropped.len(),
                semantic_threshold: None,
                semantic_duplicates: 0,
                survivors: fp.kept.len(),
            },
            blocks: fp.kept,
            dropped: fp.dropped,
        }
    }

    /// Full live-block pass. With `semantic.enabled`, near duplicates are
    /// removed too, which requires an embedder.
    ///
    /// Embedding failures are returned, not swallowed.
    pub async fn run(&self, html: &str, embedder: Option<&dyn Embedder>) -> Result<PipelineOutput> {
        let sem_cfg = &self.cfg.semantic;
        if !sem_cfg.enabled {
            if embedder.is_some() {
                tracing::debug!("semantic stage disabled; embedder ignored");
            }
            return Ok(self.first_pass(html));
        }
        let Some(embedder) = embedder else {
            return Err(Error::NotConfigured(
                "semantic stage enabled but no embedder was supplied".to_string(),
            ));
        };
        if embedder.model_id() != sem_cfg.model {
            tracing::warn!(
                configured = %sem_cfg.model,
                embedder = embedder.model_id(),
                "embedder model differs from configured model"
            );
        }

        let mut out = self.first_pass(html);

        let candidates = std::mem::take(&mut out.blocks);
        let sim_threshold = sem_cfg.threshold_for(candidates.len());
        let texts: Vec<String> = candidates.iter().map(|b| b.text.clone()).collect();
        let embeddings = embedder.embed(&texts).await.map_err(|e| match e {
            Error::EmbeddingUnavailable(_) => e,
            other => Error::EmbeddingUnavailable(other.to_string()),
        })?;
        let sem = dedup_semantic(candidates, embeddings, sim_threshold)?;
        tracing::debug!(
            model = embedder.model_id(),
            sim_threshold,
            semantic_duplicates = sem.dropped.len(),
            "semantic pass done"
        );

        out.stats.semantic_threshold = Some(sim_threshold);
        out.stats.semantic_duplicates = sem.dropped.len();
        out.stats.survivors = sem.kept.len();
        out.blocks = sem.kept;
        out.dropped.extend(sem.dropped);
        out.dropped.sort_by_key(|b| b.position);
        Ok(out)
    }
}

/// Second pass: read paragraphs back from a record stream and keep the longest
/// representative of each containment cluster.
pub fn finalize<R: BufRead>(records: R) -> Result<Vec<String>> {
    let paragraphs = read_paragraphs(records)?;
    let unique = dedup_keep_longest(&paragraphs);
    tracing::debug!(
        paragraphs = paragraphs.len(),
        unique = unique.len(),
        "containment pass done"
    );
    Ok(unique)
}

pub fn finalize_str(jsonl: &str) -> Result<Vec<String>> {
    finalize(std::io::Cursor::new(jsonl.as_bytes()))
}

/// Both passes, producing `(jsonl, final_text)`.
pub async fn extract_to_strings(
    pipeline: &Pipeline,
    html: &str,
    embedder: Option<&dyn Embedder>,
) -> Result<(PipelineOutput, String, String)> {
    let out = pipeline.run(html, embedder).await?;
    let jsonl = out.to_jsonl()?;
    let paragraphs = finalize_str(&jsonl)?;
    let text = render_paragraphs(&paragraphs);
    Ok((out, jsonl, text))
}
