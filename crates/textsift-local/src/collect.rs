//! Document-order block collection from parsed HTML.

use crate::score::TextScorer;
use crate::textprep::{boilerplate_ratio, clean_block_text};
use html_scraper::{ElementRef, Html, Selector};
use textsift_core::{Block, ExtractConfig, TagKind};

/// Never visible text: script and style bodies, template contents, ruby annotations.
const NON_TEXT_TAGS: [&str; 5] = ["script", "style", "template", "rt", "rp"];

#[derive(Debug, Clone)]
pub struct BlockCollector {
    tags: Vec<TagKind>,
    exclude_containers: Vec<String>,
    drop_tags: Vec<String>,
    boilerplate_ratio: Option<f64>,
    scorer: TextScorer,
}

impl Default for BlockCollector {
    fn default() -> Self {
        Self::from_config(&ExtractConfig::default())
    }
}

impl BlockCollector {
    pub fn from_config(cfg: &ExtractConfig) -> Self {
        Self {
            tags: cfg.block_tags.clone(),
            exclude_containers: cfg
                .exclude_containers
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .collect(),
            drop_tags: cfg
                .drop_tags
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .collect(),
            boilerplate_ratio: cfg.boilerplate_ratio,
            scorer: TextScorer::from_config(cfg),
        }
    }

    pub fn collect_html(&self, html: &str) -> Vec<Block> {
        let doc = Html::parse_document(html);
        self.collect(&doc)
    }

    /// Walk the body once, in document order, emitting scored blocks.
    ///
    /// A document without a body yields no blocks.
    pub fn collect(&self, doc: &Html) -> Vec<Block> {
        let Some(body) = body_of(doc) else {
            tracing::debug!("no <body> element; nothing to collect");
            return Vec::new();
        };

        let mut blocks = Vec::new();
        // `descendants` starts with the body itself.
        for node in body.descendants().skip(1) {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            let Some(tag) = TagKind::from_tag_name(el.value().name()) else {
                continue;
            };
            if !self.tags.contains(&tag) || self.inside_excluded_container(&el) {
                continue;
            }
            let text = clean_block_text(&self.element_text(&el));
            if text.is_empty() {
                continue;
            }
            if let Some(max) = self.boilerplate_ratio {
                if boilerplate_ratio(&text) > max {
                    tracing::trace!(text = %text, "boilerplate block dropped");
                    continue;
                }
            }
            let depth = el
                .ancestors()
                .filter(|n| n.value().is_element())
                .count();
            let (score, features) = self.scorer.score(&text);
            blocks.push(Block {
                position: blocks.len(),
                tag,
                depth,
                text,
                score,
                features,
                duplicate_reason: None,
                embedding: None,
            });
        }
        tracing::debug!(blocks = blocks.len(), "collected blocks");
        blocks
    }

    fn inside_excluded_container(&self, el: &ElementRef<'_>) -> bool {
        if self.exclude_containers.is_empty() && self.drop_tags.is_empty() {
            return false;
        }
        el.ancestors().filter_map(ElementRef::wrap).any(|a| {
            let name = a.value().name();
            self.exclude_containers.iter().any(|c| c == name)
                || self.drop_tags.iter().any(|d| d == name)
        })
    }

    fn skips_text_of(&self, name: &str) -> bool {
        NON_TEXT_TAGS.contains(&name) || self.drop_tags.iter().any(|d| d == name)
    }

    /// Descendant text nodes, each trimmed, joined by single spaces.
    fn element_text(&self, el: &ElementRef<'_>) -> String {
        let mut parts: Vec<&str> = Vec::new();
        self.push_text(el, &mut parts);
        parts.join(" ")
    }

    fn push_text<'a>(&self, el: &ElementRef<'a>, parts: &mut Vec<&'a str>) {
        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                if self.skips_text_of(child_el.value().name()) {
                    continue;
                }
                self.push_text(&child_el, parts);
            } else if let Some(t) = child.value().as_text() {
                let t: &'a str = t;
                let t = t.trim();
                if !t.is_empty() {
                    parts.push(t);
                }
            }
        }
    }
}

fn body_of(doc: &Html) -> Option<ElementRef<'_>> {
    let sel = Selector::parse("body").ok()?;
    doc.select(&sel).next()
}

/// Collect with the default allow-list, stop words and curves.
pub fn collect_blocks(html: &str) -> Vec<Block> {
    BlockCollector::default().collect_html(html)
}
