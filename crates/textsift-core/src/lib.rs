use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record line {line}: {message}")]
    Serialization { line: usize, message: String },
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Source element kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    P,
    Li,
    Div,
}

impl TagKind {
    pub const ALL: [TagKind; 9] = [
        TagKind::H1,
        TagKind::H2,
        TagKind::H3,
        TagKind::H4,
        TagKind::H5,
        TagKind::H6,
        TagKind::P,
        TagKind::Li,
        TagKind::Div,
    ];

    /// Lowercase HTML tag name.
    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::H1 => "h1",
            TagKind::H2 => "h2",
            TagKind::H3 => "h3",
            TagKind::H4 => "h4",
            TagKind::H5 => "h5",
            TagKind::H6 => "h6",
            TagKind::P => "p",
            TagKind::Li => "li",
            TagKind::Div => "div",
        }
    }

    /// Case-insensitive lookup by HTML tag name.
    pub fn from_tag_name(name: &str) -> Option<Self> {
        let lc = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == lc)
    }

    pub fn heading_level(self) -> Option<u8> {
        match self {
            TagKind::H1 => Some(1),
            TagKind::H2 => Some(2),
            TagKind::H3 => Some(3),
            TagKind::H4 => Some(4),
            TagKind::H5 => Some(5),
            TagKind::H6 => Some(6),
            _ => None,
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lexical features behind a block's score. Kept for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Features {
    /// Word count (whitespace split).
    pub wc: usize,
    /// Punctuation marks per word.
    pub punc: f64,
    /// Fraction of words found in the stop-word set.
    pub stop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateReason {
    Exact,
    Semantic,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::Exact => f.write_str("exact"),
            DuplicateReason::Semantic => f.write_str("semantic"),
        }
    }
}

/// One extracted, scored candidate unit of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub position: usize,
    pub tag: TagKind,
    /// Ancestor count from the document root. Informational only.
    pub depth: usize,
    pub text: String,
    pub score: f64,
    pub features: Features,
    pub duplicate_reason: Option<DuplicateReason>,
    /// Present only on blocks that survived the semantic stage.
    pub embedding: Option<Vec<f32>>,
}

impl Block {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_reason.is_some()
    }

    pub fn to_record(&self) -> SerializedRecord {
        SerializedRecord::from(self)
    }
}

/// Persisted form of a surviving block (one JSON object per line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRecord {
    pub position: usize,
    pub tag: TagKind,
    pub depth: usize,
    pub text: String,
    pub score: f64,
    pub features: Features,
}

impl From<&Block> for SerializedRecord {
    fn from(b: &Block) -> Self {
        Self {
            position: b.position,
            tag: b.tag,
            depth: b.depth,
            text: b.text.clone(),
            score: b.score,
            features: b.features,
        }
    }
}

pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we", "say",
    "her", "she", "or", "an", "will", "my", "one", "all", "would", "there", "their", "what", "so",
    "up", "out", "if", "about", "who", "get", "which", "go", "me", "is", "are", "was", "were",
    "been", "being", "has", "had",
];

/// Container tags treated as page chrome when boilerplate dropping is enabled.
pub const BOILERPLATE_CONTAINERS: &[&str] = &["nav", "header", "footer", "aside", "form"];

/// Elements removed wholesale (no blocks, no text) when boilerplate dropping is enabled.
pub const BOILERPLATE_DROP_TAGS: &[&str] = &["noscript", "svg", "meta", "link"];

/// Cookie/privacy/terms/sign-in matches per word above which a block is chrome.
pub const BOILERPLATE_RATIO: f64 = 0.6;

/// Logistic curve `1 / (1 + e^(-k (x - x0)))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Logistic {
    pub weight: f64,
    pub k: f64,
    pub x0: f64,
}

impl Logistic {
    pub fn eval(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-self.k * (x - self.x0)).exp())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurves {
    pub word_count: Logistic,
    pub punctuation: Logistic,
    pub stopwords: Logistic,
}

impl Default for ScoreCurves {
    fn default() -> Self {
        Self {
            word_count: Logistic {
                weight: 0.50,
                k: 0.10,
                x0: 40.0,
            },
            punctuation: Logistic {
                weight: 0.25,
                k: 10.0,
                x0: 0.05,
            },
            stopwords: Logistic {
                weight: 0.25,
                k: 10.0,
                x0: 0.25,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBounds {
    pub min: f64,
    pub max: f64,
    /// Percentile (0-100) of the sorted score distribution.
    pub percentile: f64,
}

impl Default for ThresholdBounds {
    fn default() -> Self {
        Self {
            min: 0.25,
            max: 0.60,
            percentile: 70.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    pub enabled: bool,
    pub model: String,
    /// Similarity threshold before corpus-size decay.
    pub base: f64,
    /// Upper bound on the decay subtracted from `base`.
    pub decay_cap: f64,
    pub decay_divisor: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "all-minilm".to_string(),
            base: 0.93,
            decay_cap: 0.08,
            decay_divisor: 5000.0,
        }
    }
}

impl SemanticConfig {
    /// Similarity cutoff for a stage that sees `n` blocks.
    pub fn threshold_for(&self, n: usize) -> f64 {
        self.base - self.decay_cap.min(n as f64 / self.decay_divisor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub block_tags: Vec<TagKind>,
    /// Allow-listed elements nested in these containers are skipped.
    pub exclude_containers: Vec<String>,
    /// Subtrees under these tags contribute neither blocks nor text.
    pub drop_tags: Vec<String>,
    /// Drop blocks whose boilerplate-phrase matches per word exceed this ratio.
    pub boilerplate_ratio: Option<f64>,
    pub stopwords: Vec<String>,
    pub curves: ScoreCurves,
    pub threshold: ThresholdBounds,
    pub semantic: SemanticConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            block_tags: TagKind::ALL.to_vec(),
            exclude_containers: Vec::new(),
            drop_tags: Vec::new(),
            boilerplate_ratio: None,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            curves: ScoreCurves::default(),
            threshold: ThresholdBounds::default(),
            semantic: SemanticConfig::default(),
        }
    }
}

impl ExtractConfig {
    /// Enables the chrome filters borrowed from the visible-text extractor.
    pub fn with_boilerplate_dropping(mut self) -> Self {
        self.exclude_containers = BOILERPLATE_CONTAINERS
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.drop_tags = BOILERPLATE_DROP_TAGS.iter().map(|s| s.to_string()).collect();
        self.boilerplate_ratio = Some(BOILERPLATE_RATIO);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.threshold;
        if !(t.min.is_finite() && t.max.is_finite()) || t.min > t.max {
            return Err(Error::InvalidConfig(format!(
                "threshold bounds must satisfy min <= max (got {} > {})",
                t.min, t.max
            )));
        }
        if !(0.0..=100.0).contains(&t.percentile) {
            return Err(Error::InvalidConfig(format!(
                "percentile must be within 0..=100 (got {})",
                t.percentile
            )));
        }
        if self.semantic.decay_divisor.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater) {
            return Err(Error::InvalidConfig(
                "semantic decay_divisor must be > 0".to_string(),
            ));
        }
        let sem = &self.semantic;
        if !sem.base.is_finite() || !(sem.decay_cap.is_finite() && sem.decay_cap >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "semantic base must be finite and decay_cap >= 0 (got {}, {})",
                sem.base, sem.decay_cap
            )));
        }
        if self.semantic.enabled && self.semantic.model.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "semantic stage enabled without a model id".to_string(),
            ));
        }
        if let Some(r) = self.boilerplate_ratio {
            if !(r.is_finite() && r >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "boilerplate_ratio must be >= 0 (got {r})"
                )));
            }
        }
        if self.block_tags.is_empty() {
            return Err(Error::InvalidConfig("block_tags is empty".to_string()));
        }
        Ok(())
    }
}

/// Dense text embedding backend. One batched call per document.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait::async_trait]
impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts).await
    }
}

/// Content-addressed key/value store, injected where caching is wanted.
pub trait ContentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_kind_round_trips_through_json_as_lowercase_name() {
        let v = serde_json::to_value(TagKind::H3).unwrap();
        assert_eq!(v, serde_json::json!("h3"));
        let back: TagKind = serde_json::from_value(serde_json::json!("li")).unwrap();
        assert_eq!(back, TagKind::Li);
        assert_eq!(TagKind::from_tag_name(" DIV "), Some(TagKind::Div));
        assert_eq!(TagKind::from_tag_name("span"), None);
        assert_eq!(TagKind::H6.heading_level(), Some(6));
        assert_eq!(TagKind::P.heading_level(), None);
    }

    #[test]
    fn serialized_record_has_exactly_the_persisted_keys() {
        let b = Block {
            position: 3,
            tag: TagKind::P,
            depth: 4,
            text: "Hello, world.".to_string(),
            score: 0.5,
            features: Features {
                wc: 2,
                punc: 1.0,
                stop: 0.0,
            },
            duplicate_reason: Some(DuplicateReason::Exact),
            embedding: Some(vec![1.0, 0.0]),
        };
        let v = serde_json::to_value(b.to_record()).unwrap();
        let obj = v.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["depth", "features", "position", "score", "tag", "text"]
        );
        assert_eq!(v["tag"], "p");
        assert_eq!(v["features"]["wc"], 2);
    }

    #[test]
    fn semantic_threshold_decays_with_corpus_size_and_caps() {
        let c = SemanticConfig::default();
        assert!((c.threshold_for(0) - 0.93).abs() < 1e-12);
        assert!((c.threshold_for(100) - 0.91).abs() < 1e-12);
        assert!((c.threshold_for(1_000_000) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_inverted_bounds_and_bad_percentile() {
        let mut c = ExtractConfig::default();
        assert!(c.validate().is_ok());
        c.threshold.min = 0.9;
        assert!(matches!(c.validate(), Err(Error::InvalidConfig(_))));
        let mut c = ExtractConfig::default();
        c.threshold.percentile = 120.0;
        assert!(c.validate().is_err());
        let mut c = ExtractConfig::default();
        c.semantic.decay_divisor = 0.0;
        assert!(c.validate().is_err());
        let mut c = ExtractConfig::default();
        c.semantic.decay_cap = -0.1;
        assert!(c.validate().is_err());
        let mut c = ExtractConfig::default();
        c.semantic.enabled = true;
        c.semantic.model = " ".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn boilerplate_dropping_sets_container_filters() {
        let c = ExtractConfig::default().with_boilerplate_dropping();
        assert!(c.exclude_containers.iter().any(|s| s == "nav"));
        assert!(c.drop_tags.iter().any(|s| s == "svg"));
        assert_eq!(c.boilerplate_ratio, Some(0.6));
        assert_eq!(DEFAULT_STOPWORDS.len(), 58);
    }
}
