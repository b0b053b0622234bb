//! Lexical quality scoring.
//!
//! A cheap proxy for "prose vs. chrome": long blocks with sentence-like punctuation
//! and natural stop-word density score high; menus and short labels score low.

use crate::textprep::TERMINAL_PUNCT;
use std::collections::HashSet;
use textsift_core::{ExtractConfig, Features, ScoreCurves, DEFAULT_STOPWORDS};

#[derive(Debug, Clone)]
pub struct TextScorer {
    stopwords: HashSet<String>,
    curves: ScoreCurves,
}

impl Default for TextScorer {
    fn default() -> Self {
        Self::new(
            DEFAULT_STOPWORDS.iter().map(|s| s.to_string()),
            ScoreCurves::default(),
        )
    }
}

impl TextScorer {
    pub fn new(stopwords: impl IntoIterator<Item = String>, curves: ScoreCurves) -> Self {
        let stopwords = stopwords
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { stopwords, curves }
    }

    pub fn from_config(cfg: &ExtractConfig) -> Self {
        Self::new(cfg.stopwords.iter().cloned(), cfg.curves)
    }

    /// Score in [0,1] plus the features it was computed from. Pure.
    pub fn score(&self, text: &str) -> (f64, Features) {
        let words: Vec<&str> = text.split_whitespace().collect();
        let wc = words.len();
        if wc == 0 {
            return (0.0, Features::default());
        }

        let punc_count = text.chars().filter(|c| TERMINAL_PUNCT.contains(c)).count();
        let stop_count = words
            .iter()
            .filter(|w| self.stopwords.contains(&w.to_lowercase()))
            .count();
        let punc = punc_count as f64 / wc as f64;
        let stop = stop_count as f64 / wc as f64;

        let c = &self.curves;
        let score = c.word_count.weight * c.word_count.eval(wc as f64)
            + c.punctuation.weight * c.punctuation.eval(punc)
            + c.stopwords.weight * c.stopwords.eval(stop);
        (score.clamp(0.0, 1.0), Features { wc, punc, stop })
    }
}

/// Score with the default stop words and curves.
pub fn score_text(text: &str) -> (f64, Features) {
    TextScorer::default().score(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_text_scores_zero_with_zero_word_count() {
        let (s, f) = score_text("   \n ");
        assert_eq!(s, 0.0);
        assert_eq!(f.wc, 0);
        assert_eq!(f.punc, 0.0);
        assert_eq!(f.stop, 0.0);
    }

    #[test]
    fn features_are_ratios_over_word_count() {
        let (_, f) = score_text("The cat, the dog.");
        assert_eq!(f.wc, 4);
        assert!((f.punc - 0.5).abs() < 1e-12, "punc={}", f.punc);
        assert!((f.stop - 0.5).abs() < 1e-12, "stop={}", f.stop);
    }

    #[test]
    fn prose_outscores_navigation_labels() {
        let nav = score_text("Home Products Pricing Login");
        let prose = score_text(
            "This is a detailed article about quarterly earnings with many words and proper \
             punctuation, discussing trends. It was written for the readers who have been \
             following the market, and it explains what the numbers mean for the year ahead.",
        );
        assert!(prose.0 > nav.0, "prose={} nav={}", prose.0, nav.0);
        assert!(prose.0 > 0.55, "prose={}", prose.0);
        assert!(nav.0 < 0.25, "nav={}", nav.0);
    }

    #[test]
    fn matches_weighted_logistic_sum() {
        // 40 words, no punctuation, no stop words: word-count term sits at its midpoint.
        let text = vec!["word"; 40].join(" ");
        let (s, _) = score_text(&text);
        let punc_term = 1.0 / (1.0 + (-10.0f64 * (0.0 - 0.05)).exp());
        let stop_term = 1.0 / (1.0 + (-10.0f64 * (0.0 - 0.25)).exp());
        let expected = 0.5 * 0.5 + 0.25 * punc_term + 0.25 * stop_term;
        assert!((s - expected).abs() < 1e-12, "s={s} expected={expected}");
    }

    #[test]
    fn stop_words_match_case_insensitively() {
        let scorer = TextScorer::new(vec!["The".to_string()], ScoreCurves::default());
        let (_, f) = scorer.score("THE the The x");
        assert!((f.stop - 0.75).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_deterministic(text in any::<String>()) {
            let a = score_text(&text);
            let b = score_text(&text);
            prop_assert!(a.0 >= 0.0 && a.0 <= 1.0, "score out of range: {}", a.0);
            prop_assert_eq!(a, b);
        }
    }
}
