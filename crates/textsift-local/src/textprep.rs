//! Minimal, deterministic text normalization helpers.
//!
//! Three distinct normal forms live here:
//! - `clean_block_text`: display text stored on a block
//! - `fingerprint`: exact-duplicate key (punctuation removed, lowercase)
//! - `containment_key`: second-pass key (punctuation as separator, lowercase)
//!
//! plus `boilerplate_ratio` for the cookie/legal/sign-in chrome filter.

use regex::Regex;
use std::sync::LazyLock;

static BOILERPLATE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cookie(?:s| consent)|privacy|terms|sign\s*in)\b")
        .expect("valid boilerplate phrase regex")
});

/// Punctuation that never carries a leading space in block text.
pub const TERMINAL_PUNCT: [char; 6] = [',', '.', '!', '?', ';', ':'];

/// Regex-style `\w`: alphanumeric or underscore.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace, then drop the space before terminal punctuation.
///
/// `"Hello ,  world !"` becomes `"Hello, world!"`.
pub fn clean_block_text(s: &str) -> String {
    let collapsed = norm_ws(s);
    let mut out = String::with_capacity(collapsed.len());
    for ch in collapsed.chars() {
        if TERMINAL_PUNCT.contains(&ch) && out.ends_with(' ') {
            out.pop();
        }
        out.push(ch);
    }
    out
}

/// Lowercase and strip everything that is neither a word char nor whitespace.
/// Whitespace is kept as-is.
pub fn fingerprint(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect()
}

/// Lowercase, turn punctuation into separators, collapse whitespace.
pub fn containment_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for ch in s.to_lowercase().chars() {
        if is_word_char(ch) {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Boilerplate phrase matches per whitespace-separated word (0 for blank text).
pub fn boilerplate_ratio(s: &str) -> f64 {
    let words = s.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }
    BOILERPLATE_PHRASE.find_iter(s).count() as f64 / words as f64
}
