//! Word-budgeted preview of a paragraph list.

/// Extra words allowed past the budget when looking for a sentence boundary.
pub const SENTENCE_SLACK_WORDS: usize = 30;

/// Emit paragraphs until `limit` words have been written.
///
/// The paragraph that would overflow is cut at the last `". "` inside the first
/// `remaining + 30` words; without one it is hard-cut at `remaining` words.
/// Nothing is emitted after the cut.
pub fn truncate_to_word_budget<S: AsRef<str>>(paragraphs: &[S], limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut used = 0usize;
    for p in paragraphs {
        let remaining = limit.saturating_sub(used);
        if remaining == 0 {
            break;
        }
        let words: Vec<&str> = p.as_ref().split_whitespace().collect();
        if words.len() <= remaining {
            used += words.len();
            out.push(p.as_ref().to_string());
            continue;
        }

        let window = words[..words.len().min(remaining + SENTENCE_SLACK_WORDS)].join(" ");
        match window.rfind(". ") {
            Some(i) => out.push(window[..i + 1].trim().to_string()),
            None => out.push(words[..remaining].join(" ")),
        }
        break;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_within_budget_pass_through() {
        let out = truncate_to_word_budget(&["a b c", "d e"], 10);
        assert_eq!(out, vec!["a b c".to_string(), "d e".to_string()]);
    }

    #[test]
    fn overflowing_paragraph_is_cut_at_last_sentence_boundary() {
        let out = truncate_to_word_budget(&["one two", "Three four. Five six. Seven eight"], 4);
        assert_eq!(out, vec!["one two".to_string(), "Three four. Five six.".to_string()]);
    }

    #[test]
    fn boundary_search_only_looks_slack_words_ahead() {
        let mut words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        words[35] = "end.".to_string();
        let para = words.join(" ");
        // remaining=2 -> window of 32 words, the period at word 35 is out of reach.
        let out = truncate_to_word_budget(&[para.as_str()], 2);
        assert_eq!(out, vec!["w0 w1".to_string()]);
    }

    #[test]
    fn stops_after_the_cut_paragraph() {
        let out = truncate_to_word_budget(&["a b c d", "never"], 2);
        assert_eq!(out, vec!["a b".to_string()]);
    }

    #[test]
    fn zero_budget_emits_nothing() {
        assert!(truncate_to_word_budget(&["a"], 0).is_empty());
    }
}
