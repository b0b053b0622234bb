//! JSONL record stream and final text rendering.

use std::io::{BufRead, Write};
use textsift_core::{Block, Error, Result, SerializedRecord};

/// One JSON object per line; no trailing newline. An empty corpus writes nothing.
pub fn write_jsonl<W: Write>(mut w: W, blocks: &[Block]) -> Result<()> {
    for (i, b) in blocks.iter().enumerate() {
        if i > 0 {
            w.write_all(b"\n")?;
        }
        let line = serde_json::to_vec(&SerializedRecord::from(b)).map_err(|e| {
            Error::Serialization {
                line: i + 1,
                message: e.to_string(),
            }
        })?;
        w.write_all(&line)?;
    }
    w.flush()?;
    Ok(())
}

pub fn to_jsonl_string(blocks: &[Block]) -> Result<String> {
    let mut buf = Vec::new();
    write_jsonl(&mut buf, blocks)?;
    String::from_utf8(buf).map_err(|e| Error::Serialization {
        line: 0,
        message: e.to_string(),
    })
}

/// Full records, for callers that need more than the text.
pub fn read_records<R: BufRead>(r: R) -> Result<Vec<SerializedRecord>> {
    let mut out = Vec::new();
    for (i, line) in r.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec = serde_json::from_str(&line).map_err(|e| Error::Serialization {
            line: i + 1,
            message: e.to_string(),
        })?;
        out.push(rec);
    }
    Ok(out)
}

/// Paragraph texts in stream order.
///
/// Records without a usable `text` (missing, null, non-string, blank) are skipped.
pub fn read_paragraphs<R: BufRead>(r: R) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for (i, line) in r.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let v: serde_json::Value =
            serde_json::from_str(&line).map_err(|e| Error::Serialization {
                line: i + 1,
                message: e.to_string(),
            })?;
        match v.get("text").and_then(|t| t.as_str()).map(str::trim) {
            Some(t) if !t.is_empty() => out.push(t.to_string()),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "records without usable text");
    }
    Ok(out)
}

/// Each paragraph followed by a blank line.
pub fn render_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> String {
    let mut out = String::new();
    for p in paragraphs {
        out.push_str(p.as_ref());
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use textsift_core::{Features, TagKind};

    fn block(position: usize, text: &str) -> Block {
        Block {
            position,
            tag: TagKind::Li,
            depth: 5,
            text: text.to_string(),
            score: 0.42,
            features: Features {
                wc: 3,
                punc: 0.25,
                stop: 0.5,
            },
            duplicate_reason: None,
            embedding: Some(vec![0.1, 0.2]),
        }
    }

    #[test]
    fn empty_corpus_writes_zero_bytes() {
        assert_eq!(to_jsonl_string(&[]).unwrap(), "");
        assert_eq!(render_paragraphs::<&str>(&[]), "");
    }

    #[test]
    fn one_line_per_block_without_embedding() {
        let s = to_jsonl_string(&[block(0, "a"), block(4, "b")]).unwrap();
        let lines: Vec<&str> = s.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(!s.ends_with('\n'));
        assert!(!s.contains("embedding"));
        let v: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(v["position"], 4);
        assert_eq!(v["tag"], "li");
        assert_eq!(v["depth"], 5);
    }

    #[test]
    fn text_survives_round_trip_bit_for_bit() {
        let text = "Quotes \"here\", tabs\tand unicode: café — ok!";
        let s = to_jsonl_string(&[block(0, text)]).unwrap();
        let paras = read_paragraphs(Cursor::new(s.as_bytes())).unwrap();
        assert_eq!(paras, vec![text.to_string()]);

        let recs = read_records(Cursor::new(s.as_bytes())).unwrap();
        assert_eq!(recs[0], block(0, text).to_record());
    }

    #[test]
    fn records_without_usable_text_are_skipped() {
        let input = concat!(
            "{\"position\":0,\"text\":\"kept\"}\n",
            "{\"position\":1}\n",
            "\n",
            "{\"position\":2,\"text\":null}\n",
            "{\"position\":3,\"text\":42}\n",
            "{\"position\":4,\"text\":\"   \"}\n",
            "{\"position\":5,\"text\":\"  also kept \"}",
        );
        let paras = read_paragraphs(Cursor::new(input)).unwrap();
        assert_eq!(paras, vec!["kept".to_string(), "also kept".to_string()]);
    }

    #[test]
    fn malformed_lines_report_their_line_number() {
        let err = read_paragraphs(Cursor::new("{\"text\":\"ok\"}\nnot json\n")).unwrap_err();
        match err {
            Error::Serialization { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn render_separates_paragraphs_with_blank_lines() {
        assert_eq!(render_paragraphs(&["one", "two"]), "one\n\ntwo\n\n");
    }
}
