//! Match highlighting
//!
//! Wraps every case-insensitive occurrence of each query term in a pair of
//! tags. Long values are cut to a snippet centred on the first match.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::store::Document;

const ELLIPSIS: &str = "...";

#[derive(Debug)]
pub struct Highlighter {
    pattern: Option<Regex>,
    pre_tag: String,
    post_tag: String,
    snippet_length: usize,
}

impl Highlighter {
    /// `terms` are matched literally, longest first so that overlapping
    /// terms prefer the longer match.
    pub fn new(terms: &[String], pre_tag: &str, post_tag: &str, snippet_length: usize) -> Self {
        let mut terms: Vec<&String> = terms.iter().filter(|t| !t.is_empty()).collect();
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
            Regex::new(&format!("(?i){}", alternation)).ok()
        };
        Self {
            pattern,
            pre_tag: pre_tag.to_string(),
            post_tag: post_tag.to_string(),
            snippet_length: snippet_length.max(1),
        }
    }

    /// Highlighted snippet of `text`, or `None` when no term occurs.
    pub fn highlight(&self, text: &str) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        let first = pattern.find(text)?;
        let (window, cut_start, cut_end) = self.window(text, first.start(), first.end());

        let mut out = String::with_capacity(window.len() + 32);
        if cut_start {
            out.push_str(ELLIPSIS);
        }
        let mut last = 0;
        for found in pattern.find_iter(window) {
            out.push_str(&window[last..found.start()]);
            out.push_str(&self.pre_tag);
            out.push_str(found.as_str());
            out.push_str(&self.post_tag);
            last = found.end();
        }
        out.push_str(&window[last..]);
        if cut_end {
            out.push_str(ELLIPSIS);
        }
        Some(out)
    }

    /// Snippet-length slice of `text` around the byte range of the first
    /// match, on char boundaries.
    fn window<'t>(&self, text: &'t str, match_start: usize, match_end: usize) -> (&'t str, bool, bool) {
        let total = text.chars().count();
        if total <= self.snippet_length {
            return (text, false, false);
        }
        let match_chars = text[match_start..match_end].chars().count();
        let start_char = text[..match_start].chars().count();
        let lead = self.snippet_length.saturating_sub(match_chars) / 2;
        let mut from = start_char.saturating_sub(lead);
        if from + self.snippet_length > total {
            from = total - self.snippet_length;
        }
        let to = from + self.snippet_length;

        let byte_at = |n: usize| text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len());
        let (start, end) = (byte_at(from), byte_at(to));
        (&text[start..end], from > 0, to < total)
    }

    /// Highlights for the named top-level fields of a document, or for
    /// every string-valued field when `fields` is empty. Fields without a
    /// match are left out.
    pub fn document(&self, document: &Document, fields: &[String]) -> BTreeMap<String, String> {
        let candidates: Vec<(&String, &Value)> = if fields.is_empty() {
            document.data.iter().collect()
        } else {
            fields
                .iter()
                .filter_map(|f| document.data.get_key_value(f.as_str()))
                .collect()
        };
        candidates
            .into_iter()
            .filter_map(|(name, value)| {
                let text = value.as_str()?;
                Some((name.clone(), self.highlight(text)?))
            })
            .collect()
    }
}
