// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenization and word-level text rewriting shared by the compressor and the lexical view.

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "how",
    "in", "is", "it", "of", "on", "or", "that", "the", "to", "was", "were", "what", "when",
    "where", "which", "who", "will", "with",
];

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == ':'
}

/// Lowercased word tokens, keeping `-` and `:` so ISO timestamps stay whole.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !is_token_char(c))
        .map(|w| w.trim_matches(|c| c == '-' || c == ':'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Index terms: [`words`] minus stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    words(text)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Whitespace token count, used for compression accounting.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Replace every whole-word, case-insensitive occurrence of `surface` with `replacement`.
///
/// Returns the rewritten text and whether anything was replaced.
pub fn replace_phrase(text: &str, surface: &str, replacement: &str) -> (String, bool) {
    let surface = surface.trim();
    if surface.is_empty() {
        return (text.to_string(), false);
    }

    let haystack = text.to_lowercase();
    let needle = surface.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; only rewrite when offsets line up.
    if haystack.len() != text.len() || needle.len() != surface.len() {
        return match text.find(surface) {
            Some(_) => (text.replace(surface, replacement), true),
            None => (text.to_string(), false),
        };
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut replaced = false;
    while let Some(found) = haystack[cursor..].find(&needle) {
        let start = cursor + found;
        let end = start + needle.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = text[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            out.push_str(&text[cursor..start]);
            out.push_str(replacement);
            replaced = true;
        } else {
            out.push_str(&text[cursor..end]);
        }
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    (out, replaced)
}

/// Deictic terms from `terms` that still occur as whole words in `text`, in first-seen order.
pub fn remaining_deictics(text: &str, terms: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.split('\'').next().unwrap_or(w).to_lowercase())
    {
        if terms.iter().any(|t| t.eq_ignore_ascii_case(&word)) && !found.contains(&word) {
            found.push(word);
        }
    }
    found
}
