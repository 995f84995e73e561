//! Text canonicalization and similarity scoring.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NUMERIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+\s*:").unwrap());
static ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[^\s&;]+;").unwrap());

/// Decode HTML character references, including the common named ones that
/// plain XML unescaping rejects. Each reference is decoded on its own, so an
/// unknown one is left verbatim without blocking the rest.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let reference = &caps[0];
        quick_xml::escape::unescape_with(reference, html_entity)
            .map(Cow::into_owned)
            .unwrap_or_else(|_| reference.to_string())
    })
}

fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "hellip" => Some("\u{2026}"),
        "deg" => Some("\u{b0}"),
        "times" => Some("\u{d7}"),
        _ => None,
    }
}

/// Remove HTML tags and decode entities, keeping the visible text.
///
/// Tags are replaced with a space so adjacent block elements do not run
/// together; surrounding whitespace is collapsed.
pub fn strip_markup(text: &str) -> String {
    let without_tags = TAG.replace_all(text, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Canonicalize a text for comparison.
///
/// Strips markup, decodes entities, lowercases, replaces punctuation with
/// spaces, and collapses whitespace. `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let visible = strip_markup(text);
    let lowered = visible.to_lowercase();
    let spaced = NON_WORD.replace_all(&lowered, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Drop a leading numeric id such as `85145:` from a grade-source header.
pub fn strip_reference_prefix(reference: &str) -> &str {
    match NUMERIC_PREFIX.find(reference) {
        Some(m) => reference[m.end()..].trim_start(),
        None => reference,
    }
}

/// Longest-common-subsequence ratio: `2 * LCS(a, b) / (|a| + |b|)`.
///
/// Symmetric, in `[0, 1]`, and 1.0 only when the strings are equal. Two
/// empty strings are identical and score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Keep the shorter sequence in the rolling row.
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}
