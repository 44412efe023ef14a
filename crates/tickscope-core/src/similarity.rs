use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::CanonicalTask;

static URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

static NON_WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\p{P}\p{S}]+").unwrap());

/// Titles shorter than this (in chars) only match on exact equality.
pub const MIN_COMPARABLE_LEN: usize = 4;
/// Minimum `shorter / longer` length ratio for the containment rule.
pub const MIN_CONTAINMENT_RATIO: f64 = 0.4;
pub const MIN_DICE_SIMILARITY: f64 = 0.92;
/// Both titles need at least this many chars before the bigram rule applies.
pub const MIN_DICE_LEN: usize = 8;

/// Comparison key: lowercase, URLs removed, punctuation/symbols/whitespace removed.
pub fn title_norm(title: &str) -> String {
    let lower = title.to_lowercase();
    let without_urls = URL_REGEX.replace_all(&lower, "");
    NON_WORD_REGEX.replace_all(&without_urls, "").into_owned()
}

fn bigrams(chars: &[char]) -> HashMap<(char, char), usize> {
    let mut counts = HashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Sørensen–Dice coefficient over character-bigram multisets.
pub fn dice_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.len() < 2 || b_chars.len() < 2 {
        return 0.0;
    }

    let a_bigrams = bigrams(&a_chars);
    let b_bigrams = bigrams(&b_chars);
    let intersection: usize = a_bigrams
        .iter()
        .map(|(bigram, count)| (*count).min(b_bigrams.get(bigram).copied().unwrap_or(0)))
        .sum();

    (2 * intersection) as f64 / (a_chars.len() + b_chars.len() - 2) as f64
}

/// Exact / containment / fuzzy cascade over already-normalized titles.
pub fn similar_titles(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len < MIN_COMPARABLE_LEN || b_len < MIN_COMPARABLE_LEN {
        return false;
    }

    let (shorter, shorter_len, longer, longer_len) = if a_len <= b_len {
        (a, a_len, b, b_len)
    } else {
        (b, b_len, a, a_len)
    };
    if longer.contains(shorter)
        && shorter_len >= MIN_COMPARABLE_LEN
        && shorter_len as f64 / longer_len as f64 >= MIN_CONTAINMENT_RATIO
    {
        return true;
    }

    dice_similarity(a, b) >= MIN_DICE_SIMILARITY && shorter_len >= MIN_DICE_LEN
}

/// Whether two tasks describe the same real-world item.
///
/// Hard constraints are checked first, in order: same project, neither is a
/// subtask, matching due dates, and modification times within `window_ms`.
pub fn is_duplicate(a: &CanonicalTask, b: &CanonicalTask, window_ms: i64) -> bool {
    if a.project_id != b.project_id {
        return false;
    }
    if a.parent_id.is_some() || b.parent_id.is_some() {
        return false;
    }
    if (a.due_local_date.is_some() || b.due_local_date.is_some())
        && a.due_local_date != b.due_local_date
    {
        return false;
    }
    if let (Some(left), Some(right)) = (a.modified_at_ms, b.modified_at_ms)
        && (left - right).abs() > window_ms
    {
        return false;
    }

    similar_titles(&title_norm(&a.title), &title_norm(&b.title))
}
