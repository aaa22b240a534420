//! Output comparison and quality heuristics
//!
//! Both functions are policy, not linguistics: they are cheap and
//! deterministic, and only need to rank two provider outputs against each
//! other.

use std::collections::HashSet;

/// Tokens shorter than this are ignored by [`jaccard_similarity`]
const MIN_TOKEN_LEN: usize = 3;

/// Length at which the length component of [`quality_score`] saturates
const FULL_LENGTH_CHARS: f64 = 500.0;

const LENGTH_WEIGHT: f64 = 0.4;
const CODE_BLOCK_BONUS: f64 = 0.3;
const LIST_BONUS: f64 = 0.2;
const HEADING_BONUS: f64 = 0.1;

/// Case-insensitive Jaccard similarity of the two texts' word sets.
///
/// Short tokens are ignored unless both texts consist only of short tokens,
/// in which case every token counts. Two empty texts are identical (1.0);
/// one empty text shares nothing (0.0).
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let (left, right) = match (word_set(a, MIN_TOKEN_LEN), word_set(b, MIN_TOKEN_LEN)) {
        (left, right) if left.is_empty() && right.is_empty() => (word_set(a, 1), word_set(b, 1)),
        sets => sets,
    };

    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

fn word_set(text: &str, min_len: usize) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= min_len)
        .map(str::to_lowercase)
        .collect()
}

/// Structural quality score in [0, 1] used by best-of selection
pub fn quality_score(text: &str) -> f64 {
    let length = text.chars().count() as f64;
    let mut score = LENGTH_WEIGHT * (length / FULL_LENGTH_CHARS).min(1.0);

    if text.matches("```").count() >= 2 {
        score += CODE_BLOCK_BONUS;
    }
    if text.lines().any(is_list_item) {
        score += LIST_BONUS;
    }
    if text.lines().any(|line| line.trim_start().starts_with('#')) {
        score += HEADING_BONUS;
    }

    score.min(1.0)
}

fn is_list_item(line: &str) -> bool {
    let line = line.trim_start();
    if ["- ", "* ", "+ "].iter().any(|marker| line.starts_with(marker)) {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaccard_basic() {
        let sim = jaccard_similarity("The quick brown fox", "The quick brown dog");
        assert!((sim - 0.6).abs() < 1e-9);
        assert_eq!(jaccard_similarity("Same words here", "same WORDS here"), 1.0);
    }

    #[test]
    fn test_jaccard_short_tokens_ignored() {
        // "a", "is", "to" are dropped on both sides
        assert_eq!(jaccard_similarity("a cat is", "to cat"), 1.0);
    }

    #[test]
    fn test_jaccard_short_answers_still_compared() {
        assert_eq!(jaccard_similarity("a b", "is to"), 0.0);
        assert_eq!(jaccard_similarity("42", "17"), 0.0);
        assert_eq!(jaccard_similarity("No", "OK"), 0.0);
        assert_eq!(jaccard_similarity("No.", "no"), 1.0);
        assert!((jaccard_similarity("go to", "go up") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard_similarity("!!", "?"), 1.0);
    }

    #[test]
    fn test_jaccard_empty_sides() {
        assert_eq!(jaccard_similarity("", ""), 1.0);
        assert_eq!(jaccard_similarity("", "something"), 0.0);
        assert_eq!(jaccard_similarity("something", "  "), 0.0);
    }

    #[test]
    fn test_quality_components() {
        assert_eq!(quality_score(""), 0.0);
        assert!((quality_score(&"x".repeat(250)) - 0.2).abs() < 1e-9);
        assert!((quality_score(&"x".repeat(900)) - 0.4).abs() < 1e-9);

        let short = "```rs\nfn main() {}\n```";
        assert!(quality_score(short) > 0.3);
        // a single fence is not a block
        assert!(quality_score("```") < 0.3);
    }

    #[test]
    fn test_quality_markdown_structure() {
        assert!(is_list_item("- item"));
        assert!(is_list_item("  * item"));
        assert!(is_list_item("12. item"));
        assert!(!is_list_item("-item"));
        assert!(!is_list_item("1.5 apples"));

        let doc = format!("# Title\n\n- one\n- two\n\n```\ncode\n```\n{}", "y".repeat(600));
        assert!((quality_score(&doc) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_longer_structured_output_wins() {
        let short = "Short response";
        let long = "This is a much longer response with more content and details including ```code blocks``` and - bullet points";
        assert!(quality_score(long) > quality_score(short));
    }
}
