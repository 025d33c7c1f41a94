// Tokenizer
//
// *Le Découpage* (The Splitting) - Shared word tokenization for indexing and queries

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Unicode word-character runs
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+").expect("word pattern is a valid regex")
});

/// Split text into lowercase word tokens
///
/// Text is NFKC-normalized and lowercased before `\w+` runs are extracted,
/// so compatibility forms ("ﬁle", full-width digits) match their plain
/// spellings. There is no stemming and no stop-word removal: the only
/// requirement is that documents and queries go through the same function.
///
/// # Example
///
/// ```
/// let tokens = lehybride::tokenizer::tokenize("Returns allowed: 30 days!");
/// assert_eq!(tokens, vec!["returns", "allowed", "30", "days"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();

    WORD_PATTERN
        .find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Deduplicated tokens in first-seen order
pub fn unique_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        let tokens = tokenize("Shipping takes 5 to 7 Days.");
        assert_eq!(tokens, vec!["shipping", "takes", "5", "to", "7", "days"]);
    }

    #[test]
    fn test_tokenize_keeps_underscores() {
        // `\w` includes the underscore, so identifiers survive intact
        let tokens = tokenize("call parse_config() now");
        assert_eq!(tokens, vec!["call", "parse_config", "now"]);
    }

    #[test]
    fn test_tokenize_unicode_words() {
        let tokens = tokenize("Garantie: Größe ÉTÉ");
        assert_eq!(tokens, vec!["garantie", "größe", "été"]);
    }

    #[test]
    fn test_tokenize_nfkc_compatibility_forms() {
        // U+FB01 LATIN SMALL LIGATURE FI and full-width digits
        let tokens = tokenize("\u{FB01}le \u{FF11}\u{FF12}");
        assert_eq!(tokens, vec!["file", "12"]);
    }

    #[test]
    fn test_tokenize_empty_and_punctuation() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  ?!... --- ").is_empty());
    }

    #[test]
    fn test_unique_tokens_first_seen_order() {
        let tokens = unique_tokens("days and days and returns");
        assert_eq!(tokens, vec!["days", "and", "returns"]);
    }
}
