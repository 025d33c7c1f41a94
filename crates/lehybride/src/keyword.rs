// Keyword Index
//
// *L'Index Lexical* (The Lexical Index) - Inverted index with smoothed IDF scoring

use crate::ranking::top_k_by_score;
use crate::tfidf::smoothed_idf;
use crate::tokenizer::{tokenize, unique_tokens};
use std::collections::{BTreeMap, HashMap};

/// Inverted index from token to document positions
///
/// Posting lists are sorted and deduplicated because documents are added in
/// position order and each document contributes each token once.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    postings: HashMap<String, Vec<usize>>,
    document_count: usize,
}

impl KeywordIndex {
    /// Build an index over document contents, position = slice index
    pub fn build(contents: &[String]) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, content) in contents.iter().enumerate() {
            for token in unique_tokens(content) {
                postings.entry(token).or_default().push(position);
            }
        }

        Self {
            postings,
            document_count: contents.len(),
        }
    }

    /// Score documents against a query
    ///
    /// Each query token found in the index adds its IDF to every document
    /// in its posting list; a token repeated in the query adds again.
    /// Scores are divided by the maximum, so matched documents fall in
    /// `(0, 1]` and the best match scores exactly 1.0. Documents without any
    /// matching token are absent from the map.
    ///
    /// # Example
    ///
    /// ```
    /// use lehybride::keyword::KeywordIndex;
    ///
    /// let index = KeywordIndex::build(&[
    ///     "returns within 30 days".to_string(),
    ///     "free shipping".to_string(),
    /// ]);
    /// let scores = index.score("Returns?");
    /// assert_eq!(scores.get(&0), Some(&1.0));
    /// assert!(!scores.contains_key(&1));
    /// ```
    pub fn score(&self, query: &str) -> BTreeMap<usize, f32> {
        let mut scores: BTreeMap<usize, f32> = BTreeMap::new();

        for token in tokenize(query) {
            if let Some(positions) = self.postings.get(&token) {
                let idf = smoothed_idf(self.document_count, positions.len());
                for &position in positions {
                    *scores.entry(position).or_insert(0.0) += idf;
                }
            }
        }

        let max = scores.values().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            for score in scores.values_mut() {
                *score /= max;
            }
        }

        scores
    }

    /// Scored documents ranked by score descending, ties by position
    pub fn rank(&self, query: &str, top_k: usize) -> Vec<(usize, f32)> {
        top_k_by_score(self.score(query).into_iter().collect(), top_k)
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.document_count
    }

    /// Check if no documents are indexed
    pub fn is_empty(&self) -> bool {
        self.document_count == 0
    }

    /// Number of distinct tokens
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    /// Sorted document positions containing `token`
    pub fn postings(&self, token: &str) -> Option<&[usize]> {
        self.postings.get(token).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "Our return policy allows returns within 30 days".to_string(),
            "Shipping takes 5 to 7 business days".to_string(),
            "The warranty covers defects for 1 year".to_string(),
        ]
    }

    #[test]
    fn test_build_postings() {
        let index = KeywordIndex::build(&corpus());

        assert_eq!(index.len(), 3);
        assert_eq!(index.postings("days"), Some(&[0usize, 1][..]));
        assert_eq!(index.postings("warranty"), Some(&[2usize][..]));
        assert!(index.postings("missing").is_none());
    }

    #[test]
    fn test_repeated_tokens_in_document_posted_once() {
        let index = KeywordIndex::build(&["days days days".to_string()]);
        assert_eq!(index.postings("days"), Some(&[0usize][..]));
        assert_eq!(index.vocabulary_size(), 1);
    }

    #[test]
    fn test_score_normalized_by_max() {
        let index = KeywordIndex::build(&corpus());
        let scores = index.score("how many days for returns");

        // doc 0 matches "days" and "returns"; doc 1 "days"; doc 2 "for"
        assert_eq!(scores[&0], 1.0);
        assert!(scores[&1] > 0.0 && scores[&1] < 1.0);
        assert!(scores[&2] > 0.0 && scores[&2] < 1.0);
    }

    #[test]
    fn test_score_rare_terms_weigh_more() {
        let index = KeywordIndex::build(&corpus());
        let scores = index.score("days warranty");

        // "warranty" is in one document, "days" in two
        assert_eq!(scores[&2], 1.0);
        let expected = smoothed_idf(3, 2) / smoothed_idf(3, 1);
        assert!((scores[&0] - expected).abs() < 1e-6);
        assert!((scores[&1] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_query_tokens_accumulate() {
        let index = KeywordIndex::build(&corpus());
        let once = index.score("days warranty");
        let twice = index.score("days days warranty");

        // Repeating "days" moves the days-documents toward the top
        assert!(twice[&0] > once[&0]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let index = KeywordIndex::build(&corpus());
        assert!(index.score("zebra quantum").is_empty());
        assert!(index.score("").is_empty());
        assert!(index.rank("zebra", 5).is_empty());
    }

    #[test]
    fn test_rank_orders_and_breaks_ties_by_position() {
        let index = KeywordIndex::build(&corpus());
        let ranked = index.rank("days warranty", 10);

        let order: Vec<usize> = ranked.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, vec![2, 0, 1]);
        assert_eq!(index.rank("days warranty", 1).len(), 1);
    }

    #[test]
    fn test_empty_index() {
        let index = KeywordIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.score("anything").is_empty());
    }
}
