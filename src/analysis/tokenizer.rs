use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Unicode word tokenizer with case folding and stop-word removal
///
/// Index-side and query-side text go through the same instance so that
/// document-frequency counts and query terms agree on splitting rules.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pub min_term_length: usize,
    pub stopwords: HashSet<String>,
}

impl Tokenizer {
    pub fn new(min_term_length: usize, stopwords: HashSet<String>) -> Self {
        Tokenizer {
            min_term_length,
            stopwords,
        }
    }

    /// Lower-cased terms, stop words and short terms removed
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|word| word.to_lowercase())
            .filter(|term| term.chars().count() >= self.min_term_length)
            .filter(|term| !self.stopwords.contains(term))
            .collect()
    }

    /// All lower-cased words, no length or stop-word filtering
    ///
    /// The observation-word index uses this so that every token of an
    /// observation is addressable in boolean field queries.
    pub fn words(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(|word| word.to_lowercase()).collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer {
            min_term_length: 3,
            stopwords: crate::analysis::stopwords::english(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_unicode_words() {
        let tokenizer = Tokenizer::default();
        let terms = tokenizer.tokenize("Budget-Travel Hotel");
        assert_eq!(terms, vec!["budget", "travel", "hotel"]);
    }

    #[test]
    fn drops_stop_words_and_short_terms() {
        let tokenizer = Tokenizer::default();
        let terms = tokenizer.tokenize("the cat is on a mat");
        // "the"/"is"/"a"/"on" are stop words, "cat"/"mat" pass
        assert_eq!(terms, vec!["cat", "mat"]);
    }

    #[test]
    fn min_length_filters_terms() {
        let tokenizer = Tokenizer::new(4, HashSet::new());
        let terms = tokenizer.tokenize("ox owl wolf moose");
        assert_eq!(terms, vec!["wolf", "moose"]);
    }

    #[test]
    fn words_keeps_everything_lowercased() {
        let tokenizer = Tokenizer::default();
        let words = tokenizer.words("The Cat");
        assert_eq!(words, vec!["the", "cat"]);
    }

    #[test]
    fn tokenize_empty_is_empty() {
        let tokenizer = Tokenizer::default();
        assert!(tokenizer.tokenize("").is_empty());
        assert!(tokenizer.tokenize("   ").is_empty());
    }
}
