use std::collections::HashSet;

/// Default English stop-word set
pub fn english() -> HashSet<String> {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for",
        "from", "had", "has", "have", "he", "her", "his", "if", "in",
        "is", "it", "its", "not", "of", "on", "or", "she", "that",
        "the", "their", "they", "this", "to", "was", "were", "will",
        "with",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
