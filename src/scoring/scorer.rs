/// Document statistics needed by term scorers
#[derive(Debug, Clone, Copy)]
pub struct DocStats {
    pub doc_length: usize,
    pub avg_doc_length: f32,
    pub total_docs: usize,
}

/// Per-term relevance scorer; document scores sum matched-term contributions
pub trait Scorer: Send + Sync {
    fn score_term(&self, tf: u32, df: usize, stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// TF-IDF with sublinear term-frequency scaling and smoothed idf
///
/// `score(t, d) = (1 + ln(tf)) * (ln((N + 1) / (df + 1)) + 1)`
///
/// The +1 keeps a term that appears in every document contributing a
/// positive score instead of vanishing.
pub struct TfIdfScorer;

impl Scorer for TfIdfScorer {
    fn score_term(&self, tf: u32, df: usize, stats: &DocStats) -> f32 {
        if tf == 0 {
            return 0.0;
        }
        let tf_component = 1.0 + (tf as f32).ln();
        let idf = ((stats.total_docs as f32 + 1.0) / (df as f32 + 1.0)).ln() + 1.0;
        tf_component * idf
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

/// Okapi BM25
pub struct Bm25Scorer {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for Bm25Scorer {
    fn score_term(&self, tf: u32, df: usize, stats: &DocStats) -> f32 {
        if tf == 0 || stats.total_docs == 0 {
            return 0.0;
        }
        let tf = tf as f32;
        let n = stats.total_docs as f32;
        let df = df as f32;
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

        let avg = if stats.avg_doc_length > 0.0 {
            stats.avg_doc_length
        } else {
            1.0
        };
        let length_norm = 1.0 - self.b + self.b * (stats.doc_length as f32 / avg);
        idf * tf * (self.k1 + 1.0) / (tf + self.k1 * length_norm)
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(doc_length: usize, avg: f32, total: usize) -> DocStats {
        DocStats {
            doc_length,
            avg_doc_length: avg,
            total_docs: total,
        }
    }

    #[test]
    fn tfidf_rewards_rarity() {
        let scorer = TfIdfScorer;
        let common = scorer.score_term(1, 90, &stats(10, 10.0, 100));
        let rare = scorer.score_term(1, 2, &stats(10, 10.0, 100));
        assert!(rare > common);
    }

    #[test]
    fn tfidf_tf_growth_is_sublinear() {
        let scorer = TfIdfScorer;
        let s = stats(10, 10.0, 100);
        let one = scorer.score_term(1, 5, &s);
        let two = scorer.score_term(2, 5, &s);
        let four = scorer.score_term(4, 5, &s);
        assert!(two > one);
        assert!(four - two < two - one);
    }

    #[test]
    fn tfidf_zero_tf_scores_zero() {
        assert_eq!(TfIdfScorer.score_term(0, 5, &stats(10, 10.0, 100)), 0.0);
    }

    #[test]
    fn bm25_idf_stays_positive_for_ubiquitous_terms() {
        // the +1 inside the log keeps idf > 0 even when df == N
        let scorer = Bm25Scorer::default();
        let score = scorer.score_term(1, 100, &stats(10, 10.0, 100));
        assert!(score > 0.0);
    }

    #[test]
    fn bm25_penalizes_long_documents() {
        let scorer = Bm25Scorer::default();
        let short = scorer.score_term(2, 5, &stats(5, 10.0, 100));
        let long = scorer.score_term(2, 5, &stats(50, 10.0, 100));
        assert!(short > long);
    }

    #[test]
    fn bm25_saturates_with_term_frequency() {
        let scorer = Bm25Scorer::default();
        let s = stats(10, 10.0, 100);
        let low = scorer.score_term(1, 5, &s);
        let high = scorer.score_term(20, 5, &s);
        let cap = scorer.score_term(200, 5, &s);
        assert!(high > low);
        // k1 bounds the tf contribution
        assert!(cap - high < high - low);
    }

    #[test]
    fn bm25_b_zero_disables_length_normalization() {
        let scorer = Bm25Scorer { k1: 1.2, b: 0.0 };
        let short = scorer.score_term(2, 5, &stats(5, 10.0, 100));
        let long = scorer.score_term(2, 5, &stats(50, 10.0, 100));
        assert!((short - long).abs() < 1e-6);
    }
}
