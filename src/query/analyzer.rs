use regex::Regex;
use serde::{Deserialize, Serialize};

/// Broad intent classification of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Factual,
    Reasoning,
    Planning,
    Comparative,
    Exploratory,
}

/// Heuristic complexity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Category of information a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoType {
    Person,
    Location,
    Organization,
    Temporal,
    Numeric,
    Causal,
}

/// Keywords associated with an info type; appended to refined queries that
/// target a gap, and used to check whether a result covers the type
pub fn focus_keywords(info: InfoType) -> &'static [&'static str] {
    match info {
        InfoType::Person => &["who", "person", "people"],
        InfoType::Location => &["where", "location", "place"],
        InfoType::Organization => &["organization", "company", "group"],
        InfoType::Temporal => &["when", "date", "time"],
        InfoType::Numeric => &["number", "amount", "quantity"],
        InfoType::Causal => &["why", "because", "cause"],
    }
}

/// Analysis of a raw query produced by keyword tables and regex patterns;
/// no external model involved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub question_type: QuestionType,
    pub complexity: Complexity,
    pub confidence: f32,
    pub required_info_types: Vec<InfoType>,
    pub persons: Vec<String>,
    pub locations: Vec<String>,
    pub organizations: Vec<String>,
    pub temporal_range: Option<(i32, i32)>,
}

pub struct QueryAnalyzer {
    capitalized: Regex,
    year: Regex,
    org_suffix: Regex,
    numeric: Regex,
}

impl QueryAnalyzer {
    pub fn new() -> Self {
        QueryAnalyzer {
            capitalized: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b")
                .expect("static pattern"),
            year: Regex::new(r"\b(19|20)\d{2}\b").expect("static pattern"),
            org_suffix: Regex::new(r"(?i)\b(inc|corp|corporation|ltd|llc|gmbh|company)\b")
                .expect("static pattern"),
            numeric: Regex::new(r"\d").expect("static pattern"),
        }
    }

    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let question_type = self.classify(&lower, &words);
        let (persons, locations, organizations) = self.extract_entities(query, &lower);
        let temporal_range = self.extract_years(query);
        let required_info_types = self.required_types(
            &lower,
            &words,
            &persons,
            &locations,
            &organizations,
            temporal_range.is_some(),
        );

        let confidence = if words
            .first()
            .is_some_and(|w| INTERROGATIVES.contains(&w.trim_end_matches('?')))
        {
            0.9
        } else if !required_info_types.is_empty() {
            0.7
        } else {
            0.4
        };

        let complexity = match (words.len(), required_info_types.len()) {
            (0..=5, 0..=1) => Complexity::Simple,
            (0..=12, 0..=2) => Complexity::Moderate,
            _ => Complexity::Complex,
        };

        QueryAnalysis {
            question_type,
            complexity,
            confidence,
            required_info_types,
            persons,
            locations,
            organizations,
            temporal_range,
        }
    }

    fn classify(&self, lower: &str, words: &[&str]) -> QuestionType {
        let first = words.first().copied().unwrap_or("");
        if first == "why"
            || lower.starts_with("explain")
            || lower.starts_with("how does")
            || lower.starts_with("how did")
        {
            return QuestionType::Reasoning;
        }
        if lower.contains("plan")
            || lower.starts_with("how do i")
            || lower.starts_with("how to")
            || lower.contains("steps to")
            || lower.starts_with("should")
        {
            return QuestionType::Planning;
        }
        if lower.starts_with("compare")
            || lower.contains(" vs ")
            || lower.contains("difference between")
        {
            return QuestionType::Comparative;
        }
        if INTERROGATIVES.contains(&first.trim_end_matches('?')) {
            return QuestionType::Factual;
        }
        QuestionType::Exploratory
    }

    fn extract_entities(
        &self,
        query: &str,
        lower: &str,
    ) -> (Vec<String>, Vec<String>, Vec<String>) {
        let mut persons = Vec::new();
        let mut locations = Vec::new();
        let mut organizations = Vec::new();

        for capture in self.capitalized.find_iter(query) {
            let span = capture.as_str();
            let span_lower = span.to_lowercase();
            // skip spans that are just question words or sentence starters
            if span
                .split_whitespace()
                .all(|w| NON_NAME_WORDS.contains(&w.to_lowercase().as_str()))
            {
                continue;
            }

            if self.org_suffix.is_match(span) {
                organizations.push(span.to_string());
                continue;
            }
            // location when the span follows a spatial preposition
            let preceded_by = |prep: &str| {
                lower
                    .find(&span_lower)
                    .map(|pos| {
                        let head = lower[..pos].trim_end();
                        head == prep || head.ends_with(&format!(" {prep}"))
                    })
                    .unwrap_or(false)
            };
            if ["in", "at", "near", "from"].iter().any(|p| preceded_by(p)) {
                locations.push(span.to_string());
            } else {
                persons.push(span.to_string());
            }
        }
        (persons, locations, organizations)
    }

    fn extract_years(&self, query: &str) -> Option<(i32, i32)> {
        let years: Vec<i32> = self
            .year
            .find_iter(query)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        match (years.iter().min(), years.iter().max()) {
            (Some(&min), Some(&max)) => Some((min, max)),
            _ => None,
        }
    }

    fn required_types(
        &self,
        lower: &str,
        words: &[&str],
        persons: &[String],
        locations: &[String],
        organizations: &[String],
        has_years: bool,
    ) -> Vec<InfoType> {
        fn push(t: InfoType, types: &mut Vec<InfoType>) {
            if !types.contains(&t) {
                types.push(t);
            }
        }

        let mut types = Vec::new();
        let first = words.first().copied().unwrap_or("").trim_end_matches('?');

        if first == "who" || !persons.is_empty() {
            push(InfoType::Person, &mut types);
        }
        if first == "where" || !locations.is_empty() {
            push(InfoType::Location, &mut types);
        }
        if first == "when" || has_years || lower.contains("date") {
            push(InfoType::Temporal, &mut types);
        }
        if lower.contains("how many")
            || lower.contains("how much")
            || self.numeric.is_match(lower)
        {
            push(InfoType::Numeric, &mut types);
        }
        if first == "why" || lower.contains("because") || lower.contains("cause") {
            push(InfoType::Causal, &mut types);
        }
        if !organizations.is_empty()
            || lower.contains("company")
            || lower.contains("organization")
        {
            push(InfoType::Organization, &mut types);
        }
        types
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        QueryAnalyzer::new()
    }
}

const INTERROGATIVES: &[&str] = &["who", "what", "when", "where", "which", "how", "why"];

const NON_NAME_WORDS: &[&str] = &[
    "who", "what", "when", "where", "which", "how", "why", "the", "is",
    "are", "was", "were", "did", "does", "do", "a", "an", "tell", "me",
    "about", "find", "show", "list",
];
