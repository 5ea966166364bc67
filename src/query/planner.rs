use serde::{Deserialize, Serialize};

use crate::query::analyzer::{Complexity, InfoType, QueryAnalysis, QuestionType, focus_keywords};

/// How sub-queries are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Single,
    Iterative,
    Parallel,
}

/// How sub-query results are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    TakeFirst,
    Union,
    WeightedUnion,
}

/// One focused retrieval unit of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub query: String,
    pub focus: Option<InfoType>,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub sub_queries: Vec<SubQuery>,
    pub execution_strategy: ExecutionStrategy,
    pub merge_strategy: MergeStrategy,
    pub estimated_complexity: f32,
}

/// Converts a query analysis into an executable plan
///
/// Simple factual queries collapse to one hybrid sub-query. Reasoning and
/// complex queries expand into one focused sub-query per required info
/// type, each biased with that type's keywords.
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        QueryPlanner
    }

    pub fn plan(&self, query: &str, analysis: &QueryAnalysis) -> QueryPlan {
        let estimated_complexity = estimate(analysis);

        let expand = matches!(
            analysis.question_type,
            QuestionType::Reasoning | QuestionType::Comparative
        ) || analysis.complexity == Complexity::Complex;

        if !expand || analysis.required_info_types.len() <= 1 {
            return QueryPlan {
                sub_queries: vec![SubQuery {
                    query: query.to_string(),
                    focus: None,
                    weight: 1.0,
                }],
                execution_strategy: ExecutionStrategy::Single,
                merge_strategy: MergeStrategy::TakeFirst,
                estimated_complexity,
            };
        }

        let weight = 1.0 / analysis.required_info_types.len() as f32;
        let sub_queries = analysis
            .required_info_types
            .iter()
            .map(|&info| SubQuery {
                query: focused_query(query, info),
                focus: Some(info),
                weight,
            })
            .collect();

        QueryPlan {
            sub_queries,
            execution_strategy: if analysis.complexity == Complexity::Complex {
                ExecutionStrategy::Parallel
            } else {
                ExecutionStrategy::Iterative
            },
            merge_strategy: MergeStrategy::Union,
            estimated_complexity,
        }
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        QueryPlanner::new()
    }
}

/// Bias a query toward one info type by appending its missing keywords
pub fn focused_query(query: &str, info: InfoType) -> String {
    let lower = query.to_lowercase();
    let additions: Vec<&str> = focus_keywords(info)
        .iter()
        .copied()
        .filter(|kw| !lower.contains(kw))
        .collect();
    if additions.is_empty() {
        query.to_string()
    } else {
        format!("{query} {}", additions.join(" "))
    }
}

fn estimate(analysis: &QueryAnalysis) -> f32 {
    let base = match analysis.complexity {
        Complexity::Simple => 1.0,
        Complexity::Moderate => 2.0,
        Complexity::Complex => 4.0,
    };
    base + analysis.required_info_types.len() as f32 * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyzer::QueryAnalyzer;

    fn plan_for(query: &str) -> QueryPlan {
        let analyzer = QueryAnalyzer::new();
        let analysis = analyzer.analyze(query);
        QueryPlanner::new().plan(query, &analysis)
    }

    #[test]
    fn simple_factual_query_gets_single_hybrid_plan() {
        let plan = plan_for("Who is Alice?");
        assert_eq!(plan.sub_queries.len(), 1);
        assert_eq!(plan.execution_strategy, ExecutionStrategy::Single);
        assert_eq!(plan.merge_strategy, MergeStrategy::TakeFirst);
        assert_eq!(plan.sub_queries[0].query, "Who is Alice?");
    }

    #[test]
    fn reasoning_query_expands_per_info_type() {
        let plan = plan_for("Why did Alice leave Acme Corp in 2021?");
        assert!(plan.sub_queries.len() > 1);
        assert!(plan.sub_queries.iter().all(|sq| sq.focus.is_some()));
        assert_eq!(plan.merge_strategy, MergeStrategy::Union);
        let total_weight: f32 = plan.sub_queries.iter().map(|sq| sq.weight).sum();
        assert!((total_weight - 1.0).abs() < 1e-5);
    }

    #[test]
    fn focused_query_appends_only_missing_keywords() {
        let focused = focused_query("Who is Alice?", InfoType::Person);
        // "who" is already present; the other person keywords get appended
        assert!(focused.starts_with("Who is Alice?"));
        assert!(focused.contains("person"));
        assert!(focused.contains("people"));
        assert!(!focused["Who is Alice?".len()..].contains("who"));
    }

    #[test]
    fn complex_plans_run_parallel() {
        let plan = plan_for(
            "why did Alice move from Berlin to the Acme Corp office in 2021 \
             and how many people followed her",
        );
        assert_eq!(plan.execution_strategy, ExecutionStrategy::Parallel);
        assert!(plan.estimated_complexity >= 4.0);
    }
}
