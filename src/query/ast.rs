use serde::{Deserialize, Serialize};
use std::fmt;

/// Field selector in a boolean query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryField {
    Name,
    EntityType,
    Observation,
    Tag,
}

impl QueryField {
    /// Surface spelling to selector; `type:` and `entitytype:` are synonyms
    pub fn parse(text: &str) -> Option<QueryField> {
        match text.to_lowercase().as_str() {
            "name" => Some(QueryField::Name),
            "type" | "entitytype" => Some(QueryField::EntityType),
            "observation" => Some(QueryField::Observation),
            "tag" => Some(QueryField::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueryField::Name => "name",
            QueryField::EntityType => "type",
            QueryField::Observation => "observation",
            QueryField::Tag => "tag",
        };
        write!(f, "{label}")
    }
}

/// Boolean query AST as tagged variants
///
/// Values are stored lower-cased; evaluation happens against the lower-case
/// entity caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BooleanNode {
    Term {
        field: Option<QueryField>,
        value: String,
        phrase: bool,
    },
    And(Vec<BooleanNode>),
    Or(Vec<BooleanNode>),
    Not(Box<BooleanNode>),
}

impl BooleanNode {
    pub fn term(value: impl Into<String>) -> Self {
        BooleanNode::Term {
            field: None,
            value: value.into(),
            phrase: false,
        }
    }

    pub fn field_term(field: QueryField, value: impl Into<String>) -> Self {
        BooleanNode::Term {
            field: Some(field),
            value: value.into(),
            phrase: false,
        }
    }

    /// Maximum nesting depth (a lone term has depth 1)
    pub fn depth(&self) -> usize {
        match self {
            BooleanNode::Term { .. } => 1,
            BooleanNode::And(children) | BooleanNode::Or(children) => {
                1 + children.iter().map(BooleanNode::depth).max().unwrap_or(0)
            }
            BooleanNode::Not(child) => 1 + child.depth(),
        }
    }

    /// Number of term leaves
    pub fn term_count(&self) -> usize {
        match self {
            BooleanNode::Term { .. } => 1,
            BooleanNode::And(children) | BooleanNode::Or(children) => {
                children.iter().map(BooleanNode::term_count).sum()
            }
            BooleanNode::Not(child) => child.term_count(),
        }
    }

    /// Number of AND/OR/NOT operator nodes
    pub fn operator_count(&self) -> usize {
        match self {
            BooleanNode::Term { .. } => 0,
            BooleanNode::And(children) | BooleanNode::Or(children) => {
                1 + children.iter().map(BooleanNode::operator_count).sum::<usize>()
            }
            BooleanNode::Not(child) => 1 + child.operator_count(),
        }
    }

    /// Rough evaluation cost: field terms with O(1) paths are cheap,
    /// bare substring terms scan every text field
    pub fn estimated_cost(&self) -> usize {
        match self {
            BooleanNode::Term { field, phrase, .. } => match (field, phrase) {
                (Some(QueryField::Tag | QueryField::EntityType), _) => 1,
                (Some(QueryField::Observation), false) => 2,
                (Some(_), _) => 3,
                (None, _) => 5,
            },
            BooleanNode::And(children) | BooleanNode::Or(children) => {
                children.iter().map(BooleanNode::estimated_cost).sum()
            }
            BooleanNode::Not(child) => child.estimated_cost(),
        }
    }

    /// Negation normal form: NOT pushed down to the leaves
    pub fn to_nnf(&self) -> BooleanNode {
        match self {
            BooleanNode::Term { .. } => self.clone(),
            BooleanNode::And(children) => {
                BooleanNode::And(children.iter().map(BooleanNode::to_nnf).collect())
            }
            BooleanNode::Or(children) => {
                BooleanNode::Or(children.iter().map(BooleanNode::to_nnf).collect())
            }
            BooleanNode::Not(child) => match child.as_ref() {
                BooleanNode::Not(inner) => inner.to_nnf(),
                BooleanNode::And(children) => BooleanNode::Or(
                    children
                        .iter()
                        .map(|c| BooleanNode::Not(Box::new(c.clone())).to_nnf())
                        .collect(),
                ),
                BooleanNode::Or(children) => BooleanNode::And(
                    children
                        .iter()
                        .map(|c| BooleanNode::Not(Box::new(c.clone())).to_nnf())
                        .collect(),
                ),
                BooleanNode::Term { .. } => self.clone(),
            },
        }
    }

    /// Conjunctive normal form: an AND of ORs of literals
    ///
    /// Evaluation-equivalent to the source AST; used for canonical
    /// comparison and exercised by the property tests.
    pub fn to_cnf(&self) -> BooleanNode {
        fn cnf(node: &BooleanNode) -> Vec<Vec<BooleanNode>> {
            // returns a conjunction of disjunctions of literals
            match node {
                BooleanNode::Term { .. } | BooleanNode::Not(_) => {
                    vec![vec![node.clone()]]
                }
                BooleanNode::And(children) => {
                    children.iter().flat_map(cnf).collect()
                }
                BooleanNode::Or(children) => {
                    // cross product: OR distributes over the children's ANDs
                    let mut clauses: Vec<Vec<BooleanNode>> = vec![vec![]];
                    for child in children {
                        let child_clauses = cnf(child);
                        let mut next = Vec::new();
                        for existing in &clauses {
                            for clause in &child_clauses {
                                let mut merged = existing.clone();
                                merged.extend(clause.clone());
                                next.push(merged);
                            }
                        }
                        clauses = next;
                    }
                    clauses
                }
            }
        }

        let clauses = cnf(&self.to_nnf());
        BooleanNode::And(
            clauses
                .into_iter()
                .map(|literals| {
                    if literals.len() == 1 {
                        literals.into_iter().next().expect("non-empty clause")
                    } else {
                        BooleanNode::Or(literals)
                    }
                })
                .collect(),
        )
    }
}

impl fmt::Display for BooleanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanNode::Term { field, value, phrase } => {
                if let Some(field) = field {
                    write!(f, "{field}:")?;
                }
                if *phrase {
                    write!(f, "\"{value}\"")
                } else {
                    write!(f, "{value}")
                }
            }
            BooleanNode::And(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            BooleanNode::Or(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            BooleanNode::Not(child) => write!(f, "NOT {child}"),
        }
    }
}
