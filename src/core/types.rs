use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::EntityLimits;
use crate::core::error::{Error, Result};

/// A named node in the knowledge graph, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub importance: Option<f32>,
    #[serde(default)]
    pub parent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Entity {
    /// Create an entity with normalized tags and fresh timestamps
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Entity {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            tags: BTreeSet::new(),
            importance: None,
            parent: None,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn with_observations<I, S>(mut self, observations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observations = observations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(|t| normalize_tag(&t.into())).collect();
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// All indexable text of the entity, in insertion order
    pub fn combined_text(&self) -> String {
        let mut parts = Vec::with_capacity(2 + self.observations.len() + self.tags.len());
        parts.push(self.name.as_str());
        parts.push(self.entity_type.as_str());
        parts.extend(self.observations.iter().map(String::as_str));
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ")
    }

    /// Validate field constraints before the entity enters the graph
    pub fn validate(&self, limits: &EntityLimits) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("entity name must not be empty".into()));
        }
        if self.name.chars().count() > limits.max_name_length {
            return Err(Error::Validation(format!(
                "entity name exceeds {} characters",
                limits.max_name_length
            )));
        }
        for obs in &self.observations {
            if obs.chars().count() > limits.max_observation_length {
                return Err(Error::Validation(format!(
                    "observation exceeds {} characters",
                    limits.max_observation_length
                )));
            }
        }
        if let Some(importance) = self.importance {
            validate_importance(importance)?;
        }
        Ok(())
    }
}

/// Directed edge between two existing entities
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Relation {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }
}

/// Partial update for an entity; unset fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    pub entity_type: Option<String>,
    pub observations: Option<Vec<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub importance: Option<Option<f32>>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.entity_type.is_none()
            && self.observations.is_none()
            && self.tags.is_none()
            && self.importance.is_none()
    }
}

/// Lower-cased projection of an entity, cached for filter and boolean evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct LowercasedEntity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    pub tags: Vec<String>,
}

impl LowercasedEntity {
    pub fn from_entity(entity: &Entity) -> Self {
        LowercasedEntity {
            name: entity.name.to_lowercase(),
            entity_type: entity.entity_type.to_lowercase(),
            observations: entity
                .observations
                .iter()
                .map(|o| o.to_lowercase())
                .collect(),
            tags: entity.tags.iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

/// Tags are stored lower-cased and trimmed
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Importance is a real in [0, 10]
pub fn validate_importance(importance: f32) -> Result<()> {
    if !(0.0..=10.0).contains(&importance) || importance.is_nan() {
        return Err(Error::Validation(format!(
            "importance {importance} out of range [0, 10]"
        )));
    }
    Ok(())
}
