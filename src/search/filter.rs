use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::PaginationConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{Entity, normalize_tag};

/// Post-ranking filters shared by every retriever
///
/// Filters run after ranking so score distributions are computed over the
/// full candidate pool; pagination is applied last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// OR over required tags, case-insensitive
    pub tags: Vec<String>,
    /// Inclusive importance window; unset importance is excluded when a
    /// bound is set
    pub min_importance: Option<f32>,
    pub max_importance: Option<f32>,
    /// Exact entity-type match
    pub entity_type: Option<String>,
    /// Inclusive creation window
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Inclusive modification window
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self == &SearchFilter::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_importance, self.max_importance) {
            if min > max {
                return Err(Error::Validation(format!(
                    "importance window [{min}, {max}] is inverted"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.tags.is_empty() {
            let any_tag = self
                .tags
                .iter()
                .any(|tag| entity.tags.contains(&normalize_tag(tag)));
            if !any_tag {
                return false;
            }
        }

        if self.min_importance.is_some() || self.max_importance.is_some() {
            let Some(importance) = entity.importance else {
                return false;
            };
            if let Some(min) = self.min_importance {
                if importance < min {
                    return false;
                }
            }
            if let Some(max) = self.max_importance {
                if importance > max {
                    return false;
                }
            }
        }

        if let Some(entity_type) = &self.entity_type {
            if &entity.entity_type != entity_type {
                return false;
            }
        }

        if let Some(after) = self.created_after {
            if entity.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if entity.created_at > before {
                return false;
            }
        }
        if let Some(after) = self.modified_after {
            if entity.last_modified < after {
                return false;
            }
        }
        if let Some(before) = self.modified_before {
            if entity.last_modified > before {
                return false;
            }
        }
        true
    }
}

/// Offset/limit window over a stable ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Page { offset, limit }
    }

    pub fn default_for(config: &PaginationConfig) -> Self {
        Page {
            offset: 0,
            limit: config.default_limit,
        }
    }

    /// Clamp the limit into `1..=max_limit`
    pub fn clamped(&self, config: &PaginationConfig) -> Page {
        Page {
            offset: self.offset,
            limit: self.limit.clamp(1, config.max_limit),
        }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}
