use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::core::cancel::CancellationToken;
use crate::core::error::{Error, Result};
use crate::core::types::{Entity, EntityPatch, Relation};
use crate::graph::index::GraphIndex;
use crate::ports::{GraphMutation, GraphSnapshot, GraphStore};

/// Mutation surface over the graph
///
/// Each command applies to the GraphIndex inside the writer's critical
/// section (index updates and event delivery included), then journals the
/// acknowledged mutation through the store port.
pub struct GraphCommands {
    graph: Arc<RwLock<GraphIndex>>,
    store: Arc<dyn GraphStore>,
}

impl GraphCommands {
    pub fn new(graph: Arc<RwLock<GraphIndex>>, store: Arc<dyn GraphStore>) -> Self {
        GraphCommands { graph, store }
    }

    pub fn create_entity(&self, entity: Entity) -> Result<()> {
        {
            let mut graph = self.graph.write();
            graph.create_entity(entity.clone())?;
        }
        self.store.append(&GraphMutation::CreateEntity { entity })
    }

    /// Batch creation; duplicates are skipped, not fatal. Returns the names
    /// actually created.
    pub fn create_entities(
        &self,
        entities: Vec<Entity>,
        token: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for entity in entities {
            token.check()?;
            let name = entity.name.clone();
            match self.create_entity(entity) {
                Ok(()) => created.push(name),
                Err(Error::Duplicate(name)) => {
                    debug!(entity = %name, "skipping duplicate in batch create");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(created)
    }

    pub fn update_entity(&self, name: &str, patch: EntityPatch) -> Result<()> {
        {
            let mut graph = self.graph.write();
            graph.update_entity(name, patch.clone())?;
        }
        self.store.append(&GraphMutation::UpdateEntity {
            name: name.to_string(),
            patch,
        })
    }

    pub fn delete_entity(&self, name: &str) -> Result<Entity> {
        let old = {
            let mut graph = self.graph.write();
            graph.delete_entity(name)?
        };
        self.store.append(&GraphMutation::DeleteEntity {
            name: name.to_string(),
        })?;
        Ok(old)
    }

    pub fn add_observations(&self, name: &str, observations: Vec<String>) -> Result<usize> {
        let added = {
            let mut graph = self.graph.write();
            graph.add_observations(name, observations.clone())?
        };
        if added > 0 {
            self.store.append(&GraphMutation::AddObservations {
                name: name.to_string(),
                observations,
            })?;
        }
        Ok(added)
    }

    pub fn remove_observation(&self, name: &str, observation: &str) -> Result<bool> {
        let removed = {
            let mut graph = self.graph.write();
            graph.remove_observation(name, observation)?
        };
        if removed {
            self.store.append(&GraphMutation::RemoveObservation {
                name: name.to_string(),
                observation: observation.to_string(),
            })?;
        }
        Ok(removed)
    }

    pub fn add_tags(&self, name: &str, tags: Vec<String>) -> Result<usize> {
        let added = {
            let mut graph = self.graph.write();
            graph.add_tags(name, tags.clone())?
        };
        if added > 0 {
            self.store.append(&GraphMutation::AddTags {
                name: name.to_string(),
                tags,
            })?;
        }
        Ok(added)
    }

    pub fn remove_tag(&self, name: &str, tag: &str) -> Result<bool> {
        let removed = {
            let mut graph = self.graph.write();
            graph.remove_tag(name, tag)?
        };
        if removed {
            self.store.append(&GraphMutation::RemoveTag {
                name: name.to_string(),
                tag: tag.to_string(),
            })?;
        }
        Ok(removed)
    }

    pub fn set_importance(&self, name: &str, importance: Option<f32>) -> Result<()> {
        {
            let mut graph = self.graph.write();
            graph.set_importance(name, importance)?;
        }
        self.store.append(&GraphMutation::SetImportance {
            name: name.to_string(),
            importance,
        })
    }

    /// Hierarchy assignment with the cycle guard
    pub fn set_parent(&self, name: &str, parent: Option<String>) -> Result<()> {
        {
            let mut graph = self.graph.write();
            graph.set_parent(name, parent.clone())?;
        }
        self.store.append(&GraphMutation::SetParent {
            name: name.to_string(),
            parent,
        })
    }

    pub fn create_relation(&self, relation: Relation) -> Result<()> {
        {
            let mut graph = self.graph.write();
            graph.create_relation(relation.clone())?;
        }
        self.store
            .append(&GraphMutation::CreateRelation { relation })
    }

    pub fn delete_relation(&self, relation: &Relation) -> Result<()> {
        {
            let mut graph = self.graph.write();
            graph.delete_relation(relation)?;
        }
        self.store.append(&GraphMutation::DeleteRelation {
            relation: relation.clone(),
        })
    }

    /// Persist the current graph content through the store port
    pub fn save_snapshot(&self) -> Result<()> {
        let snapshot = {
            let graph = self.graph.read();
            GraphSnapshot {
                entities: graph.entities_in_order().cloned().collect(),
                relations: graph.relations().to_vec(),
            }
        };
        self.store.save_snapshot(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EntityLimits;
    use crate::ports::MemoryGraphStore;

    fn commands() -> (GraphCommands, Arc<RwLock<GraphIndex>>, Arc<MemoryGraphStore>) {
        let graph = Arc::new(RwLock::new(GraphIndex::new(EntityLimits::default())));
        let store = Arc::new(MemoryGraphStore::new());
        (
            GraphCommands::new(graph.clone(), store.clone()),
            graph,
            store,
        )
    }

    #[test]
    fn create_applies_and_journals() {
        let (commands, graph, store) = commands();
        commands.create_entity(Entity::new("Alice", "person")).unwrap();
        assert!(graph.read().contains("Alice"));
        assert_eq!(store.journal_len(), 1);
    }

    #[test]
    fn failed_mutation_is_not_journaled() {
        let (commands, _graph, store) = commands();
        commands.create_entity(Entity::new("Alice", "person")).unwrap();
        assert!(commands.create_entity(Entity::new("Alice", "person")).is_err());
        assert_eq!(store.journal_len(), 1);
    }

    #[test]
    fn batch_create_skips_duplicates() {
        let (commands, graph, _store) = commands();
        let created = commands
            .create_entities(
                vec![
                    Entity::new("a", "t"),
                    Entity::new("a", "t"),
                    Entity::new("b", "t"),
                ],
                &CancellationToken::never(),
            )
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(graph.read().len(), 2);
    }

    #[test]
    fn batch_create_observes_cancellation() {
        let (commands, _graph, _store) = commands();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            commands.create_entities(vec![Entity::new("a", "t")], &token),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn no_op_mutations_are_not_journaled() {
        let (commands, _graph, store) = commands();
        commands.create_entity(Entity::new("Alice", "person")).unwrap();
        let baseline = store.journal_len();
        assert_eq!(commands.add_tags("Alice", vec![]).unwrap(), 0);
        assert!(!commands.remove_tag("Alice", "ghost").unwrap());
        assert_eq!(store.journal_len(), baseline);
    }

    #[test]
    fn snapshot_roundtrip_preserves_graph() {
        let (commands, _graph, store) = commands();
        commands.create_entity(Entity::new("Alice", "person")).unwrap();
        commands.create_entity(Entity::new("Acme", "company")).unwrap();
        commands
            .create_relation(Relation::new("Alice", "Acme", "works_at"))
            .unwrap();
        commands.save_snapshot().unwrap();

        let snapshot = store.load_snapshot().unwrap();
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.relations.len(), 1);
    }
}
