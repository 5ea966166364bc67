use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::types::Entity;

/// Change notification published synchronously after each successful mutation
///
/// Events carry entity snapshots because delivery happens inside the
/// writer's critical section: listeners must not read back into the graph.
/// `Updated` carries both sides so derived indexes can unindex the old
/// state and index the new one.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Created { entity: Box<Entity> },
    Updated { old: Box<Entity>, new: Box<Entity> },
    Deleted { old: Box<Entity> },
}

impl ChangeEvent {
    pub fn name(&self) -> &str {
        match self {
            ChangeEvent::Created { entity } => &entity.name,
            ChangeEvent::Updated { new, .. } => &new.name,
            ChangeEvent::Deleted { old } => &old.name,
        }
    }

    /// Created and Deleted change the entity population
    pub fn changes_population(&self) -> bool {
        !matches!(self, ChangeEvent::Updated { .. })
    }
}

/// Subscriber to graph change events
///
/// Delivery happens inside the writer's critical section; implementations
/// must be side-effect-only, fast, and restricted to in-memory updates.
pub trait GraphListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ownership-neutral listener registry
///
/// Listeners are held as `Arc`s so subscribers and the registry never form
/// cyclic back-pointers.
pub struct ListenerRegistry {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn GraphListener>)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        ListenerRegistry {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn GraphListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn publish(&self, event: &ChangeEvent) {
        // Clone the Arc list so a listener that re-subscribes cannot deadlock
        let snapshot: Vec<Arc<dyn GraphListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener.on_change(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
