use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::core::config::TraceConfig;

/// Record of one executed query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTrace {
    pub id: Uuid,
    pub query: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub result_count: usize,
    pub cache_hit: bool,
    pub executed_layers: Vec<String>,
}

/// Bounded ring buffer of query traces; disabled recording is a no-op
pub struct TraceLog {
    entries: Mutex<VecDeque<QueryTrace>>,
    config: TraceConfig,
}

impl TraceLog {
    pub fn new(config: TraceConfig) -> Self {
        TraceLog {
            entries: Mutex::new(VecDeque::with_capacity(config.capacity.min(1024))),
            config,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn record(&self, trace: QueryTrace) {
        if !self.config.enabled {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= self.config.capacity.max(1) {
            entries.pop_front();
        }
        entries.push_back(trace);
    }

    /// Traces in recording order, oldest first
    pub fn snapshot(&self) -> Vec<QueryTrace> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Convenience constructor stamping id and start time
pub fn trace_record(
    query: &str,
    kind: &str,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    result_count: usize,
    cache_hit: bool,
    executed_layers: Vec<String>,
) -> QueryTrace {
    QueryTrace {
        id: Uuid::new_v4(),
        query: query.to_string(),
        kind: kind.to_string(),
        started_at,
        duration_ms,
        result_count,
        cache_hit,
        executed_layers,
    }
}
