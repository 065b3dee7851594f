//! In-memory engine gateway.
//!
//! This module provides a thread-safe, deterministic implementation of
//! [`EngineGateway`] for embedded usage, tests, and dry runs. It performs no
//! matching: every unique (data source, record id) pair resolves to its own
//! entity, resubmissions land on the same entity, and redo work only exists
//! if a test seeded it. That is enough to exercise every pipeline path
//! without a real resolution engine.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::engine::EngineGateway;
use crate::error::EngineError;
use crate::record::EntityId;

fn lock_err() -> EngineError {
    EngineError::internal("poisoned engine state lock")
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    by_key: HashMap<(String, String), EntityId>,
    records: HashMap<EntityId, Vec<Value>>,
    redo: VecDeque<Vec<u8>>,
    adds: u64,
    redos: u64,
    fetches: u64,
}

/// Deterministic in-process resolution engine.
///
/// Entity identifiers are assigned sequentially starting at 1. Every add
/// returns a with-info payload naming the record's entity; use
/// [`MemoryEngine::queue_redo`] to seed deferred work and
/// [`MemoryEngine::remove_entity`] to simulate an entity merged away before
/// materialization.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one unit of redo work, returned verbatim by a later drain.
    ///
    /// # Panics
    /// Panics if the state lock is poisoned; acceptable in the deterministic
    /// backend because poisoning requires a prior panic.
    pub fn queue_redo(&self, with_info: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .expect("engine state lock poisoned")
            .redo
            .push_back(with_info.into());
    }

    /// Removes an entity so subsequent fetches report absence.
    ///
    /// # Panics
    /// Panics if the state lock is poisoned.
    pub fn remove_entity(&self, id: EntityId) {
        self.state
            .lock()
            .expect("engine state lock poisoned")
            .records
            .remove(&id);
    }

    /// Number of entities currently resolvable.
    ///
    /// # Panics
    /// Panics if the state lock is poisoned.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.state
            .lock()
            .expect("engine state lock poisoned")
            .records
            .len()
    }
}

impl EngineGateway for MemoryEngine {
    fn submit_record(
        &self,
        data_source: &str,
        record_id: &str,
        raw: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let mut state = self.state.lock().map_err(|_| lock_err())?;
        state.adds += 1;

        let key = (data_source.to_string(), record_id.to_string());
        let id = match state.by_key.get(&key) {
            Some(id) => *id,
            None => {
                state.next_id += 1;
                let id = EntityId(state.next_id);
                state.by_key.insert(key, id);
                id
            }
        };

        // Keep the raw record for later materialization; an unparseable body
        // is the caller's bug, upstream decode already validated it.
        let body: Value = serde_json::from_str(raw).unwrap_or(Value::Null);
        state.records.entry(id).or_default().push(body);

        let info = json!({
            "DATA_SOURCE": data_source,
            "RECORD_ID": record_id,
            "AFFECTED_ENTITIES": [{"ENTITY_ID": id.0}],
        });
        Ok(info.to_string().into_bytes())
    }

    fn drain_one_redo(&self) -> Result<Option<Vec<u8>>, EngineError> {
        let mut state = self.state.lock().map_err(|_| lock_err())?;
        let item = state.redo.pop_front();
        if item.is_some() {
            state.redos += 1;
        }
        Ok(item)
    }

    fn fetch_entity(
        &self,
        id: EntityId,
        include_records: bool,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let mut state = self.state.lock().map_err(|_| lock_err())?;
        state.fetches += 1;

        let Some(records) = state.records.get(&id) else {
            return Ok(None);
        };
        let records = if include_records {
            Value::Array(records.clone())
        } else {
            Value::Array(Vec::new())
        };
        let doc = json!({"ENTITY": {"ENTITY_ID": id.0, "RECORDS": records}});
        Ok(Some(doc.to_string().into_bytes()))
    }

    fn stats(&self) -> Result<Vec<u8>, EngineError> {
        let state = self.state.lock().map_err(|_| lock_err())?;
        let stats = json!({
            "ADDS": state.adds,
            "REDOS": state.redos,
            "FETCHES": state.fetches,
            "ENTITIES": state.records.len(),
        });
        Ok(stats.to_string().into_bytes())
    }
}
