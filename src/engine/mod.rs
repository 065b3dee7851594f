//! Gateway to the external entity-resolution engine.
//!
//! The engine itself is a black box: it matches, scores, and merges records
//! behind a narrow synchronous surface. The pipeline only ever submits a
//! record, drains one unit of redo work, fetches one entity, or asks for
//! statistics. Implementations must be safe for concurrent calls from the
//! worker window; each call may block on I/O or computation.

mod memory;

pub use memory::MemoryEngine;

use crate::error::EngineError;
use crate::record::EntityId;

/// Narrow synchronous contract to the external resolution engine.
///
/// "No data" outcomes are values, not errors: an empty with-info response, an
/// exhausted redo queue, and a no-longer-existing entity all travel on the
/// success path. Only hard engine failures surface as [`EngineError`].
pub trait EngineGateway: Send + Sync {
    /// Submits one record and returns the engine's with-info payload.
    ///
    /// An empty payload means the engine chose not to report affected
    /// entities for this add; it is valid and simply not checkpointed.
    ///
    /// # Errors
    /// Any engine failure; fatal for the whole run.
    fn submit_record(
        &self,
        data_source: &str,
        record_id: &str,
        raw: &str,
    ) -> Result<Vec<u8>, EngineError>;

    /// Drains one unit of the engine's deferred redo work.
    ///
    /// Returns `None` when no redo work is currently available; that is the
    /// normal terminating outcome, not an error.
    ///
    /// # Errors
    /// Any engine failure; fatal for the whole run.
    fn drain_one_redo(&self) -> Result<Option<Vec<u8>>, EngineError>;

    /// Fetches one resolved entity document by identifier.
    ///
    /// Returns `None` when the entity no longer exists (merged away after it
    /// was reported affected). `include_records` requests record-level detail
    /// inside the document.
    ///
    /// # Errors
    /// Any engine failure other than absence; fatal for the whole run.
    fn fetch_entity(
        &self,
        id: EntityId,
        include_records: bool,
    ) -> Result<Option<Vec<u8>>, EngineError>;

    /// Returns the engine's internal statistics as an opaque payload.
    ///
    /// # Errors
    /// Any engine failure. Callers using this for progress reporting treat
    /// the failure as advisory.
    fn stats(&self) -> Result<Vec<u8>, EngineError>;
}
