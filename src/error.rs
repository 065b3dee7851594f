//! Error types for erpipe.
//!
//! All errors are strongly typed using thiserror. The taxonomy mirrors the
//! pipeline's failure model: malformed input is fatal, any raised engine
//! error is fatal, and "entity not found" is never an error at all (the
//! gateway reports it as an absent value).

use std::path::PathBuf;

use thiserror::Error;

use crate::record::EntityId;

/// Errors raised by the external resolution engine.
///
/// A gateway implementation reports hard failures through this type. The
/// expected "no data" outcomes (no with-info, no redo work, entity gone) are
/// represented as empty/absent values on the success path instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A record submission failed.
    #[error("engine rejected record {data_source}/{record_id}: {message}")]
    Add {
        /// Data source code of the rejected record.
        data_source: String,
        /// Record identifier within the data source.
        record_id: String,
        /// Engine-supplied failure detail.
        message: String,
    },

    /// A redo-drain call failed.
    #[error("engine redo processing failed: {message}")]
    Redo {
        /// Engine-supplied failure detail.
        message: String,
    },

    /// An entity fetch failed for a reason other than absence.
    #[error("engine fetch failed for entity {id}: {message}")]
    Fetch {
        /// Entity the fetch was issued for.
        id: EntityId,
        /// Engine-supplied failure detail.
        message: String,
    },

    /// The engine is in an unusable state (poisoned lock, lost session, ...).
    #[error("engine internal error: {message}")]
    Internal {
        /// Failure detail.
        message: String,
    },
}

impl EngineError {
    /// Creates an internal engine error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Top-level error type for pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An input line could not be decoded into a record.
    ///
    /// This is fatal: a malformed line indicates a corrupted input file, and
    /// continuing would silently skip records.
    #[error("cannot decode input record: {reason} [{line}]")]
    Decode {
        /// Parser failure detail.
        reason: String,
        /// The offending line, truncated for display.
        line: String,
    },

    /// The engine reported a hard failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A checkpoint file from a prior run is still present.
    ///
    /// The file is the crash-recovery marker: its presence means the previous
    /// run did not finish. The operator must verify those entities were
    /// processed and remove the file before re-running.
    #[error(
        "checkpoint file {path} already exists, possibly from a failed run; \
         make sure those entities were processed and remove it before re-running"
    )]
    CheckpointExists {
        /// Path of the pre-existing checkpoint file.
        path: PathBuf,
    },

    /// A checkpoint entry written earlier in the run failed to parse back.
    #[error("malformed checkpoint entry at line {line}: {reason}")]
    CheckpointEntry {
        /// 1-based line number within the checkpoint file.
        line: u64,
        /// Parser failure detail.
        reason: String,
    },

    /// File or stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker window shut down while completions were still expected.
    #[error("worker window disconnected unexpectedly")]
    Disconnected,
}

impl PipelineError {
    /// Creates a decode error, truncating long input lines for display.
    #[must_use]
    pub fn decode(reason: impl Into<String>, line: &str) -> Self {
        const MAX_SHOWN: usize = 200;
        let mut shown: String = line.chars().take(MAX_SHOWN).collect();
        if line.chars().count() > MAX_SHOWN {
            shown.push_str("...");
        }
        Self::Decode {
            reason: reason.into(),
            line: shown,
        }
    }

    /// Returns true if this error came out of the engine.
    #[must_use]
    pub const fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }

    /// Returns true if this is the pre-existing-checkpoint startup guard.
    #[must_use]
    pub const fn is_checkpoint_guard(&self) -> bool {
        matches!(self, Self::CheckpointExists { .. })
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
