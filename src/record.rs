//! Typed wire shapes for input records and with-info payloads.
//!
//! Input lines and checkpoint entries are line-delimited JSON. This module
//! replaces duck-typed field access with explicit decode steps: a line either
//! yields a typed value or a fatal decode error, never a silently missing
//! field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Stable identifier of a resolved entity, assigned by the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// The addressing fields every input record must carry.
///
/// The full record stays opaque: the engine receives the raw line verbatim.
/// Only `DATA_SOURCE` and `RECORD_ID` are decoded here, because submission
/// needs them and their absence marks the line as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordHeader {
    /// Data source code the record belongs to.
    #[serde(rename = "DATA_SOURCE")]
    pub data_source: String,

    /// Record identifier, unique within its data source.
    #[serde(rename = "RECORD_ID")]
    pub record_id: String,
}

impl RecordHeader {
    /// Decodes the addressing fields out of a raw JSON input line.
    ///
    /// # Errors
    /// Returns [`PipelineError::Decode`] if the line is not a JSON object
    /// carrying string `DATA_SOURCE` and `RECORD_ID` fields.
    pub fn decode(line: &str) -> PipelineResult<Self> {
        serde_json::from_str(line).map_err(|err| PipelineError::decode(err.to_string(), line))
    }
}

/// A single entity reference inside a with-info payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedEntity {
    /// The entity the reported operation touched.
    #[serde(rename = "ENTITY_ID")]
    pub entity_id: EntityId,
}

/// The portion of a with-info payload the pipeline consumes.
///
/// Each checkpoint line is one of these. Whatever else the engine put in the
/// payload is preserved on disk verbatim but ignored by the dedup scan.
#[derive(Debug, Clone, Deserialize)]
pub struct WithInfo {
    /// Entities affected by the reported add/redo operation.
    #[serde(rename = "AFFECTED_ENTITIES")]
    pub affected_entities: Vec<AffectedEntity>,
}

impl WithInfo {
    /// Decodes a checkpoint line.
    ///
    /// # Errors
    /// Returns [`PipelineError::CheckpointEntry`] if the line does not parse
    /// or lacks the `AFFECTED_ENTITIES` list; `line_no` is 1-based and only
    /// used for the error message.
    pub fn decode(raw: &str, line_no: u64) -> PipelineResult<Self> {
        serde_json::from_str(raw).map_err(|err| PipelineError::CheckpointEntry {
            line: line_no,
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_record() {
        let header =
            RecordHeader::decode(r#"{"DATA_SOURCE":"TEST","RECORD_ID":"1","NAME":"A"}"#).unwrap();
        assert_eq!(header.data_source, "TEST");
        assert_eq!(header.record_id, "1");
    }

    #[test]
    fn missing_record_id_is_a_decode_error() {
        let err = RecordHeader::decode(r#"{"DATA_SOURCE":"TEST"}"#).unwrap_err();
        let PipelineError::Decode { reason, .. } = &err else {
            panic!("expected Decode, got {err:?}");
        };
        assert!(reason.contains("RECORD_ID"));
    }

    #[test]
    fn non_json_line_is_a_decode_error() {
        assert!(RecordHeader::decode("not json at all").is_err());
    }

    #[test]
    fn with_info_lists_affected_entities() {
        let info = WithInfo::decode(
            r#"{"DATA_SOURCE":"TEST","AFFECTED_ENTITIES":[{"ENTITY_ID":100},{"ENTITY_ID":7}]}"#,
            1,
        )
        .unwrap();
        let ids: Vec<i64> = info.affected_entities.iter().map(|e| e.entity_id.0).collect();
        assert_eq!(ids, vec![100, 7]);
    }

    #[test]
    fn with_info_without_affected_entities_fails() {
        let err = WithInfo::decode(r#"{"DATA_SOURCE":"TEST"}"#, 3).unwrap_err();
        let PipelineError::CheckpointEntry { line, .. } = &err else {
            panic!("expected CheckpointEntry, got {err:?}");
        };
        assert_eq!(*line, 3);
    }

    #[test]
    fn entity_id_displays_as_raw_number() {
        assert_eq!(EntityId(42).to_string(), "42");
    }
}
