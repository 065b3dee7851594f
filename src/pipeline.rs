//! Three-phase pipeline orchestration.
//!
//! The orchestrator sequences ingest, redo drain, and entity materialization
//! over one [`WindowRunner`] policy each, owns the checkpoint lifecycle, and
//! aggregates every failure into a single fatal path: the first error aborts
//! the run and leaves the checkpoint file behind as the recovery marker.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use crate::checkpoint::CheckpointStore;
use crate::engine::EngineGateway;
use crate::error::PipelineResult;
use crate::progress::ProgressReporter;
use crate::record::{EntityId, RecordHeader};
use crate::runner::WindowRunner;

/// Default number of concurrently in-flight engine calls.
///
/// An explicit constant rather than a platform-derived worker heuristic, so
/// behavior never silently varies across hosts. Tune per engine deployment.
pub const DEFAULT_WINDOW_WIDTH: usize = 8;

/// Default item interval between throughput lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Default item interval between engine statistics dumps.
pub const DEFAULT_STATS_INTERVAL: u64 = 100_000;

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of tasks in flight at any time.
    pub window_width: usize,
    /// Emit a throughput line every this many processed items.
    pub progress_interval: u64,
    /// Dump engine statistics every this many processed items.
    pub stats_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

/// Counts from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Input records submitted to the engine.
    pub adds: u64,
    /// Redo items the engine produced and the run drained (non-empty drains).
    pub redos: u64,
    /// Entities materialized to the output stream, placeholders included.
    pub entities: u64,
}

/// One validated input line awaiting submission.
#[derive(Debug)]
struct IngestItem {
    header: RecordHeader,
    raw: String,
}

/// Work token for the redo phase; redo items are engine-generated, so the
/// token carries no payload.
#[derive(Debug, Clone, Copy)]
struct RedoToken;

/// Minimal stand-in document for an entity that vanished between the
/// checkpoint scan and materialization (merged away by a later operation).
///
/// Byte-stable for a given identifier, so re-materializing an absent entity
/// is idempotent.
#[must_use]
pub fn placeholder_document(id: EntityId) -> String {
    serde_json::json!({"ENTITY": {"ENTITY_ID": id.0, "RECORDS": []}}).to_string()
}

/// Sequencer for the ingest / redo-drain / materialization phases.
pub struct Pipeline<'a, G> {
    gateway: &'a G,
    config: PipelineConfig,
}

impl<'a, G: EngineGateway> Pipeline<'a, G> {
    /// Creates a pipeline over the given gateway.
    pub fn new(gateway: &'a G, config: PipelineConfig) -> Self {
        Self { gateway, config }
    }

    /// Runs all three phases to completion.
    ///
    /// The checkpoint store is consumed: on success its file is deleted, on
    /// failure it stays behind so the next start refuses to run until the
    /// operator has dealt with the unfinished entities.
    ///
    /// # Errors
    /// The first fatal error from any phase: decode failures, engine
    /// failures, checkpoint corruption, or I/O.
    pub fn run<In, Out>(
        &self,
        input: In,
        mut checkpoint: CheckpointStore,
        out: &mut Out,
    ) -> PipelineResult<PipelineReport>
    where
        In: BufRead,
        Out: Write,
    {
        let adds = self.ingest(input, &mut checkpoint)?;
        let redos = self.drain_redo(&mut checkpoint)?;

        let affected = checkpoint.affected_entities()?;
        println!("Extracted {} unique entities from the checkpoint", affected.len());

        let entities = self.materialize(affected, out)?;
        out.flush()?;

        checkpoint.remove()?;
        Ok(PipelineReport {
            adds,
            redos,
            entities,
        })
    }

    /// Phase 1: submit every input record, checkpointing non-empty with-info
    /// responses.
    ///
    /// Each line is decoded before submission; a malformed line means a
    /// corrupted input file and aborts the run.
    fn ingest<In: BufRead>(
        &self,
        input: In,
        checkpoint: &mut CheckpointStore,
    ) -> PipelineResult<u64> {
        let gateway = self.gateway;
        let mut progress = ProgressReporter::new("adds", &self.config);
        let mut lines = input.lines();

        let processed = WindowRunner::new(self.config.window_width).run(
            || match lines.next() {
                None => Ok(None),
                Some(line) => {
                    let raw = line?;
                    let header = RecordHeader::decode(&raw)?;
                    Ok(Some(IngestItem { header, raw }))
                }
            },
            |item: &IngestItem| {
                gateway.submit_record(&item.header.data_source, &item.header.record_id, &item.raw)
            },
            |_item, with_info: Vec<u8>| {
                if !with_info.is_empty() {
                    checkpoint.append(&with_info)?;
                }
                progress.tick(gateway);
                Ok(None)
            },
        )?;

        progress.finish();
        Ok(processed)
    }

    /// Phase 2: drain the engine's redo backlog.
    ///
    /// The window is primed with exactly `window_width` drain tokens; each
    /// non-empty result is checkpointed and feeds one replacement token back.
    /// The phase ends once a full window of concurrent drains all came back
    /// empty with no resubmissions pending, i.e. the engine reports
    /// exhaustion from every slot at once.
    fn drain_redo(&self, checkpoint: &mut CheckpointStore) -> PipelineResult<u64> {
        let gateway = self.gateway;
        let width = self.config.window_width.max(1);
        let mut progress = ProgressReporter::new("redo records", &self.config);
        let mut primed = 0usize;

        WindowRunner::new(width).run(
            || {
                if primed < width {
                    primed += 1;
                    Ok(Some(RedoToken))
                } else {
                    Ok(None)
                }
            },
            |_token: &RedoToken| gateway.drain_one_redo(),
            |_token, response: Option<Vec<u8>>| match response {
                Some(with_info) => {
                    checkpoint.append(&with_info)?;
                    progress.tick(gateway);
                    Ok(Some(RedoToken))
                }
                None => Ok(None),
            },
        )?;

        progress.finish();
        // Empty drains complete tasks but are not redo work; report only the
        // non-empty ones.
        Ok(progress.count())
    }

    /// Phase 3: fetch every affected entity and write one output line per
    /// identifier, found or not.
    fn materialize<Out: Write>(
        &self,
        affected: HashSet<EntityId>,
        out: &mut Out,
    ) -> PipelineResult<u64> {
        let gateway = self.gateway;
        let mut progress = ProgressReporter::new("entities", &self.config);
        let mut ids = affected.into_iter();

        let processed = WindowRunner::new(self.config.window_width).run(
            || Ok(ids.next()),
            |id: &EntityId| gateway.fetch_entity(*id, true),
            |id, document: Option<Vec<u8>>| {
                match document {
                    Some(bytes) => out.write_all(&bytes)?,
                    None => out.write_all(placeholder_document(id).as_bytes())?,
                }
                out.write_all(b"\n")?;
                progress.tick(gateway);
                Ok(None)
            },
        )?;

        progress.finish();
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use tempfile::tempdir;

    fn record(id: u32) -> String {
        format!("{{\"DATA_SOURCE\":\"TEST\",\"RECORD_ID\":\"{id}\",\"NAME\":\"P{id}\"}}")
    }

    #[test]
    fn placeholder_is_well_formed_and_stable() {
        let a = placeholder_document(EntityId(100));
        let b = placeholder_document(EntityId(100));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"ENTITY":{"ENTITY_ID":100,"RECORDS":[]}}"#);
        let parsed: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert!(parsed["ENTITY"]["RECORDS"].as_array().unwrap().is_empty());
    }

    #[test]
    fn run_counts_every_phase_and_removes_the_checkpoint() {
        let dir = tempdir().unwrap();
        let ck_path = dir.path().join("withInfo.json");
        let engine = MemoryEngine::new();
        engine.queue_redo(br#"{"AFFECTED_ENTITIES":[{"ENTITY_ID":1}]}"#.to_vec());

        let input = format!("{}\n{}\n{}\n", record(1), record(2), record(3));
        let checkpoint = CheckpointStore::create(&ck_path).unwrap();
        let mut out = Vec::new();

        let pipeline = Pipeline::new(&engine, PipelineConfig::default());
        let report = pipeline
            .run(input.as_bytes(), checkpoint, &mut out)
            .unwrap();

        assert_eq!(report.adds, 3);
        assert_eq!(report.redos, 1);
        assert_eq!(report.entities, 3);
        assert_eq!(out.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count(), 3);
        assert!(!ck_path.exists());
    }

    #[test]
    fn malformed_line_aborts_and_keeps_the_checkpoint() {
        let dir = tempdir().unwrap();
        let ck_path = dir.path().join("withInfo.json");
        let engine = MemoryEngine::new();

        let input = format!("{}\nnot json\n{}\n", record(1), record(2));
        let checkpoint = CheckpointStore::create(&ck_path).unwrap();
        let mut out = Vec::new();

        let pipeline = Pipeline::new(&engine, PipelineConfig::default());
        let err = pipeline
            .run(input.as_bytes(), checkpoint, &mut out)
            .unwrap_err();

        assert!(matches!(err, crate::error::PipelineError::Decode { .. }));
        // The crash marker survives the failed run.
        assert!(ck_path.exists());
    }

    #[test]
    fn redo_phase_drains_everything_the_engine_queued() {
        let dir = tempdir().unwrap();
        let engine = MemoryEngine::new();
        for id in 0..25 {
            engine.queue_redo(
                format!("{{\"AFFECTED_ENTITIES\":[{{\"ENTITY_ID\":{id}}}]}}").into_bytes(),
            );
        }

        let checkpoint = CheckpointStore::create(dir.path().join("withInfo.json")).unwrap();
        let mut out = Vec::new();
        let config = PipelineConfig {
            window_width: 4,
            ..PipelineConfig::default()
        };
        let report = Pipeline::new(&engine, config)
            .run(&b""[..], checkpoint, &mut out)
            .unwrap();

        assert_eq!(report.adds, 0);
        assert_eq!(report.redos, 25);
        // Redo-reported entities were never added, so all 25 materialize as
        // placeholders.
        assert_eq!(report.entities, 25);
    }
}
