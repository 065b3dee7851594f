//! Append-only checkpoint store for with-info payloads.
//!
//! Every with-info response produced during the ingest and redo phases is
//! appended here, one JSON payload per line. After both phases finish the
//! file is re-read from the start to derive the set of affected entities.
//!
//! The file doubles as the crash-recovery marker: it is created at run start,
//! deleted only after materialization succeeds, and its presence at the next
//! start means the previous run died mid-flight. Creation refuses to touch a
//! pre-existing file, so a failed run can never be silently double-processed.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::record::{EntityId, WithInfo};

/// Append-then-re-read store of with-info payloads.
///
/// Written only by the pipeline's coordinating thread; the handle stays open
/// across the append and scan stages so buffered writes are never lost to a
/// close/reopen cycle.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: u64,
}

impl CheckpointStore {
    /// Creates the checkpoint file for a fresh run.
    ///
    /// # Errors
    /// [`PipelineError::CheckpointExists`] if a file is already present at
    /// `path` (the crash marker of a prior unfinished run); the check is
    /// race-free via `create_new`. Other I/O failures map to
    /// [`PipelineError::Io`].
    pub fn create(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                if err.kind() == ErrorKind::AlreadyExists {
                    PipelineError::CheckpointExists { path: path.clone() }
                } else {
                    PipelineError::Io(err)
                }
            })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            entries: 0,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of payloads appended during this run.
    #[must_use]
    pub const fn entry_count(&self) -> u64 {
        self.entries
    }

    /// Appends one with-info payload as its own line.
    ///
    /// # Errors
    /// Propagates write failures.
    pub fn append(&mut self, payload: &[u8]) -> PipelineResult<()> {
        self.writer.write_all(payload)?;
        self.writer.write_all(b"\n")?;
        self.entries += 1;
        Ok(())
    }

    /// Scans every stored payload and collects the deduplicated set of
    /// affected entity identifiers.
    ///
    /// The writer is flushed and the same handle is re-read from the start,
    /// so payloads appended moments ago are always visible. Single-threaded
    /// by design: the scan is bounded by data already on disk, not by
    /// external latency.
    ///
    /// # Errors
    /// [`PipelineError::CheckpointEntry`] for a line that fails to parse,
    /// [`PipelineError::Io`] for read failures.
    pub fn affected_entities(&mut self) -> PipelineResult<HashSet<EntityId>> {
        self.writer.flush()?;

        let mut handle = self.writer.get_ref().try_clone()?;
        handle.seek(SeekFrom::Start(0))?;

        let mut affected = HashSet::new();
        for (idx, line) in BufReader::new(handle).lines().enumerate() {
            let line = line?;
            let info = WithInfo::decode(&line, idx as u64 + 1)?;
            for entity in info.affected_entities {
                affected.insert(entity.entity_id);
            }
        }
        Ok(affected)
    }

    /// Deletes the checkpoint file after a fully successful run.
    ///
    /// Consumes the store; on failure paths the store is simply dropped and
    /// the file stays behind as the recovery marker.
    ///
    /// # Errors
    /// Propagates flush and unlink failures.
    pub fn remove(mut self) -> PipelineResult<()> {
        self.writer.flush()?;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}
