//! # erpipe - Windowed incremental loader for entity resolution
//!
//! erpipe drives an external entity-resolution engine through a three-phase
//! pipeline: records are ingested, the engine's internal redo backlog is
//! drained, and every entity touched along the way is re-materialized to an
//! output stream. The engine itself (matching, scoring, merging) is a
//! black-box collaborator reached through the [`EngineGateway`] trait.
//!
//! ## Core Concepts
//!
//! - **With-info**: a side-channel response accompanying each add/redo
//!   operation, listing the entities that operation affected
//! - **Checkpoint Store**: an append-only file of with-info payloads, also
//!   serving as the crash-recovery marker between runs
//! - **Window width**: the maximum number of engine calls in flight at once
//!
//! ## Usage
//!
//! ```rust,ignore
//! use erpipe::{CheckpointStore, MemoryEngine, Pipeline, PipelineConfig};
//!
//! let engine = MemoryEngine::new();
//! let pipeline = Pipeline::new(&engine, PipelineConfig::default());
//!
//! let checkpoint = CheckpointStore::create("/tmp/withInfo.json")?;
//! let input = std::io::BufReader::new(std::fs::File::open("records.jsonl")?);
//! let mut out = std::fs::File::create("load_delta.json")?;
//!
//! let report = pipeline.run(input, checkpoint, &mut out)?;
//! println!("loaded {} adds, {} redo, {} entities",
//!     report.adds, report.redos, report.entities);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod runner;

// Re-export primary types at crate root for convenience
pub use checkpoint::CheckpointStore;
pub use engine::{EngineGateway, MemoryEngine};
pub use error::{EngineError, PipelineError, PipelineResult};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use record::{AffectedEntity, EntityId, RecordHeader, WithInfo};
pub use runner::WindowRunner;
