//! ETL orchestration
//!
//! - [`transform`] - The transform trait, registry, and built-in transform
//! - [`policy`] - Staleness, backoff, and escalation per document type
//! - [`orchestrator`] - Claims, applies, and records outcomes
//! - [`summary`] - Pass and run reporting

pub mod orchestrator;
pub mod policy;
pub mod summary;
pub mod transform;

pub use orchestrator::{EtlOrchestrator, EtlSettings};
pub use policy::{Candidate, EtlPolicy, PolicySet};
pub use summary::{PartitionSummary, PassSummary, RunSummary};
pub use transform::{DocumentTransform, Transform, TransformOutput, TransformRegistry};
