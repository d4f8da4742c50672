//! The in-memory entity graph and its correlation engine (spec.md §4.4,
//! §5): entities and co-occurrence edges behind one writer lock, plus
//! the scoring used to surface cross-domain identity links.

mod correlation;
mod graph;
mod ingest;

pub use correlation::{interpret, CorrelationEngine, CorrelationResult, Thresholds};
pub use graph::{EntityGraph, GraphStats};
pub use ingest::canonical_entity_type;
