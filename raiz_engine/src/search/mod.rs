//! # Search execution
//!
//! A search runs one order against every registered [`SearchSource`]. Sources are plugins: each one knows how to
//! query a single external registry and reports exactly one outcome. The [`SearchOrchestrator`] owns the ordered list
//! of sources, runs them concurrently, stores one result per source and hands the batch to the lifecycle controller.
mod orchestrator;
mod source;
mod sources;

pub use orchestrator::{SearchError, SearchOrchestrator, DEFAULT_SOURCE_TIMEOUT};
pub use source::{SearchSource, SourceError, SourceOutcome};
pub use sources::{default_sources, CannedSource, DEFAULT_SOURCE_DELAY};
