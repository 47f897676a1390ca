//! Incremental, deduplicated collection from lazily-loaded listing feeds.
//!
//! The core is the [`collector`] loop: snapshot the currently materialized
//! elements of a virtually infinite list, extract fields defensively,
//! deduplicate by a derived identity key, scroll for more, and stop once the
//! target count is reached or the source stalls. Browser automation, field
//! selectors and output files are pluggable collaborators behind the traits
//! in [`sources`].

pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod pacing;
pub mod runner;
pub mod sink;
pub mod sources;

// Exporting types for convenience
pub use collector::{CollectResult, Collector, CollectorOptions, StopReason};
pub use config::ScoutConfig;
pub use error::{ConfigError, ExtractError, SourceError, WorkerError};
pub use models::{identity_key, Record, RunSummary};
pub use pacing::{DelayProfile, DelayRange};
pub use runner::{Job, PartitionOutcome, RunReport};
pub use sources::{
    ElementSource, Extract, FeedSource, MapsExtractor, SeenSet, SelectorExtractor, SharedSeen,
};
