use thiserror::Error;

/// Failures of an element source as a whole.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The listing container never appeared. Fatal for the run, reported and
    /// not retried.
    #[error("listing container unavailable: {0}")]
    Unavailable(String),

    /// The underlying browser session failed.
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

/// Failure to extract anything from a single element.
///
/// A missing field is not an error; this only covers the element itself being
/// gone or unreadable.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("element is stale or empty")]
    Stale,
}

/// Errors surfaced at the worker boundary of a partitioned run.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker could not create its element source at all.
    #[error("could not start element source for `{partition}`: {source}")]
    SourceInit {
        partition: String,
        #[source]
        source: SourceError,
    },

    /// The element source failed mid-run.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Worker setup failed before collection started.
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

/// Precondition violations caught at configuration time, never inside the
/// collection loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_results must be a positive integer")]
    ZeroMaxResults,

    #[error("stall_threshold must be a positive integer")]
    ZeroStallThreshold,

    #[error("max_workers must be a positive integer")]
    ZeroWorkers,

    #[error("identity_fields must name at least one field")]
    EmptyIdentityFields,

    #[error("delay range `{0}` has min_ms greater than max_ms")]
    InvertedDelayRange(&'static str),

    #[error("scroll step has min_px greater than max_px")]
    InvertedScrollStep,
}
