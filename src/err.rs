use std::num::ParseIntError;

/// Errors raised while fetching, merging, or annotating variant summaries.
///
/// None of these is retried inside the worker; retry policy belongs to
/// the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The search backend errored, timed out, or returned garbage.
    #[error("query against index {index} failed: {message}")]
    BackendQueryFailure { index: String, message: String },
    /// A raw hit could not be turned into a well-formed summary.
    #[error("could not shape variant {variant_id}: {reason}")]
    ShapingInvariantViolation { variant_id: String, reason: String },
    /// Exome and genome summaries under the same key disagree on identity.
    #[error("identity mismatch for {key}: exome={exome}, genome={genome}")]
    IdentityMismatch {
        key: String,
        exome: String,
        genome: String,
    },
    /// The auxiliary MNV query failed.
    #[error("could not fetch MNVs: {0}")]
    MnvFetchFailure(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ArgError {
    #[error("Invalid format in interval: {0}")]
    IntervalInvalidFormat(String),
    #[error("Invalid integer coordinates in interval")]
    IntervalInvalidInts(#[from] ParseIntError),
    #[error("Interval start {start} is after stop {stop}")]
    IntervalInverted { start: u32, stop: u32 },
    #[error("Unknown chromosome: {0}")]
    UnknownChromosome(String),
    #[error("Unknown subset: {0}")]
    UnknownSubset(String),
}
