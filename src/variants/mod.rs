//! Fetching, merging, and annotating gnomAD exome and genome variants.

pub mod fetch;
pub mod merge;
pub mod mnv;
pub mod pipeline;
pub mod raw;
pub mod schema;
pub mod search;
pub mod shape;
