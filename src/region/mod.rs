//! Region-related sub commands.

pub mod query;
