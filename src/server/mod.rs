//! Server-related sub commands.

pub mod rest;
