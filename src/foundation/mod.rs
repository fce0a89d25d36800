//! Shared geometry types, errors and configuration.

pub(crate) mod config;
pub(crate) mod core;
pub(crate) mod error;
