//! Data models shared across the extraction pipeline.

pub mod config;
pub mod document;
pub mod record;
pub mod rule;
