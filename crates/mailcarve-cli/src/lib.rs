//! # Mailcarve CLI
//!
//! Command-line front end: wires the networked collaborator client, the
//! HTTP image fetcher, and in-memory stores into a [`mailcarve_pipeline::PipelineController`]
//! and runs jobs end to end from the terminal.

pub mod cli;
pub mod commands;
pub mod config;
