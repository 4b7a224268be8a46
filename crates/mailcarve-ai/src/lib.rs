//! # Mailcarve AI
//!
//! HTTP clients implementing the collaborator traits from
//! `mailcarve-core::collab` against the AI service endpoints. The service
//! bodies (segmentation, annotation, link resolution, copy generation,
//! spelling check) are opaque; this crate only speaks their wire contracts.

pub mod client;

pub use client::{AiServiceClient, DEFAULT_TIMEOUT_SECS};
