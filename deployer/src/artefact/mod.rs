//! Source bundle retrieval, extraction and rendering.
//!
//! Each collaborator sits behind a trait so the handler can be exercised
//! without network access or a real site generator.
//!
//! # Sub-modules
//!
//! - [`download`] - Fetch the source bundle from the artefact bucket.
//! - [`extraction`] - ZIP extraction with path traversal protection.
//! - [`generator`] - Run the site generator with a timeout.
//! - [`stager`] - Working directory lifecycle and the staging sequence.

pub mod download;
pub mod extraction;
pub mod generator;
pub mod stager;
