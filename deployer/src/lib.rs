//! Static site deployment handler.
//!
//! This crate handles pipeline deployment jobs. It fetches the job's source
//! bundle, renders it with the site generator, and publishes the output to
//! an S3 bucket under a fixed set of metadata rules. It is used by the
//! `site-deployer` binary and can be driven programmatically in tests.
//!
//! # Modules
//!
//! - [`artefact`] - Bundle retrieval, extraction, and site generation
//! - [`aws`] - Minimal signed clients for S3 and CodePipeline
//! - [`config`] - Command-line and environment configuration
//! - [`error`] - Error types folding every stage's failure
//! - [`handler`] - The per-job deployment sequence
//! - [`job`] - Job event parsing and destination handling
//! - [`notifier`] - Job outcome reporting
//! - [`publish`] - Rule-ordered mirroring of the rendered site
//! - [`runtime`] - Function runtime API client and serve loop

pub mod artefact;
pub mod aws;
pub mod config;
pub mod error;
pub mod handler;
pub mod job;
pub mod notifier;
pub mod publish;
pub mod runtime;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use error::{DeployError, Result};
pub use handler::{COMPLETE, Handler};
