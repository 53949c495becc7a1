//! Publication of the rendered site.
//!
//! The output tree is scanned, planned against the rule table, and each
//! rule's job is handed to a [`sync::BucketSync`] in order.
//!
//! # Sub-modules
//!
//! - [`executor`] - Sequential plan execution.
//! - [`scan`] - Output tree walking.
//! - [`sync`] - Object store calls and rule-scoped mirroring.

pub mod executor;
pub mod scan;
pub mod sync;

pub use executor::{PublishError, PublishReport, Publisher, RuleOutcome};
pub use sync::{BucketSync, CannedAcl, MirrorSync, ObjectStore, S3Store, StoreError, SyncError};
