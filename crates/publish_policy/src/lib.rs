//! Asset classification and publication policy for static site deployment.
//!
//! Every file rendered by the site generator is classified by an ordered,
//! immutable [`RuleTable`]. Each rule becomes one [`PublicationJob`]: a
//! mirroring sync scoped to the rule's filter that stamps the rule's
//! content-type and cache lifetime onto every object it uploads. Jobs run in
//! table order, so on overlapping filters the last matching rule decides the
//! metadata observed in the destination.
//!
//! This crate is pure: it never touches the network or the filesystem. The
//! deployer crate feeds it a scanned output tree and a destination listing
//! and executes the resulting plan.
//!
//! # Modules
//!
//! - [`asset`] - Rendered files keyed by their relative path
//! - [`extension`] - Validated filename extensions
//! - [`filter`] - Include/exclude selectors over extensions
//! - [`metadata`] - Content-type and cache-control values
//! - [`mirror`] - Upload/delete sets for one mirroring sync
//! - [`plan`] - Per-rule publication jobs in table order
//! - [`rule`] - A single classification rule
//! - [`table`] - The ordered rule table and its validation

pub mod asset;
pub mod extension;
pub mod filter;
pub mod metadata;
pub mod mirror;
pub mod plan;
pub mod rule;
pub mod table;

pub use asset::RenderedAsset;
pub use extension::{Extension, ExtensionError};
pub use filter::{AssetFilter, IncludeSet};
pub use metadata::{CacheControl, ContentType, ObjectMetadata};
pub use mirror::{MirrorDiff, mirror_diff};
pub use plan::{PublicationJob, PublicationPlan, plan};
pub use rule::RuleSpec;
pub use table::{Precedence, RuleTable, RuleTableError, standard_rules};
