//! Mirroring syncs against the destination bucket.
//!
//! [`ObjectStore`] is the narrow set of bucket calls a sync needs;
//! [`BucketSync`] is one rule-scoped mirror built on top of it.

use crate::aws::AwsError;
use crate::aws::s3::{PutOptions, S3Client};
use crate::job::Destination;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use publish_policy::{ObjectMetadata, PublicationJob, mirror_diff};
use std::fmt;

/// Canned ACL applied to uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CannedAcl {
    /// Owner-only access.
    Private,
    /// Anyone may read the object.
    #[default]
    PublicRead,
}

impl CannedAcl {
    /// Value for the `x-amz-acl` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The S3 client failed.
    #[error(transparent)]
    Aws(#[from] AwsError),

    /// The store refused the operation.
    #[error("{operation} {key} rejected: {reason}")]
    Rejected {
        /// The refused operation, e.g. `put`.
        operation: &'static str,
        /// The object key involved.
        key: String,
        /// Why the store refused.
        reason: String,
    },
}

/// Bucket operations used by a mirroring sync.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectStore {
    /// List every key in `bucket` starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the listing fails.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Upload `body` as `key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the upload fails.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        metadata: &ObjectMetadata,
        acl: CannedAcl,
    ) -> Result<(), StoreError>;

    /// Delete `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the deletion fails.
    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by S3.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    /// Wrap a client.
    #[must_use]
    pub const fn new(client: S3Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3Store {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.client.list_keys(bucket, prefix)?)
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        metadata: &ObjectMetadata,
        acl: CannedAcl,
    ) -> Result<(), StoreError> {
        let cache_control = metadata.cache_control.header_value();
        let options = PutOptions {
            content_type: metadata.content_type.as_str(),
            cache_control: &cache_control,
            acl: Some(acl.as_str()),
        };
        Ok(self.client.put_object(bucket, key, body, options)?)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        Ok(self.client.delete_object(bucket, key)?)
    }
}

/// Errors raised by one mirroring sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The destination could not be listed.
    #[error("failed to list {destination}")]
    List {
        /// The destination being mirrored.
        destination: String,
        /// The store failure.
        #[source]
        source: StoreError,
    },

    /// A rendered file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// The local file.
        path: Utf8PathBuf,
        /// The read failure.
        #[source]
        source: std::io::Error,
    },

    /// An upload failed.
    #[error("failed to upload {key}")]
    Upload {
        /// The destination key.
        key: String,
        /// The store failure.
        #[source]
        source: StoreError,
    },

    /// A stale object could not be deleted.
    #[error("failed to delete {key}")]
    Delete {
        /// The destination key.
        key: String,
        /// The store failure.
        #[source]
        source: StoreError,
    },
}

/// One rule-scoped sync to perform.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    /// The rule and the local assets it governs.
    pub job: &'a PublicationJob<'a>,
    /// Root of the rendered output tree.
    pub source_dir: &'a Utf8Path,
    /// Bucket and prefix to mirror into.
    pub destination: &'a Destination,
    /// ACL stamped onto every upload.
    pub acl: CannedAcl,
}

/// What a sync changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Objects uploaded.
    pub uploaded: usize,
    /// Stale objects deleted.
    pub deleted: usize,
}

/// The capability to mirror one rule's files into the destination.
pub trait BucketSync {
    /// Perform `request`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] on the first failed operation; operations
    /// already applied are not undone.
    fn sync(&self, request: &SyncRequest<'_>) -> Result<SyncReport, SyncError>;
}

/// [`BucketSync`] that lists, uploads and prunes through an [`ObjectStore`].
///
/// Every matching local file is uploaded whether or not it changed, so the
/// rule's metadata always lands. Remote objects matching the rule's filter
/// that are absent locally are deleted after the uploads.
pub struct MirrorSync<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> MirrorSync<'a> {
    /// Build a mirror over `store`.
    #[must_use]
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }
}

impl BucketSync for MirrorSync<'_> {
    fn sync(&self, request: &SyncRequest<'_>) -> Result<SyncReport, SyncError> {
        let destination = request.destination;
        let bucket = destination.bucket();
        let remote: Vec<String> = self
            .store
            .list(bucket, destination.prefix())
            .map_err(|source| SyncError::List {
                destination: destination.to_string(),
                source,
            })?
            .iter()
            .filter_map(|key| destination.relative_key(key))
            .map(str::to_owned)
            .collect();

        let diff = mirror_diff(request.job, &remote);
        for (asset, metadata) in &diff.uploads {
            let path = request.source_dir.join(asset.key());
            let body = std::fs::read(&path).map_err(|source| SyncError::Read {
                path: path.clone(),
                source,
            })?;
            let key = destination.key_for(asset.key());
            self.store
                .put(bucket, &key, &body, metadata, request.acl)
                .map_err(|source| SyncError::Upload {
                    key: key.clone(),
                    source,
                })?;
            debug!(
                "upload: {path} to s3://{bucket}/{key} ({}, {})",
                metadata.content_type, metadata.cache_control
            );
        }
        for relative in &diff.deletions {
            let key = destination.key_for(relative);
            self.store
                .delete(bucket, &key)
                .map_err(|source| SyncError::Delete {
                    key: key.clone(),
                    source,
                })?;
            debug!("delete: s3://{bucket}/{key}");
        }

        Ok(SyncReport {
            uploaded: diff.uploads.len(),
            deleted: diff.deletions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, eq};
    use publish_policy::{RenderedAsset, plan, standard_rules};

    fn rendered(files: &[&str]) -> (tempfile::TempDir, Utf8PathBuf, Vec<RenderedAsset>) {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
        for file in files {
            let path = root.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("mkdir");
            }
            std::fs::write(&path, file.as_bytes()).expect("write");
        }
        let assets = files.iter().map(|file| RenderedAsset::new(*file)).collect();
        (dir, root, assets)
    }

    #[test]
    fn canned_acl_header_values() {
        assert_eq!(CannedAcl::default().as_str(), "public-read");
        assert_eq!(CannedAcl::Private.to_string(), "private");
    }

    #[test]
    fn mirror_uploads_matches_and_prunes_within_prefix() {
        let (_guard, root, assets) = rendered(&["index.html", "posts/a.html", "app.js"]);
        let plan = plan(standard_rules(), &assets);
        let pages = &plan.jobs()[2];
        let destination = Destination::parse("s3://site/blog").expect("valid destination");

        let mut store = MockObjectStore::new();
        store
            .expect_list()
            .with(eq("site"), eq("blog/"))
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    "blog/index.html".to_owned(),
                    "blog/old.html".to_owned(),
                    "blog/old.js".to_owned(),
                ])
            });
        store
            .expect_put()
            .withf(|bucket, key, _, metadata, acl| {
                bucket == "site"
                    && (key == "blog/index.html" || key == "blog/posts/a.html")
                    && metadata.content_type.as_str() == "text/html"
                    && metadata.cache_control.header_value() == "max-age=600"
                    && *acl == CannedAcl::PublicRead
            })
            .times(2)
            .returning(|_, _, _, _, _| Ok(()));
        store
            .expect_delete()
            .with(eq("site"), eq("blog/old.html"))
            .times(1)
            .returning(|_, _| Ok(()));

        let report = MirrorSync::new(&store)
            .sync(&SyncRequest {
                job: pages,
                source_dir: &root,
                destination: &destination,
                acl: CannedAcl::PublicRead,
            })
            .expect("sync succeeds");

        assert_eq!(report, SyncReport { uploaded: 2, deleted: 1 });
    }

    #[test]
    fn upload_failure_stops_the_sync() {
        let (_guard, root, assets) = rendered(&["a.css", "b.css"]);
        let plan = plan(standard_rules(), &assets);
        let destination = Destination::parse("site").expect("valid destination");

        let mut store = MockObjectStore::new();
        store.expect_list().returning(|_, _| Ok(vec!["stale.css".to_owned()]));
        store
            .expect_put()
            .with(always(), eq("a.css"), always(), always(), always())
            .times(1)
            .returning(|_, key, _, _, _| {
                Err(StoreError::Rejected {
                    operation: "put",
                    key: key.to_owned(),
                    reason: "slow down".to_owned(),
                })
            });
        store.expect_delete().never();

        let err = MirrorSync::new(&store)
            .sync(&SyncRequest {
                job: &plan.jobs()[1],
                source_dir: &root,
                destination: &destination,
                acl: CannedAcl::PublicRead,
            })
            .expect_err("sync fails");

        assert!(matches!(err, SyncError::Upload { ref key, .. } if key == "a.css"));
    }

    #[test]
    fn missing_local_file_is_a_read_error() {
        let (_guard, root, _) = rendered(&[]);
        let assets = vec![RenderedAsset::new("ghost.js")];
        let plan = plan(standard_rules(), &assets);
        let destination = Destination::parse("site").expect("valid destination");

        let mut store = MockObjectStore::new();
        store.expect_list().returning(|_, _| Ok(Vec::new()));
        store.expect_put().never();

        let err = MirrorSync::new(&store)
            .sync(&SyncRequest {
                job: &plan.jobs()[0],
                source_dir: &root,
                destination: &destination,
                acl: CannedAcl::PublicRead,
            })
            .expect_err("sync fails");
        assert!(matches!(err, SyncError::Read { .. }));
    }
}
