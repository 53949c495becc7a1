//! In-memory collaborators for exercising the handler without AWS or a
//! site generator.

use crate::artefact::download::{DownloadError, SourceFetcher};
use crate::artefact::generator::{GenerationError, SiteGenerator};
use crate::aws::Credentials;
use crate::job::SourceLocation;
use crate::notifier::{JobOutcome, NotifyError, PipelineNotifier};
use crate::publish::{CannedAcl, ObjectStore, StoreError};
use camino::{Utf8Path, Utf8PathBuf};
use publish_policy::ObjectMetadata;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::ExitStatus;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// An object held by [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object body.
    pub body: Vec<u8>,
    /// Metadata from the last upload, `None` for seeded objects.
    pub metadata: Option<ObjectMetadata>,
    /// ACL from the last upload, `None` for seeded objects.
    pub acl: Option<CannedAcl>,
    /// How many times the object has been uploaded.
    pub uploads: usize,
}

/// One call made against an [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// A listing of `bucket` under `prefix`.
    List {
        /// Bucket listed.
        bucket: String,
        /// Prefix listed.
        prefix: String,
    },
    /// An upload of `key`.
    Put {
        /// Bucket written.
        bucket: String,
        /// Key written.
        key: String,
    },
    /// A deletion of `key`.
    Delete {
        /// Bucket written.
        bucket: String,
        /// Key deleted.
        key: String,
    },
}

/// [`ObjectStore`] backed by a map, with optional scripted upload failures.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RefCell<BTreeMap<(String, String), StoredObject>>,
    calls: RefCell<Vec<StoreCall>>,
    fail_put_suffix: RefCell<Option<String>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object in the store without recording a call.
    pub fn seed(&self, bucket: &str, key: &str, body: &[u8]) {
        self.objects.borrow_mut().insert(
            (bucket.to_owned(), key.to_owned()),
            StoredObject {
                body: body.to_vec(),
                metadata: None,
                acl: None,
                uploads: 0,
            },
        );
    }

    /// Reject every upload whose key ends with `suffix`.
    pub fn fail_puts_ending_with(&self, suffix: &str) {
        self.fail_put_suffix.replace(Some(suffix.to_owned()));
    }

    /// The objects in `bucket`, keyed by object key.
    #[must_use]
    pub fn objects(&self, bucket: &str) -> BTreeMap<String, StoredObject> {
        self.objects
            .borrow()
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|((_, key), object)| (key.clone(), object.clone()))
            .collect()
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    /// How many listings were made, which equals the number of syncs run.
    #[must_use]
    pub fn list_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, StoreCall::List { .. }))
            .count()
    }
}

impl ObjectStore for InMemoryStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.calls.borrow_mut().push(StoreCall::List {
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
        });
        Ok(self
            .objects
            .borrow()
            .keys()
            .filter(|(b, key)| b == bucket && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect())
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        metadata: &ObjectMetadata,
        acl: CannedAcl,
    ) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(StoreCall::Put {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        });
        if let Some(suffix) = self.fail_put_suffix.borrow().as_deref() {
            if key.ends_with(suffix) {
                return Err(StoreError::Rejected {
                    operation: "put",
                    key: key.to_owned(),
                    reason: "AccessDenied".to_owned(),
                });
            }
        }
        let mut objects = self.objects.borrow_mut();
        let entry = objects
            .entry((bucket.to_owned(), key.to_owned()))
            .or_insert_with(|| StoredObject {
                body: Vec::new(),
                metadata: None,
                acl: None,
                uploads: 0,
            });
        entry.body = body.to_vec();
        entry.metadata = Some(metadata.clone());
        entry.acl = Some(acl);
        entry.uploads += 1;
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(StoreCall::Delete {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        });
        self.objects
            .borrow_mut()
            .remove(&(bucket.to_owned(), key.to_owned()));
        Ok(())
    }
}

/// [`PipelineNotifier`] that records every outcome.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    outcomes: RefCell<Vec<(String, JobOutcome)>>,
    fail: Cell<bool>,
}

impl RecordingNotifier {
    /// Create a notifier that accepts every outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record outcomes but report each delivery as failed.
    pub fn fail_deliveries(&self) {
        self.fail.set(true);
    }

    /// Outcomes recorded so far, with their job ids.
    #[must_use]
    pub fn outcomes(&self) -> Vec<(String, JobOutcome)> {
        self.outcomes.borrow().clone()
    }
}

impl PipelineNotifier for RecordingNotifier {
    fn notify(&self, job_id: &str, outcome: &JobOutcome) -> Result<(), NotifyError> {
        self.outcomes
            .borrow_mut()
            .push((job_id.to_owned(), outcome.clone()));
        if self.fail.get() {
            return Err(NotifyError::Rejected {
                reason: "callback unavailable".to_owned(),
            });
        }
        Ok(())
    }
}

/// [`SourceFetcher`] that writes a fixed bundle, or reports it missing.
#[derive(Debug, Default)]
pub struct StubFetcher {
    bundle: Option<Vec<u8>>,
    fetched: RefCell<Vec<SourceLocation>>,
}

impl StubFetcher {
    /// A fetcher that always returns `bundle`.
    #[must_use]
    pub fn serving(bundle: Vec<u8>) -> Self {
        Self {
            bundle: Some(bundle),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// A fetcher for which every bundle is missing.
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// Locations requested so far.
    #[must_use]
    pub fn fetched(&self) -> Vec<SourceLocation> {
        self.fetched.borrow().clone()
    }
}

impl SourceFetcher for StubFetcher {
    fn fetch(
        &self,
        source: &SourceLocation,
        _credentials: &Credentials,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        self.fetched.borrow_mut().push(source.clone());
        let Some(bundle) = &self.bundle else {
            return Err(DownloadError::NotFound {
                location: source.to_string(),
            });
        };
        std::fs::write(dest, bundle)?;
        Ok(u64::try_from(bundle.len()).unwrap_or(u64::MAX))
    }
}

/// What a [`ScriptedGenerator`] does when run.
#[derive(Debug, Clone)]
pub enum GeneratorScript {
    /// Write these files, relative to the destination, and succeed.
    Render(Vec<(String, Vec<u8>)>),
    /// Exit with this code and message on stderr.
    Fail {
        /// Exit code.
        code: i32,
        /// Standard error output.
        stderr: String,
    },
    /// Succeed without writing anything.
    NoOutput,
}

/// [`SiteGenerator`] that follows a script instead of spawning a process.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: GeneratorScript,
    runs: RefCell<Vec<(Utf8PathBuf, Utf8PathBuf)>>,
}

impl ScriptedGenerator {
    /// Create a generator following `script`.
    #[must_use]
    pub fn new(script: GeneratorScript) -> Self {
        Self {
            script,
            runs: RefCell::new(Vec::new()),
        }
    }

    /// A generator that renders `files` as `(relative path, body)` pairs.
    #[must_use]
    pub fn rendering<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(GeneratorScript::Render(
            files
                .into_iter()
                .map(|(path, body)| (path.to_owned(), body.as_bytes().to_vec()))
                .collect(),
        ))
    }

    /// `(source, destination)` pairs of every run so far.
    #[must_use]
    pub fn runs(&self) -> Vec<(Utf8PathBuf, Utf8PathBuf)> {
        self.runs.borrow().clone()
    }
}

impl SiteGenerator for ScriptedGenerator {
    fn generate(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), GenerationError> {
        self.runs
            .borrow_mut()
            .push((source.to_owned(), destination.to_owned()));
        match &self.script {
            GeneratorScript::Render(files) => {
                for (path, body) in files {
                    let target = destination.join(path);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&target, body)?;
                }
                Ok(())
            }
            GeneratorScript::Fail { code, stderr } => Err(GenerationError::Failed {
                program: Utf8PathBuf::from("./hugo"),
                status: exit_status(*code),
                stderr: stderr.clone(),
            }),
            GeneratorScript::NoOutput => Ok(()),
        }
    }
}

/// Build a ZIP archive in memory from `(name, body)` pairs.
///
/// # Errors
///
/// Returns the archive writer's error if an entry cannot be added.
pub fn zip_bytes(entries: &[(&str, &str)]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in entries {
        writer.start_file(*name, options)?;
        writer.write_all(body.as_bytes())?;
    }
    Ok(writer.finish()?.into_inner())
}

/// A pipeline job event for `job_id` publishing to `user_parameters`.
#[must_use]
pub fn pipeline_event_json(job_id: &str, user_parameters: &str) -> String {
    serde_json::json!({
        "CodePipeline.job": {
            "id": job_id,
            "accountId": "111111111111",
            "data": {
                "actionConfiguration": {
                    "configuration": {
                        "FunctionName": "site-deployer",
                        "UserParameters": user_parameters
                    }
                },
                "inputArtifacts": [{
                    "name": "SiteSource",
                    "revision": "0123456789abcdef",
                    "location": {
                        "type": "S3",
                        "s3Location": {
                            "bucketName": "pipeline-artifacts",
                            "objectKey": "site/SiteSource/bundle.zip"
                        }
                    }
                }],
                "outputArtifacts": [],
                "artifactCredentials": {
                    "accessKeyId": "ASIAEXAMPLE",
                    "secretAccessKey": "secret",
                    "sessionToken": "token"
                }
            }
        }
    })
    .to_string()
}
