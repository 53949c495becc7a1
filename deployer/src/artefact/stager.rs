//! Working directory lifecycle and the staging sequence.
//!
//! A [`Workspace`] owns a temporary directory that holds the downloaded
//! bundle and the extracted site. Dropping it removes everything, so the
//! directory is cleaned up on every exit path including unwinding.

use super::download::SourceFetcher;
use super::extraction::ArchiveExtractor;
use super::generator::{SiteGenerator, ensure_output};
use crate::error::{DeployError, Result};
use crate::job::PipelineJob;
use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use std::io;
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "site-deploy-";
const BUNDLE_NAME: &str = "bundle.zip";
const SITE_DIR: &str = "site";
const OUTPUT_DIR: &str = "public";

/// An exclusive working directory for one job.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    /// Create a fresh workspace, under `parent` when given, otherwise in the
    /// system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or its path is
    /// not valid UTF-8.
    pub fn create(parent: Option<&Utf8Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("workspace path is not UTF-8: {}", path.display()),
            )
        })?;
        Ok(Self { dir, root })
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the source bundle is downloaded.
    #[must_use]
    pub fn bundle_path(&self) -> Utf8PathBuf {
        self.root.join(BUNDLE_NAME)
    }

    /// Where the bundle is extracted; the generator's source directory.
    #[must_use]
    pub fn site_dir(&self) -> Utf8PathBuf {
        self.root.join(SITE_DIR)
    }

    /// Where the generator writes the rendered site.
    #[must_use]
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.site_dir().join(OUTPUT_DIR)
    }

    /// Remove the workspace, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while deleting the directory.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Fetches, extracts and renders a job's source bundle.
pub struct Stager<'a> {
    fetcher: &'a dyn SourceFetcher,
    extractor: &'a dyn ArchiveExtractor,
    generator: &'a dyn SiteGenerator,
}

impl<'a> Stager<'a> {
    /// Create a stager from its collaborators.
    #[must_use]
    pub fn new(
        fetcher: &'a dyn SourceFetcher,
        extractor: &'a dyn ArchiveExtractor,
        generator: &'a dyn SiteGenerator,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            generator,
        }
    }

    /// Stage `job` into `workspace`, returning the rendered output directory.
    ///
    /// The bundle is deleted once extracted.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Retrieval`], [`DeployError::Extraction`] or
    /// [`DeployError::Generation`] for a failure in the matching step.
    pub fn stage(&self, job: &PipelineJob, workspace: &Workspace) -> Result<Utf8PathBuf> {
        let bundle = workspace.bundle_path();
        let bytes = self
            .fetcher
            .fetch(&job.source, &job.artifact_credentials, bundle.as_std_path())?;
        info!("fetched {} ({bytes} bytes)", job.source);

        let site = workspace.site_dir();
        std::fs::create_dir_all(&site).map_err(|source| DeployError::Workspace { source })?;
        let files = self
            .extractor
            .extract(bundle.as_std_path(), site.as_std_path())?;
        info!("extracted {files} files into {site}");
        if let Err(err) = std::fs::remove_file(&bundle) {
            warn!("failed to remove bundle {bundle}: {err}");
        }

        let output = workspace.output_dir();
        self.generator
            .generate(&site, &output)
            .and_then(|()| ensure_output(&output))
            .map_err(DeployError::from)?;
        info!("rendered site into {output}");
        Ok(output)
    }
}
