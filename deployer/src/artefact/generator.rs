//! Site generator invocation.
//!
//! The generator is run once per job as
//! `<program> --source <dir> --destination <dir>/public`. Its output is
//! drained on background threads while the handler waits, so a chatty
//! generator cannot block on a full pipe.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Trait for rendering a source tree, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait SiteGenerator {
    /// Render `source` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if the generator cannot be started, exits
    /// unsuccessfully, or exceeds its time limit.
    fn generate(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), GenerationError>;
}

/// Errors arising from site generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator process could not be started.
    #[error("failed to start generator {program}")]
    Spawn {
        /// The generator executable.
        program: Utf8PathBuf,
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// The generator exited unsuccessfully.
    #[error("generator {program} failed with {status}: {stderr}")]
    Failed {
        /// The generator executable.
        program: Utf8PathBuf,
        /// The exit status.
        status: ExitStatus,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The generator exceeded its time limit and was killed.
    #[error("generator {program} timed out after {secs} seconds")]
    TimedOut {
        /// The generator executable.
        program: Utf8PathBuf,
        /// The limit that was exceeded.
        secs: u64,
    },

    /// The generator succeeded but produced no output directory.
    #[error("generator produced no output at {path}")]
    MissingOutput {
        /// The expected output directory.
        path: Utf8PathBuf,
    },

    /// The output directory holds no files.
    #[error("generator output at {path} is empty")]
    EmptyOutput {
        /// The empty output directory.
        path: Utf8PathBuf,
    },

    /// I/O error while supervising the generator.
    #[error("I/O error running generator")]
    Io(#[from] std::io::Error),
}

/// Runs an external generator executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGenerator {
    program: Utf8PathBuf,
    timeout: Duration,
}

impl ProcessGenerator {
    /// Create a generator running `program` with a time limit.
    #[must_use]
    pub fn new(program: impl Into<Utf8PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// The arguments passed to the generator.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use site_deployer::artefact::generator::ProcessGenerator;
    ///
    /// let args = ProcessGenerator::arguments(Utf8Path::new("/tmp/w"), Utf8Path::new("/tmp/w/public"));
    /// assert_eq!(args, ["--source", "/tmp/w", "--destination", "/tmp/w/public"]);
    /// ```
    #[must_use]
    pub fn arguments<'a>(source: &'a Utf8Path, destination: &'a Utf8Path) -> [&'a str; 4] {
        [
            "--source",
            source.as_str(),
            "--destination",
            destination.as_str(),
        ]
    }
}

impl SiteGenerator for ProcessGenerator {
    fn generate(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), GenerationError> {
        let args = Self::arguments(source, destination);
        info!("running {} {}", self.program, args.join(" "));

        let mut child = Command::new(self.program.as_std_path())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GenerationError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = child.wait_timeout(self.timeout)? else {
            if let Err(err) = child.kill() {
                warn!("failed to kill generator: {err}");
            }
            if let Err(err) = child.wait() {
                warn!("failed to reap generator: {err}");
            }
            return Err(GenerationError::TimedOut {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            });
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        for line in stdout.lines() {
            debug!("generator: {line}");
        }
        if !status.success() {
            return Err(GenerationError::Failed {
                program: self.program.clone(),
                status,
                stderr: stderr.trim().to_owned(),
            });
        }
        if !stderr.trim().is_empty() {
            warn!("generator reported: {}", stderr.trim());
        }
        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(err) = pipe.read_to_end(&mut buf) {
                debug!("generator output truncated: {err}");
            }
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Check that the generator left a non-empty output tree at `path`.
///
/// # Errors
///
/// Returns [`GenerationError::MissingOutput`] if `path` is not a directory
/// and [`GenerationError::EmptyOutput`] if it contains no files.
pub fn ensure_output(path: &Utf8Path) -> Result<(), GenerationError> {
    if !path.is_dir() {
        return Err(GenerationError::MissingOutput {
            path: path.to_owned(),
        });
    }
    let has_file = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .any(|entry| entry.file_type().is_file());
    if !has_file {
        return Err(GenerationError::EmptyOutput {
            path: path.to_owned(),
        });
    }
    Ok(())
}
