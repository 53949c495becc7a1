//! Handler configuration.
//!
//! Every option can be supplied as a flag or through the environment, which
//! is how the function runtime configures the handler. None is required.

use camino::Utf8PathBuf;
use clap::Parser;
use std::time::Duration;

/// Render a pipeline's site bundle and publish it to S3.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "site-deployer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Render a pipeline's site bundle and publish it to S3.\n\n",
    "When AWS_LAMBDA_RUNTIME_API is set the handler serves invocations from the ",
    "function runtime until it is shut down. Otherwise it handles the single job ",
    "event read from --event, or from standard input.",
))]
pub struct DeployerConfig {
    /// Site generator executable.
    #[arg(long, env = "SITE_GENERATOR", default_value = "./hugo", value_name = "PATH")]
    pub generator: Utf8PathBuf,

    /// Seconds the generator may run before it is killed.
    #[arg(
        long,
        env = "SITE_GENERATOR_TIMEOUT_SECS",
        default_value_t = 600,
        value_name = "SECS"
    )]
    pub generator_timeout_secs: u64,

    /// Region for the destination bucket and pipeline callbacks.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Override the S3 endpoint, e.g. for a local object store.
    #[arg(long, env = "S3_ENDPOINT", value_name = "URL")]
    pub s3_endpoint: Option<String>,

    /// Override the CodePipeline endpoint.
    #[arg(long, env = "CODEPIPELINE_ENDPOINT", value_name = "URL")]
    pub codepipeline_endpoint: Option<String>,

    /// Directory under which working directories are created
    /// [default: the system temporary directory].
    #[arg(long, env = "DEPLOY_WORK_ROOT", value_name = "DIR")]
    pub work_root: Option<Utf8PathBuf>,

    /// Function runtime API authority, e.g. `127.0.0.1:9001`.
    #[arg(long, env = "AWS_LAMBDA_RUNTIME_API", value_name = "HOST:PORT")]
    pub runtime_api: Option<String>,

    /// Job event file for one-shot mode [default: standard input].
    #[arg(long, value_name = "FILE")]
    pub event: Option<Utf8PathBuf>,
}

impl DeployerConfig {
    /// The generator timeout as a [`Duration`].
    #[must_use]
    pub const fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 7] = [
        "SITE_GENERATOR",
        "SITE_GENERATOR_TIMEOUT_SECS",
        "AWS_REGION",
        "S3_ENDPOINT",
        "CODEPIPELINE_ENDPOINT",
        "DEPLOY_WORK_ROOT",
        "AWS_LAMBDA_RUNTIME_API",
    ];

    #[test]
    fn defaults_apply_without_environment() {
        temp_env::with_vars_unset(VARS, || {
            let config = DeployerConfig::parse_from(["site-deployer"]);
            assert_eq!(config.generator, Utf8PathBuf::from("./hugo"));
            assert_eq!(config.generator_timeout(), Duration::from_secs(600));
            assert_eq!(config.region, "us-east-1");
            assert!(config.s3_endpoint.is_none());
            assert!(config.work_root.is_none());
            assert!(config.runtime_api.is_none());
            assert!(config.event.is_none());
        });
    }

    #[test]
    fn environment_overrides_defaults() {
        temp_env::with_vars(
            [
                ("SITE_GENERATOR", Some("/opt/bin/hugo")),
                ("SITE_GENERATOR_TIMEOUT_SECS", Some("30")),
                ("AWS_REGION", Some("eu-west-1")),
                ("S3_ENDPOINT", Some("http://localhost:9000")),
                ("CODEPIPELINE_ENDPOINT", None),
                ("DEPLOY_WORK_ROOT", Some("/tmp/deploy")),
                ("AWS_LAMBDA_RUNTIME_API", Some("127.0.0.1:9001")),
            ],
            || {
                let config = DeployerConfig::parse_from(["site-deployer"]);
                assert_eq!(config.generator, Utf8PathBuf::from("/opt/bin/hugo"));
                assert_eq!(config.generator_timeout_secs, 30);
                assert_eq!(config.region, "eu-west-1");
                assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:9000"));
                assert_eq!(config.work_root, Some(Utf8PathBuf::from("/tmp/deploy")));
                assert_eq!(config.runtime_api.as_deref(), Some("127.0.0.1:9001"));
            },
        );
    }

    #[test]
    fn flags_take_precedence_over_environment() {
        temp_env::with_vars([("AWS_REGION", Some("eu-west-1"))], || {
            let config = DeployerConfig::parse_from([
                "site-deployer",
                "--region",
                "ap-southeast-2",
                "--event",
                "event.json",
            ]);
            assert_eq!(config.region, "ap-southeast-2");
            assert_eq!(config.event, Some(Utf8PathBuf::from("event.json")));
        });
    }
}
