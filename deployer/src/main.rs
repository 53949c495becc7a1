//! Site deployer entrypoint.
//!
//! Under the function runtime the binary serves job invocations until it is
//! shut down. Run by hand, it handles one job event and prints the result.

use camino::Utf8Path;
use clap::Parser;
use env_logger::Env;
use log::warn;
use publish_policy::standard_rules;
use site_deployer::artefact::download::S3Fetcher;
use site_deployer::artefact::extraction::ZipExtractor;
use site_deployer::artefact::generator::ProcessGenerator;
use site_deployer::aws::Credentials;
use site_deployer::aws::codepipeline::CodePipelineClient;
use site_deployer::aws::s3::{S3Client, S3Endpoint};
use site_deployer::config::DeployerConfig;
use site_deployer::error::{DeployError, Result};
use site_deployer::handler::Handler;
use site_deployer::notifier::CodePipelineNotifier;
use site_deployer::publish::{MirrorSync, S3Store};
use site_deployer::runtime::{RuntimeApi, serve};
use std::io::{Read, Write};

/// The production collaborators, built from configuration.
struct Services {
    fetcher: S3Fetcher,
    generator: ProcessGenerator,
    store: S3Store,
    notifier: CodePipelineNotifier,
}

impl Services {
    fn from_config(config: &DeployerConfig) -> Result<Self> {
        let credentials = Credentials::from_env().ok_or(DeployError::MissingCredentials)?;
        let endpoint = S3Endpoint::from_override(config.s3_endpoint.as_deref())?;
        let pipeline = match config.codepipeline_endpoint.as_deref() {
            Some(url) => CodePipelineClient::with_endpoint(url, &config.region, credentials.clone())?,
            None => CodePipelineClient::new(&config.region, credentials.clone()),
        };
        Ok(Self {
            fetcher: S3Fetcher::new(endpoint.clone(), &config.region),
            generator: ProcessGenerator::new(&config.generator, config.generator_timeout()),
            store: S3Store::new(S3Client::new(endpoint, &config.region, credentials)),
            notifier: CodePipelineNotifier::new(pipeline),
        })
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = DeployerConfig::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&config, &mut std::io::stdin(), &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(config: &DeployerConfig, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<()> {
    let runtime = config.runtime_api.as_deref().map(RuntimeApi::new);
    let services = match Services::from_config(config) {
        Ok(services) => services,
        Err(err) => {
            if let Some(api) = &runtime {
                if let Err(report_err) = api.report_init_error(err.kind(), &err.chain()) {
                    warn!("could not report initialisation failure: {report_err}");
                }
            }
            return Err(err);
        }
    };

    let extractor = ZipExtractor;
    let sync = MirrorSync::new(&services.store);
    let handler = Handler {
        fetcher: &services.fetcher,
        extractor: &extractor,
        generator: &services.generator,
        sync: &sync,
        notifier: &services.notifier,
        table: standard_rules(),
        work_root: config.work_root.as_deref(),
    };

    match runtime {
        Some(api) => Ok(serve(&api, &handler)?),
        None => {
            let event = read_event(config.event.as_deref(), stdin)?;
            let result = handler.handle(&event)?;
            writeln!(stdout, "{result}")?;
            Ok(())
        }
    }
}

/// Reads the job event from `path`, or from `stdin` when no path is given.
fn read_event(path: Option<&Utf8Path>, stdin: &mut dyn Read) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| DeployError::EventInput {
            source_name: path.to_string(),
            source,
        }),
        None => {
            let mut event = String::new();
            stdin
                .read_to_string(&mut event)
                .map_err(|source| DeployError::EventInput {
                    source_name: "standard input".to_owned(),
                    source,
                })?;
            Ok(event)
        }
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err.chain());
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::io::Cursor;

    const CREDENTIAL_VARS: [&str; 3] = [
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
    ];

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(DeployError::MissingCredentials), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("handler credentials missing"));
    }

    #[test]
    fn read_event_prefers_the_event_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("event.json")).expect("utf-8 path");
        std::fs::write(&path, "{\"from\":\"file\"}").expect("write event");

        let mut stdin = Cursor::new(b"{\"from\":\"stdin\"}".to_vec());
        let event = read_event(Some(&path), &mut stdin).expect("event");
        assert_eq!(event, "{\"from\":\"file\"}");
    }

    #[test]
    fn read_event_falls_back_to_stdin() {
        let mut stdin = Cursor::new(b"{\"from\":\"stdin\"}".to_vec());
        let event = read_event(None, &mut stdin).expect("event");
        assert_eq!(event, "{\"from\":\"stdin\"}");
    }

    #[test]
    fn read_event_names_a_missing_file() {
        let path = Utf8PathBuf::from("/nonexistent/event.json");
        let err = read_event(Some(&path), &mut std::io::empty()).expect_err("missing file");
        assert!(matches!(err, DeployError::EventInput { ref source_name, .. }
            if source_name == "/nonexistent/event.json"));
    }

    #[rstest]
    #[case::no_keys(None, None)]
    #[case::no_secret(Some("AKIDEXAMPLE"), None)]
    #[case::empty_secret(Some("AKIDEXAMPLE"), Some(""))]
    fn services_require_handler_credentials(
        #[case] access_key: Option<&str>,
        #[case] secret_key: Option<&str>,
    ) {
        temp_env::with_vars(
            [
                (CREDENTIAL_VARS[0], access_key),
                (CREDENTIAL_VARS[1], secret_key),
                (CREDENTIAL_VARS[2], None),
            ],
            || {
                let config = DeployerConfig::parse_from(["site-deployer"]);
                assert!(matches!(
                    Services::from_config(&config),
                    Err(DeployError::MissingCredentials)
                ));
            },
        );
    }

    #[test]
    fn services_reject_an_unusable_endpoint() {
        temp_env::with_vars(
            [
                (CREDENTIAL_VARS[0], Some("AKIDEXAMPLE")),
                (CREDENTIAL_VARS[1], Some("secret")),
                (CREDENTIAL_VARS[2], None),
            ],
            || {
                let config =
                    DeployerConfig::parse_from(["site-deployer", "--s3-endpoint", "ftp://store"]);
                assert!(matches!(
                    Services::from_config(&config),
                    Err(DeployError::Endpoint(_))
                ));
            },
        );
    }

    #[test]
    fn one_shot_run_fails_before_reading_without_credentials() {
        temp_env::with_vars_unset(CREDENTIAL_VARS, || {
            let config = DeployerConfig::parse_from(["site-deployer"]);
            let mut stdout = Vec::new();
            let err = run(&config, &mut std::io::empty(), &mut stdout).expect_err("no credentials");
            assert_eq!(err.kind(), "ConfigurationError");
            assert!(stdout.is_empty());
        });
    }
}
