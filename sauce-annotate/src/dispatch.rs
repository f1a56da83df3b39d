// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line parsing and command execution.

use crate::{
    ExpectedError, SauceAnnotateExitCode,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter, StdoutStyles},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::{OwoColorize, Style};
use sauce_runner::{
    annotator::{CaseMatches, SessionAnnotator, find_case_sessions, has_tagged_sessions},
    build_log::BuildLog,
    client::{OfflineClient, SauceRestClient, SessionClient},
    config::{AccessKey, ConfigLocation, ConfigOverrides, SauceConfig},
    report::{SessionOutcome, SessionReport},
    test_result::TestResult,
};
use std::io::Write;
use tracing::{debug, info};

/// Annotates Sauce OnDemand sessions with the outcomes of the tests that ran them.
///
/// Test harnesses print `SauceOnDemandSessionID=<id> job-name=<test name>` for each remote
/// session they start. sauce-annotate finds these markers in JUnit reports and the build log,
/// and records each test's name, pass/fail status and build number on its Sauce jobs.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct SauceAnnotateApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(subcommand)]
    command: Command,
}

impl SauceAnnotateApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Annotate(opts) => opts.exec(&self.config, output, output_writer),
            Command::Scan(opts) => opts.exec(output, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Annotate the Sauce jobs referenced by test output
    ///
    /// For every test case, session markers tagged with the test's name are looked for in the
    /// test's captured output, then in the build log. Each matching job has its name and
    /// pass/fail status filled in if they are not already set, and is marked private and
    /// tagged with the build number.
    Annotate(AnnotateOpts),

    /// List the session markers found in test output, without contacting Sauce OnDemand
    Scan(ScanOpts),
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: $XDG_CONFIG_HOME/sauce-annotate/config.toml], or `none` to skip
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "SAUCE_ANNOTATE_CONFIG_FILE"
    )]
    config_file: Option<String>,
}

impl ConfigOpts {
    fn location(&self) -> ConfigLocation<'_> {
        ConfigLocation::from_cli_or_env(self.config_file.as_deref())
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Input options")]
struct InputOpts {
    /// JUnit report, or a directory of `*.xml` reports (can be specified multiple times)
    #[arg(long = "junit", value_name = "PATH", required = true)]
    junit: Vec<Utf8PathBuf>,

    /// Build console log, searched when a test's own output has no session markers
    #[arg(long, value_name = "PATH")]
    build_log: Option<Utf8PathBuf>,
}

impl InputOpts {
    fn read(&self) -> Result<(TestResult, BuildLog)> {
        let result = TestResult::from_paths(&self.junit)?;
        debug!(
            "read {} test cases in {} suites",
            result.case_count(),
            result.suites().len()
        );
        let log = match &self.build_log {
            Some(path) => BuildLog::from_path(path)?,
            None => BuildLog::empty(),
        };
        Ok((result, log))
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Sauce OnDemand options")]
struct CredentialOpts {
    /// Sauce username [env: SAUCE_USERNAME]
    #[arg(long, value_name = "NAME")]
    username: Option<String>,

    /// Sauce access key [env: SAUCE_ACCESS_KEY]
    #[arg(long, value_name = "KEY")]
    access_key: Option<String>,

    /// Sauce REST API endpoint [env: SAUCE_API_URL] [default: https://saucelabs.com/rest/v1]
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
}

impl CredentialOpts {
    fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            username: self.username.clone(),
            access_key: self.access_key.clone().map(AccessKey::new),
            api_url: self.api_url.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    /// A human-readable summary
    #[default]
    Human,

    /// Machine-readable JSON
    Json,
}

#[derive(Debug, Args)]
struct AnnotateOpts {
    #[clap(flatten)]
    input: InputOpts,

    #[clap(flatten)]
    credentials: CredentialOpts,

    /// Number of the build that ran the tests
    #[arg(long, value_name = "N", env = "BUILD_NUMBER")]
    build_number: u64,

    /// Write the session report as JSON to this path
    #[arg(long, value_name = "PATH")]
    report_out: Option<Utf8PathBuf>,

    /// Format of the summary printed to stdout
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormat,
}

impl AnnotateOpts {
    fn exec(
        self,
        config_opts: &ConfigOpts,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let (result, log) = self.input.read()?;

        // Credentials are only needed once a job has to be fetched.
        if !has_tagged_sessions(&result, &log) {
            debug!("no tagged session markers found, skipping configuration");
            let annotator = SessionAnnotator::new(OfflineClient);
            return self.annotate_with(&annotator, &result, &log, output, output_writer);
        }

        let overrides = self
            .credentials
            .to_overrides()
            .or(ConfigOverrides::from_env());
        let config = SauceConfig::load(config_opts.location(), overrides)?;
        debug!(
            "updating jobs for {} at {} (timeout {:?})",
            config.username, config.api_url, config.timeout
        );

        let annotator = SessionAnnotator::new(SauceRestClient::new(&config));
        self.annotate_with(&annotator, &result, &log, output, output_writer)
    }

    fn annotate_with<C: SessionClient>(
        &self,
        annotator: &SessionAnnotator<C>,
        result: &TestResult,
        log: &BuildLog,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let Some(report) = annotator.annotate_result(result, log, self.build_number) else {
            return Ok(SauceAnnotateExitCode::OK);
        };

        if let Some(path) = &self.report_out {
            report.write_json(path)?;
            info!("wrote session report to {path}");
        }

        let mut writer = output_writer.stdout_writer();
        match self.message_format {
            MessageFormat::Human => {
                write_report_summary(&report, &output.stdout_styles(), &mut writer)
                    .map_err(ExpectedError::write_output)?;
            }
            MessageFormat::Json => {
                let json = report.to_json_string()?;
                writeln!(writer, "{json}").map_err(ExpectedError::write_output)?;
            }
        }
        writer.flush().map_err(ExpectedError::write_output)?;

        Ok(SauceAnnotateExitCode::OK)
    }
}

fn write_report_summary(
    report: &SessionReport,
    styles: &StdoutStyles,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{} {} sessions in {} test cases for build {}",
        "Annotated".style(styles.bold),
        report.count_outcome(SessionOutcome::Updated),
        report.cases.len(),
        report.build_number,
    )?;

    for case in &report.cases {
        let (status, status_style) = pass_fail(case.passed, styles);
        writeln!(
            writer,
            "  {} {}",
            status.style(status_style),
            case.case_name.style(styles.bold)
        )?;
        for session in &case.sessions {
            let outcome_style = if session.outcome.is_failure() {
                styles.fail
            } else if session.outcome == SessionOutcome::Detected {
                styles.skip
            } else {
                styles.pass
            };
            writeln!(
                writer,
                "       {} {} {}",
                session.session_id,
                session.outcome.as_str().style(outcome_style),
                session.job_url.style(styles.dimmed),
            )?;
        }
    }

    Ok(())
}

fn pass_fail(passed: bool, styles: &StdoutStyles) -> (&'static str, Style) {
    if passed {
        ("PASS", styles.pass)
    } else {
        ("FAIL", styles.fail)
    }
}

#[derive(Debug, Args)]
struct ScanOpts {
    #[clap(flatten)]
    input: InputOpts,

    /// Format of the listing printed to stdout
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormat,
}

impl ScanOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let (result, log) = self.input.read()?;

        let found: Vec<_> = result
            .cases()
            .filter_map(|case| find_case_sessions(case, &log).map(|matches| (case, matches)))
            .collect();
        if found.is_empty() {
            info!("no Sauce OnDemand session IDs were found in the test output");
        }

        let mut writer = output_writer.stdout_writer();
        match self.message_format {
            MessageFormat::Human => {
                let styles = output.stdout_styles();
                for (case, matches) in &found {
                    let (status, status_style) = pass_fail(case.passed, &styles);
                    writeln!(
                        writer,
                        "{} {}",
                        status.style(status_style),
                        case.qualified_name.style(styles.bold)
                    )
                    .map_err(ExpectedError::write_output)?;
                    let kind = match matches {
                        CaseMatches::Tagged(_) => "tagged",
                        CaseMatches::Untagged(_) => "untagged",
                    };
                    for reference in matches.references() {
                        writeln!(
                            writer,
                            "    {} {}",
                            reference.session_id,
                            kind.style(styles.dimmed)
                        )
                        .map_err(ExpectedError::write_output)?;
                    }
                }
            }
            MessageFormat::Json => {
                let cases: Vec<_> = found
                    .iter()
                    .map(|(case, matches)| {
                        serde_json::json!({
                            "case-name": case.qualified_name,
                            "passed": case.passed,
                            "tagged": matches!(matches, CaseMatches::Tagged(_)),
                            "sessions": matches.references(),
                        })
                    })
                    .collect();
                let json = serde_json::to_string_pretty(&cases)
                    .map_err(|err| ExpectedError::write_output(err.into()))?;
                writeln!(writer, "{json}").map_err(ExpectedError::write_output)?;
            }
        }
        writer.flush().map_err(ExpectedError::write_output)?;

        Ok(SauceAnnotateExitCode::OK)
    }
}
