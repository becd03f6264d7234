//! Execution layer for the external platform CLI.
//!
//! Every remote operation in this crate goes through [`SfCli`]: the
//! command line is split, spawned through the [`crate::subprocess`] seam,
//! output is stripped of terminal escapes, and the CLI's JSON envelope is
//! normalized into a [`CliResult`] or a typed [`SfCliError`].

pub mod error;
pub mod result;
pub mod retry;
pub mod strip;

pub use error::SfCliError;
pub use result::CliResult;
pub use retry::RetryPolicy;
pub use strip::strip_escape_sequences;

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::subprocess::{ProcessCommandBuilder, ProcessOutput, SubprocessManager};

// The platform CLI rejects self-signed scratch-org certificates and
// defaults to the REST deploy path, which storefront metadata cannot use.
// Applied to every invocation; per-run env entries override.
const SHIM_ENV: &[(&str, &str)] = &[
    ("NODE_TLS_REJECT_UNAUTHORIZED", "0"),
    ("SFDX_REST_DEPLOY", "false"),
];

/// Per-invocation options for [`SfCli::run`] / [`SfCli::run_json_with`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory; defaults to the configured base directory.
    pub working_dir: Option<PathBuf>,
    /// Extra environment entries, applied over the compatibility shim.
    pub env: HashMap<String, String>,
    /// Text piped to the child's stdin (anonymous Apex, mostly).
    pub stdin: Option<String>,
}

#[derive(Clone)]
pub struct SfCli {
    subprocess: SubprocessManager,
    base_dir: PathBuf,
}

impl SfCli {
    pub fn new(subprocess: SubprocessManager, base_dir: PathBuf) -> Self {
        Self {
            subprocess,
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Run a command line and return its escape-stripped stdout.
    ///
    /// Fails with the captured text when the process exits nonzero; no
    /// JSON interpretation is attempted.
    pub async fn run(
        &self,
        command_line: &str,
        options: RunOptions,
    ) -> Result<String, SfCliError> {
        let output = self.run_raw(command_line, &options).await?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(SfCliError::Unstructured {
                command: command_line.to_string(),
                message: Self::failure_text(&output),
            })
        }
    }

    /// Run a command line in machine-readable mode, retrying structured
    /// failures according to `policy`.
    pub async fn run_json(
        &self,
        command_line: &str,
        policy: RetryPolicy,
    ) -> Result<CliResult, SfCliError> {
        self.run_json_with(command_line, RunOptions::default(), policy)
            .await
    }

    /// Like [`SfCli::run_json`] with explicit working directory, env, and
    /// stdin. Appends `--json` if the command line does not carry it.
    ///
    /// Only structured failures (a parsed error envelope) consult the
    /// retry policy; transport failures and unparseable output are raised
    /// immediately with the captured text.
    pub async fn run_json_with(
        &self,
        command_line: &str,
        options: RunOptions,
        mut policy: RetryPolicy,
    ) -> Result<CliResult, SfCliError> {
        let command = Self::ensure_json_flag(command_line);
        loop {
            let output = self.run_raw(&command, &options).await?;
            match Self::classify(&command, output) {
                Ok(result) => return Ok(result),
                Err(err @ SfCliError::Structured { .. }) => {
                    if !policy.permits(err.error_name()) {
                        return Err(err);
                    }
                    policy.decrement();
                    tracing::warn!(
                        "Retrying `{}` after {:?}: {}",
                        command,
                        policy.delay,
                        err
                    );
                    if !policy.delay.is_zero() {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_raw(
        &self,
        command_line: &str,
        options: &RunOptions,
    ) -> Result<ProcessOutput, SfCliError> {
        let words = shell_words::split(command_line)?;
        let (program, args) = words.split_first().ok_or(SfCliError::EmptyCommand)?;

        let working_dir = options.working_dir.as_deref().unwrap_or(&self.base_dir);
        let mut builder = ProcessCommandBuilder::new(program)
            .args(args)
            .envs(SHIM_ENV.iter().copied())
            .envs(options.env.iter())
            .current_dir(working_dir);
        if let Some(stdin) = &options.stdin {
            builder = builder.stdin(stdin.clone());
        }

        let mut output = self.subprocess.runner().run(builder.build()).await?;
        output.stdout = strip_escape_sequences(&output.stdout);
        output.stderr = strip_escape_sequences(&output.stderr);
        Ok(output)
    }

    fn ensure_json_flag(command_line: &str) -> String {
        if command_line.split_whitespace().any(|word| word == "--json") {
            command_line.to_string()
        } else {
            format!("{command_line} --json")
        }
    }

    fn classify(command: &str, output: ProcessOutput) -> Result<CliResult, SfCliError> {
        if output.status.success() {
            let parsed = serde_json::from_str::<Value>(output.stdout.trim());
            return match parsed {
                Ok(json) => {
                    let result = CliResult::from_envelope(json, output.stdout, 0);
                    if result.is_success() {
                        Ok(result)
                    } else {
                        // The CLI sometimes exits zero in --json mode and
                        // reports the failure only inside the envelope.
                        Err(Self::structured_failure(result))
                    }
                }
                Err(_) => Ok(CliResult::success_raw(output.stdout)),
            };
        }

        let exit = i64::from(output.status.code().unwrap_or(1));
        // The error envelope usually lands on stdout in --json mode, but
        // some subcommands emit it on stderr.
        for text in [&output.stdout, &output.stderr] {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
                if json.is_object() {
                    let result = CliResult::from_envelope(json, text.clone(), exit);
                    return Err(Self::structured_failure(result));
                }
            }
        }

        Err(SfCliError::Unstructured {
            command: command.to_string(),
            message: Self::failure_text(&output),
        })
    }

    fn structured_failure(result: CliResult) -> SfCliError {
        let CliResult {
            raw,
            json,
            status,
            name,
            message,
        } = result;
        SfCliError::Structured {
            status,
            name: name.unwrap_or_else(|| "UnknownError".to_string()),
            message: message.unwrap_or_else(|| raw.trim().to_string()),
            payload: json.unwrap_or(Value::Null),
        }
    }

    fn failure_text(output: &ProcessOutput) -> String {
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match output.status.code() {
            Some(code) => format!("process exited with code {code}"),
            None => "process terminated abnormally".to_string(),
        }
    }
}
