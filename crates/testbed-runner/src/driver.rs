//! Run driver: attempts, trailers and retries for one build.

use crate::junit::summarise_report;
use crate::outcome::Outcome;
use crate::printer;
use crate::runner::{CommandRunner, Script, Step, StepOutput};
use crate::shell::ProcessRunner;
use std::path::{Path, PathBuf};
use testbed_core::Result;
use tracing::{debug, error, info};

/// Attempts per build before a repeating run counts as failed.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Raw test report written by the test run.
pub const JUNIT_RESULTS: &str = "results.xml";

/// Sanitised copy of the raw report; this is the file that gets summarised.
pub const PARSED_JUNIT_RESULTS: &str = "parsed_results.xml";

/// Number of failed case names shown after a failed run.
const MAX_FAILED_CASES_SHOWN: usize = 10;

/// Step turning the raw report into a well-formed one. Expects to run in the
/// build directory of a standard project checkout.
pub fn sanitise_junit_step() -> Step {
    Step::command([
        "python3",
        "../projects/seL4_libs/libsel4test/tools/extract_results.py",
        "-q",
        JUNIT_RESULTS,
        PARSED_JUNIT_RESULTS,
    ])
}

/// Default time a simulation may take to print its success marker.
pub const SIMULATION_TIMEOUT_SECS: u64 = 1200;

/// `expect` program running `./simulate` until `success` appears on the
/// console. Stops early with a failure if `failure` appears first.
pub fn simulation_expect(success: &str, failure: Option<&str>, timeout_secs: u64) -> String {
    let fail = failure
        .map(|f| format!(" \"{f}\" {{exit 1}}"))
        .unwrap_or_default();
    format!(
        "spawn ./simulate; set timeout {timeout_secs}; expect \"{success}\" {{exit 0}}{fail} timeout {{exit 1}}"
    )
}

/// Step running [`simulation_expect`].
pub fn simulation_step(success: &str, failure: Option<&str>, timeout_secs: u64) -> Step {
    Step::command([
        "expect".to_string(),
        "-c".to_string(),
        simulation_expect(success, failure, timeout_secs),
    ])
}

/// Runs build scripts in `<manifest>/build`.
pub struct RunDriver<R = ProcessRunner> {
    manifest_dir: PathBuf,
    attempts: u32,
    runner: R,
}

impl RunDriver<ProcessRunner> {
    pub fn new(manifest_dir: impl Into<PathBuf>) -> Self {
        Self::with_runner(manifest_dir, ProcessRunner)
    }
}

impl<R: CommandRunner> RunDriver<R> {
    pub fn with_runner(manifest_dir: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            attempts: DEFAULT_ATTEMPTS,
            runner,
        }
    }

    /// Set the attempt budget (at least one).
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    pub fn build_dir(&self) -> PathBuf {
        self.manifest_dir.join("build")
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `script` for the build or run called `name`.
    ///
    /// Each attempt starts from an empty build directory. The primary steps
    /// stop at the first non-success; the trailer runs unless the attempt
    /// was skipped. With `junit`, the sanitised report is summarised and
    /// decides the result of an otherwise successful attempt. A run still
    /// asking for a repeat when the attempts are used up fails.
    pub async fn run_build_script(&self, name: &str, script: &Script, junit: bool) -> Outcome {
        let sanitise = junit.then(sanitise_junit_step);
        let mut result = Outcome::Skip;
        let mut failed_cases = Vec::new();

        printer::step_start(name);

        for attempt in 1..=self.attempts {
            info!(build = name, attempt, "Starting attempt");
            failed_cases.clear();

            let build_dir = match self.fresh_build_dir().await {
                Ok(dir) => dir,
                Err(e) => {
                    error!(build = name, error = %e, "Cannot prepare build directory");
                    printer::error(&format!(">>> cannot prepare build directory: {e}"));
                    result = Outcome::Failure;
                    break;
                }
            };

            let mut prior = Vec::new();
            result = Outcome::Success;
            for step in script.steps.iter().chain(sanitise.iter()) {
                let output = self.run_step(step, &build_dir, &prior).await;
                prior = output.lines;
                if output.outcome != Outcome::Success {
                    result = output.outcome;
                    break;
                }
            }

            match result {
                Outcome::Failure => printer::error(">>> command failed, aborting."),
                Outcome::Skip => printer::skip(">>> skipping this test."),
                _ => {}
            }

            if result != Outcome::Skip {
                for step in &script.final_steps {
                    let output = self.run_step(step, &build_dir, &prior).await;
                    prior = output.lines;
                    let (folded, stop) = result.with_trailer(output.outcome);
                    result = folded;
                    if stop {
                        break;
                    }
                }
            }

            if result == Outcome::Success && junit {
                let report = build_dir.join(PARSED_JUNIT_RESULTS);
                match summarise_report(&report) {
                    Ok(summary) => {
                        result = summary.outcome();
                        failed_cases = summary.failed_cases;
                    }
                    Err(e) => {
                        printer::error(&format!("Error reading {}: {e}", report.display()));
                        result = Outcome::Failure;
                    }
                }
            }

            if result != Outcome::Repeat {
                break;
            }
            if attempt < self.attempts {
                printer::warn(">>> command failed, repeating test.");
            } else {
                printer::error(">>> command failed, no tries left.");
                result = Outcome::Failure;
            }
        }

        printer::step_end(name, result);
        if result == Outcome::Failure && !failed_cases.is_empty() {
            let shown = failed_cases
                .iter()
                .take(MAX_FAILED_CASES_SHOWN)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let more = if failed_cases.len() > MAX_FAILED_CASES_SHOWN {
                " ..."
            } else {
                ""
            };
            printer::error(&format!("Failed cases: {shown}{more}"));
        }
        println!();

        result
    }

    async fn run_step(&self, step: &Step, cwd: &Path, prior: &[String]) -> StepOutput {
        match step {
            Step::Command(args) => match self.runner.run(args, cwd).await {
                Ok(output) => output,
                Err(e) => {
                    error!(command = %args.join(" "), error = %e, "Command could not be run");
                    printer::error(&format!(">>> {e}"));
                    StepOutput::new(Outcome::Failure)
                }
            },
            Step::Hook(hook) => {
                debug!(hook = hook.name(), lines = prior.len(), "Running hook");
                StepOutput::new(hook.call(prior).await)
            }
        }
    }

    async fn fresh_build_dir(&self) -> Result<PathBuf> {
        let dir = self.build_dir();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_step_command() {
        let Step::Command(args) = simulation_step("All is well", Some("FAILED"), 600) else {
            panic!("expected a command step");
        };
        assert_eq!(args[0], "expect");
        assert_eq!(
            args[2],
            "spawn ./simulate; set timeout 600; expect \"All is well\" {exit 0} \"FAILED\" {exit 1} timeout {exit 1}"
        );
    }

    #[test]
    fn test_simulation_step_without_failure_marker() {
        let Step::Command(args) = simulation_step("OK", None, 1200) else {
            panic!("expected a command step");
        };
        assert_eq!(
            args[2],
            "spawn ./simulate; set timeout 1200; expect \"OK\" {exit 0} timeout {exit 1}"
        );
    }

    #[test]
    fn test_attempts_at_least_one() {
        let driver = RunDriver::new("/tmp").attempts(0);
        assert_eq!(driver.attempts, 1);
        assert_eq!(driver.build_dir(), PathBuf::from("/tmp/build"));
    }
}
