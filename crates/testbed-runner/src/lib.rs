//! Build script execution for Testbed.
//!
//! Runs the steps of a build script one by one in a fresh build directory,
//! retries attempts that end in `Outcome::Repeat`, summarises test reports
//! and aggregates the outcomes of a batch of builds.

pub mod driver;
pub mod junit;
pub mod outcome;
pub mod printer;
pub mod runner;
pub mod shell;
pub mod summary;

pub use driver::{
    DEFAULT_ATTEMPTS, JUNIT_RESULTS, PARSED_JUNIT_RESULTS, RunDriver, SIMULATION_TIMEOUT_SECS,
    sanitise_junit_step, simulation_expect, simulation_step,
};
pub use junit::{ReportSummary, parse_report, summarise_report};
pub use outcome::Outcome;
pub use runner::{CommandRunner, FnHook, Script, Step, StepHook, StepOutput};
pub use shell::ProcessRunner;
pub use summary::{BatchSummary, Named, run_all};
