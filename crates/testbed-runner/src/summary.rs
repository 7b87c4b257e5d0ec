//! Result aggregation over a batch of builds.

use crate::outcome::Outcome;
use crate::printer;
use console::style;
use std::future::Future;
use testbed_core::Build;
use tracing::info;

/// Anything the batch driver can report by name.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Build {
    fn name(&self) -> &str {
        Build::name(self)
    }
}

/// Build names partitioned by final outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one run. A leftover repeat counts as a failure.
    pub fn record(&mut self, name: impl Into<String>, outcome: Outcome) {
        let name = name.into();
        match outcome {
            Outcome::Success => self.succeeded.push(name),
            Outcome::Skip => self.skipped.push(name),
            Outcome::Failure | Outcome::Repeat => self.failed.push(name),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Process exit code: 0 without failures, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn print(&self) {
        let line = format!("Successful tests: {}", self.succeeded.join(", "));
        if self.is_success() {
            println!("{}", style(line).green());
        } else {
            println!("{line}");
        }
        if !self.skipped.is_empty() {
            println!();
            printer::skip(&format!("SKIPPED tests: {}", self.skipped.join(", ")));
        }
        if !self.failed.is_empty() {
            println!();
            printer::error(&format!("FAILED tests: {}", self.failed.join(", ")));
        }
    }
}

/// Run every item in order, whatever the outcome of the ones before, then
/// print the summary.
pub async fn run_all<'a, T, F, Fut>(items: &'a [T], mut run: F) -> BatchSummary
where
    T: Named,
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = Outcome>,
{
    println!();
    let mut summary = BatchSummary::new();
    for item in items {
        let outcome = run(item).await;
        info!(build = item.name(), %outcome, "Run finished");
        summary.record(item.name(), outcome);
    }
    summary.print();
    summary
}
