//! Boot-failure detection on hardware console logs.
//!
//! A board that fails to boot leaves one of a few known traces in the
//! console log. Such a run is worth repeating rather than reporting as a
//! test failure.

use async_trait::async_trait;
use std::time::Duration;
use testbed_runner::{Outcome, StepHook, printer};
use tracing::{info, warn};

/// Pause before repeating, so a rebooting board can settle.
pub const BOOT_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

const SBI_TRAP: &str = "sbi_trap_error: hart";

/// Known boot-failure traces. A trace matches when consecutive log lines
/// each contain the corresponding entry.
pub const BOOT_FAILURE_PATTERNS: &[&[&str]] = &[
    // any board
    &["[[Boot timeout]]", "None", "0 tries remaining..", "", "[[Timeout]]"],
    // tx2
    &[
        "*** ERROR: `ipaddr' not set",
        "Config file not found",
        "Tegra186 (P2771-0000-500) #",
        "[[Timeout]]",
        "None",
    ],
    // imx8mq
    &["Retry count exceeded; starting again", "u-boot=>", "[[Timeout]]"],
    // hifive
    &[
        "ARP Retry count exceeded; starting again",
        "## Starting application at",
        "",
        "[[Timeout]]",
        "None",
        "",
        "console_run returned -1",
    ],
    // hifive, trapping on every hart
    &[
        "ARP Retry count exceeded; starting again",
        "## Starting application at",
        SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP,
        SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP,
        SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP,
        SBI_TRAP, SBI_TRAP, SBI_TRAP, SBI_TRAP,
        "",
        "[[Timeout]]",
        "None",
        "",
        "console_run returned -1",
    ],
];

fn matches_pattern(log: &[String], pattern: &[&str]) -> bool {
    !pattern.is_empty()
        && log.windows(pattern.len()).any(|window| {
            window
                .iter()
                .zip(pattern)
                .all(|(line, needle)| line.contains(needle))
        })
}

/// Index of the first boot-failure pattern found in `log`.
pub fn detect_boot_failure(log: &[String]) -> Option<usize> {
    BOOT_FAILURE_PATTERNS
        .iter()
        .position(|pattern| matches_pattern(log, pattern))
}

/// Trailer hook asking for a repeat when the previous step's output shows
/// a boot failure.
#[derive(Debug, Clone)]
pub struct BootFailureCheck {
    backoff: Duration,
}

impl BootFailureCheck {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }
}

impl Default for BootFailureCheck {
    fn default() -> Self {
        Self::new(BOOT_FAILURE_BACKOFF)
    }
}

#[async_trait]
impl StepHook for BootFailureCheck {
    async fn call(&self, prior_output: &[String]) -> Outcome {
        if prior_output.is_empty() {
            println!("No log to check boot failure on.");
            return Outcome::Success;
        }

        match detect_boot_failure(prior_output) {
            Some(pattern) => {
                warn!(pattern, backoff = ?self.backoff, "Boot failure detected");
                printer::error("Boot failure detected.");
                tokio::time::sleep(self.backoff).await;
                Outcome::Repeat
            }
            None => {
                info!(lines = prior_output.len(), "No boot failure in log");
                Outcome::Success
            }
        }
    }

    fn name(&self) -> &str {
        "boot-failure-check"
    }
}
