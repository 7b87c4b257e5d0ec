//! End-of-job lock cleanup.

use crate::hardware::Hardware;
use std::path::Path;
use testbed_runner::{CommandRunner, Outcome};
use tracing::warn;

/// Run `command`, logging and discarding any failure. Only for cleanup,
/// where an error must not fail the job.
pub async fn best_effort<R: CommandRunner>(runner: &R, command: &[String], cwd: &Path) {
    match runner.run(command, cwd).await {
        Ok(output) if output.outcome == Outcome::Success => {}
        Ok(output) => {
            warn!(command = %command.join(" "), outcome = %output.outcome, "Cleanup command failed, ignoring");
        }
        Err(e) => {
            warn!(command = %command.join(" "), error = %e, "Cleanup command could not run, ignoring");
        }
    }
}

/// Give up every machine this job may hold or wait for.
///
/// `requirements` holds one requirement list per build or run; each
/// distinct non-empty list is handled once. For its selected machine any
/// pending wait is cancelled, a held lock is released and the lock status
/// is printed.
pub async fn release_locks<R, I>(hw: &Hardware, runner: &R, cwd: &Path, requirements: I)
where
    R: CommandRunner,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut distinct: Vec<Vec<String>> = Vec::new();
    for req in requirements {
        if !req.is_empty() && !distinct.contains(&req) {
            distinct.push(req);
        }
    }

    for req in &distinct {
        let Some(machine) = hw.select_machine(req) else {
            continue;
        };
        best_effort(runner, &hw.queue.cancel(machine), cwd).await;
        best_effort(runner, &hw.queue.release(machine), cwd).await;
        best_effort(runner, &hw.queue.status(machine), cwd).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobIdentity;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use testbed_core::{Error, Result};
    use testbed_runner::StepOutput;

    /// Records commands; every other one fails to spawn.
    #[derive(Default)]
    struct Flaky {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for Flaky {
        async fn run(&self, command: &[String], _cwd: &Path) -> Result<StepOutput> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(command.join(" "));
            if seen.len() % 2 == 0 {
                return Err(Error::Spawn {
                    command: command.join(" "),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(StepOutput::new(Outcome::Failure))
        }
    }

    fn hardware() -> Hardware {
        let job = JobIdentity::new("r", "w", "7", "j", 0);
        Hardware::new(job, "mq.sh")
    }

    #[tokio::test]
    async fn test_release_locks_deduplicates_and_swallows_errors() {
        let runner = Flaky::default();
        let reqs = vec![
            vec!["tx2a".to_string(), "tx2b".to_string()],
            vec![],
            vec!["tx2a".to_string(), "tx2b".to_string()],
            vec!["hifive".to_string()],
        ];

        release_locks(&hardware(), &runner, Path::new("."), reqs).await;

        let seen = runner.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "mq.sh sem -cancel tx2a -k r-w-7-j-0",
                "mq.sh sem -signal tx2a -k r-w-7-j-0",
                "mq.sh sem -info tx2a",
                "mq.sh sem -cancel hifive -k r-w-7-j-0",
                "mq.sh sem -signal hifive -k r-w-7-j-0",
                "mq.sh sem -info hifive",
            ]
        );
    }
}
