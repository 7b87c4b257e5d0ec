//! Physical test machines for Testbed.
//!
//! Job identity and machine selection, the command protocol of the external
//! machine queue (`mq.sh`), hardware run scripts, boot-failure detection and
//! best-effort lock cleanup at the end of a job.

pub mod boot;
pub mod cleanup;
pub mod hardware;
pub mod job;
pub mod queue;

pub use boot::{BOOT_FAILURE_BACKOFF, BOOT_FAILURE_PATTERNS, BootFailureCheck, detect_boot_failure};
pub use cleanup::{best_effort, release_locks};
pub use hardware::{Hardware, Run};
pub use job::{JobIdentity, select_machine};
pub use queue::{DEFAULT_RECLAIM_TIMEOUT_SECS, MachineQueue, RunRequest};
