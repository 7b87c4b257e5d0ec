//! seL4 test suite in simulation.

use super::{Context, dump, init_build, tee_report};
use crate::commands::{Mode, Project};
use testbed_core::{Build, Result};
use testbed_runner::{SIMULATION_TIMEOUT_SECS, Script, Step, simulation_expect};

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::Sel4testSim)?;
    let builds = ctx.builds(&doc, |_| true)?;

    if mode == Mode::Dump {
        dump(&builds);
        return Ok(0);
    }

    let summary = testbed_runner::run_all(&builds, |build| {
        let script = simulation_script(build);
        async move { ctx.run(build.name(), &script, true).await }
    })
    .await;
    Ok(summary.exit_code())
}

/// Build, then simulate with the console captured as the test report.
pub fn simulation_script(build: &Build) -> Script {
    let Some(success) = build.success.as_deref() else {
        return Script::new(vec![Step::fail(format!(
            "No success marker for {}.",
            build.name()
        ))]);
    };
    let expect = simulation_expect(success, None, SIMULATION_TIMEOUT_SECS);
    Script::new(vec![
        init_build(build),
        Step::command(["ninja"]),
        tee_report(&format!("expect -c '{expect}'")),
    ])
}
