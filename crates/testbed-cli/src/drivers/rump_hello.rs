//! Rumprun hello world.

use super::{Context, init_build, run_standard};
use crate::commands::{Mode, Project};
use testbed_core::{Build, Result};
use testbed_runner::{SIMULATION_TIMEOUT_SECS, Script, Step, simulation_step};

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::RumpHello)?;
    let builds = ctx.builds(&doc, |_| true)?;
    run_standard(ctx, mode, &builds, adjust, build_script).await
}

fn adjust(build: &mut Build) {
    if let Some(mode) = build.mode() {
        build.files = build.platform().image_names(mode, "roottask");
    }
    build.remove_setting("BAMBOO");
}

/// Simulation builds run in place; hardware builds pack their images.
pub fn build_script(build: &Build) -> Script {
    let mut steps = vec![init_build(build), Step::command(["ninja"])];

    if build.req.as_ref().is_some_and(|r| r.is_sim()) {
        match build.success.as_deref() {
            Some(success) => steps.push(simulation_step(success, None, SIMULATION_TIMEOUT_SECS)),
            None => steps.push(Step::fail(format!("No success marker for {}.", build.name()))),
        }
    } else {
        steps.push(Step::command([
            "tar".to_string(),
            "czf".to_string(),
            format!("../{}-images.tar.gz", build.name()),
            "images/".to_string(),
        ]));
    }
    Script::new(steps)
}
