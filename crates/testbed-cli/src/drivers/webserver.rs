//! seL4 web server application.

use super::{Context, capdl_images, images_script, run_standard};
use crate::commands::{Mode, Project};
use testbed_core::{Build, Result};
use testbed_runner::{SIMULATION_TIMEOUT_SECS, Script, simulation_step};

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::Webserver)?;
    let builds = ctx.builds(&doc, |_| true)?;
    run_standard(ctx, mode, &builds, capdl_images, build_script).await
}

pub fn build_script(build: &Build) -> Script {
    let mut build = build.clone();
    build.remove_setting("BAMBOO");

    let mut steps = images_script(&build);
    let plat = build.platform();
    if plat.has_simulation && plat.name != "PC99" {
        if let Some(success) = build.success.as_deref() {
            steps.push(simulation_step(success, None, SIMULATION_TIMEOUT_SECS));
        }
    }
    Script::new(steps)
}
