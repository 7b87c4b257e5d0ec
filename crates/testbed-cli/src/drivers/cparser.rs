//! C parser run on the preprocessed kernel sources.

use super::{Context, dump, init_build};
use crate::commands::{Mode, Project};
use testbed_core::{Build, Result};
use testbed_runner::{Script, Step};

const C_PARSER: &str = "/c-parser/standalone-parser/c-parser";

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::Cparser)?;
    let builds = ctx.builds(&doc, |_| true)?;

    if mode == Mode::Dump {
        dump(&builds);
        return Ok(0);
    }

    let summary = testbed_runner::run_all(&builds, |build| {
        let script = cparser_script(build);
        async move { ctx.run(build.name(), &script, false).await }
    })
    .await;
    Ok(summary.exit_code())
}

pub fn cparser_script(build: &Build) -> Script {
    let Some(l4v_arch) = build.l4v_arch.as_deref() else {
        return Script::new(vec![Step::fail(format!(
            "No verification architecture for {}.",
            build.name()
        ))]);
    };
    Script::new(vec![
        init_build(build),
        Step::command(["ninja", "kernel_all_pp_wrapper"]),
        Step::command([C_PARSER, l4v_arch, "--underscore_idents", "kernel/kernel_all_pp.c"]),
    ])
}
