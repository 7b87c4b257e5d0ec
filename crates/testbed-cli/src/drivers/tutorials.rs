//! seL4 tutorials.

use super::{Context, dump, tee_report};
use crate::commands::{Mode, Project};
use crate::output::{gh_output, matrix_assignment};
use serde::Serialize;
use std::collections::BTreeMap;
use testbed_core::{Build, Result};
use testbed_runner::{Script, Step};

/// Apps known not to work on a platform, by platform name.
pub type DisabledApps = BTreeMap<String, Vec<String>>;

#[derive(Serialize)]
struct MatrixEntry<'a> {
    name: &'a str,
}

pub async fn run(ctx: &Context, mode: Mode) -> Result<u8> {
    let doc = ctx.matrix(Project::Tutorials)?;
    let disabled: DisabledApps = doc.section("disable_app_for")?.unwrap_or_default();
    let builds = ctx.builds(&doc, |b| build_filter(&disabled, b))?;

    match mode {
        Mode::Dump => {
            dump(&builds);
            Ok(0)
        }
        Mode::Matrix => {
            let entries: Vec<_> = builds
                .iter()
                .map(|b| MatrixEntry { name: b.name() })
                .collect();
            gh_output(&ctx.env, &matrix_assignment("matrix", &entries)?)?;
            Ok(0)
        }
        _ => {
            let summary = testbed_runner::run_all(&builds, |build| {
                let script = tutorial_script(build);
                async move { ctx.run(build.name(), &script, true).await }
            })
            .await;
            Ok(summary.exit_code())
        }
    }
}

pub fn build_filter(disabled: &DisabledApps, build: &Build) -> bool {
    let Some(apps) = disabled.get(&build.platform().name) else {
        return true;
    };
    !build.app.as_ref().is_some_and(|app| apps.contains(app))
}

/// Run the tutorial's own test script, capturing its report.
pub fn tutorial_script(build: &Build) -> Script {
    let Some(app) = build.app.as_deref() else {
        return Script::new(vec![Step::fail(format!("No app for {}.", build.name()))]);
    };
    let config = build.platform().name.to_lowercase();
    Script::new(vec![tee_report(&format!(
        "../projects/sel4-tutorials/test.py --app={app} --config={config}"
    ))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::fixtures::{build, rendered};
    use pretty_assertions::assert_eq;
    use testbed_core::BuildAttributes;

    fn tutorial(platform: &str, app: &str) -> Build {
        build(
            &format!("{app}_{platform}"),
            BuildAttributes {
                platform: Some(platform.to_string()),
                app: Some(app.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_disabled_apps_are_filtered() {
        let disabled: DisabledApps =
            serde_yaml::from_str("PC99:\n  - hello-camkes-timer\n").unwrap();

        assert!(!build_filter(&disabled, &tutorial("PC99", "hello-camkes-timer")));
        assert!(build_filter(&disabled, &tutorial("PC99", "hello-world")));
        assert!(build_filter(&disabled, &tutorial("QEMU_ARM_VIRT", "hello-camkes-timer")));
    }

    #[test]
    fn test_tutorial_script() {
        let script = tutorial_script(&tutorial("PC99", "hello-world"));
        assert_eq!(
            rendered(&script.steps),
            vec![
                "bash -c ../projects/sel4-tutorials/test.py --app=hello-world --config=pc99 \
                 | tee results.xml"
            ]
        );
    }
}
