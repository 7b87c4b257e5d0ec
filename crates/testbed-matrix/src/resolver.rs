//! Resolution of a base build plus a variant into a concrete build.

use crate::variants::variant_name;
use testbed_core::{Build, Error, Requirement, Result};
use tracing::{debug, warn};

/// Resolve `base` under `variant`.
///
/// Returns `None` when the combination is not valid for the platform or
/// `filter` rejects it. `base` is never modified.
pub fn resolve<F>(base: &Build, variant: &[(String, String)], filter: F) -> Option<Build>
where
    F: Fn(&Build) -> bool,
{
    match try_resolve(base, variant) {
        Ok(build) if filter(&build) => Some(build),
        Ok(build) => {
            debug!(build = build.name(), "Variant rejected by build filter");
            None
        }
        Err(e) => {
            debug!(base = base.name(), variant = ?variant, error = %e, "Variant dropped");
            None
        }
    }
}

fn try_resolve(base: &Build, variant: &[(String, String)]) -> Result<Build> {
    let mut build = base.with_suffix(&variant_name(variant));

    // an empty mode value leaves the base's mode
    let mode = match variant
        .iter()
        .find(|(axis, value)| axis == "mode" && !value.is_empty())
    {
        Some((_, value)) => Some(
            value
                .parse::<u32>()
                .map_err(|_| Error::validation(format!("mode {value} is not a word size")))?,
        ),
        None => base.mode(),
    };
    let Some(mode) = mode.filter(|m| build.platform().supports_mode(*m)) else {
        return Err(Error::validation("mode not supported by platform"));
    };

    build.mode = Some(mode);
    // mode is unique now, the mode-dependent settings apply
    build.update_settings();

    for (axis, value) in variant {
        apply(&mut build, axis, value)?;
    }

    build.validate()?;
    Ok(build)
}

fn apply(build: &mut Build, axis: &str, value: &str) -> Result<()> {
    match (axis, value) {
        ("mode", _) => {}
        ("mcs" | "smp" | "hyp" | "domains", "") => {}
        ("mcs", _) => build.set_mcs()?,
        ("smp", _) => build.set_smp()?,
        ("hyp", _) => build.set_hyp()?,
        ("domains", _) => build.set_domains()?,
        ("debug", "debug") => {}
        ("debug", "release") => build.set_release()?,
        ("debug", "verification") => build.set_verification(),
        ("debug", other) => {
            warn!(value = other, "Unknown debug setting");
            return Err(Error::validation(format!("unknown debug setting {other}")));
        }
        ("compiler", "clang") => build.set_clang()?,
        ("compiler", "gcc" | "") => {}
        ("app", app) => build.app = (!app.is_empty()).then(|| app.to_string()),
        ("req", req) => {
            build.req = Some(Requirement::from(req));
            // may switch simulation settings
            build.update_settings();
        }
        (axis, value) => warn!(axis, value, "Ignoring unknown variant setting"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{Axes, VariantGenerator};
    use testbed_core::{BuildAttributes, Catalog};

    const CATALOG: &str = r#"
platforms:
  ODROID_C2:
    arch: arm
    modes: [32, 64]
    smp: [64]
    platform: odroidc2
    march: armv8a
  HIFIVE:
    arch: riscv
    modes: [64]
    platform: hifive
    march: rv64imac
mcs_unsupported: [HIFIVE]
"#;

    fn base(platform: &str) -> Build {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let attrs = BuildAttributes {
            platform: Some(platform.to_string()),
            image_base_name: Some("sel4test-driver".to_string()),
            ..Default::default()
        };
        Build::from_attributes(platform, &attrs, &catalog).unwrap()
    }

    fn variant(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mode_and_smp_matrix_yields_three_builds() {
        let base = base("ODROID_C2");
        let axes = Axes::new().axis("mode", ["32", "64"]).axis("smp", ["", "smp"]);

        let builds: Vec<Build> = VariantGenerator::new()
            .expand(&axes)
            .iter()
            .filter_map(|v| resolve(&base, v, |_| true))
            .collect();

        let names: Vec<_> = builds.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["ODROID_C2_32", "ODROID_C2_64", "ODROID_C2_64_smp"]);
        assert!(builds[2].is_smp());
        assert_eq!(builds[0].settings["AARCH32"], "TRUE");
    }

    #[test]
    fn test_resolve_does_not_touch_base() {
        let base = base("ODROID_C2");
        let before = base.clone();
        let v = variant(&[("mode", "64"), ("smp", "smp"), ("debug", "release")]);

        let first = resolve(&base, &v, |_| true).unwrap();
        let second = resolve(&base, &v, |_| true).unwrap();

        assert_eq!(base, before);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_capability_drops_variant() {
        let base = base("HIFIVE");
        assert!(resolve(&base, &variant(&[("mcs", "mcs")]), |_| true).is_none());
        assert!(resolve(&base, &variant(&[("smp", "smp")]), |_| true).is_none());
        assert!(resolve(&base, &variant(&[("mode", "32")]), |_| true).is_none());
    }

    #[test]
    fn test_empty_mode_value_keeps_base_mode() {
        let base = base("HIFIVE");
        let build = resolve(&base, &variant(&[("mode", ""), ("mcs", "")]), |_| true).unwrap();
        assert_eq!(build.name(), "HIFIVE");
        assert_eq!(build.mode(), Some(64));
        assert_eq!(build.settings["RISCV64"], "TRUE");
    }

    #[test]
    fn test_unknown_debug_value_rejected() {
        let base = base("HIFIVE");
        assert!(resolve(&base, &variant(&[("debug", "fast")]), |_| true).is_none());
        assert!(resolve(&base, &variant(&[("debug", "verification")]), |_| true)
            .unwrap()
            .is_verification());
    }

    #[test]
    fn test_unknown_axis_is_ignored() {
        let base = base("HIFIVE");
        let build = resolve(&base, &variant(&[("colour", "blue")]), |_| true).unwrap();
        assert_eq!(build.name(), "HIFIVE_blue");
    }

    #[test]
    fn test_domains_then_smp_rejected() {
        let base = base("ODROID_C2");
        let v = variant(&[("mode", "64"), ("domains", "domains"), ("smp", "smp")]);
        assert!(resolve(&base, &v, |_| true).is_none());
    }

    #[test]
    fn test_req_and_app_axes() {
        let base = base("HIFIVE");
        let build = resolve(&base, &variant(&[("req", "sim"), ("app", "adder")]), |_| true).unwrap();
        assert_eq!(build.settings["SIMULATION"], "TRUE");
        assert_eq!(build.app.as_deref(), Some("adder"));
    }

    #[test]
    fn test_extra_filter_applies() {
        let base = base("HIFIVE");
        let v = variant(&[("compiler", "clang")]);
        assert!(resolve(&base, &v, |b| b.is_gcc()).is_none());
        assert!(resolve(&base, &v, |b| b.is_clang()).is_some());
    }
}
