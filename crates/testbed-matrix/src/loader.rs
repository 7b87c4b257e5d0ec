//! Build matrix documents and the loader that turns them into builds.

use crate::filter::{self, FilterSet};
use crate::resolver::resolve;
use crate::variants::{Axes, VariantGenerator};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use testbed_core::{Build, BuildAttributes, Catalog, Result};
use tracing::{debug, info};

/// One entry of the `builds` list: a single-key mapping `name: attributes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Option<BuildAttributes>>")]
pub struct BuildEntry {
    pub name: String,
    pub attributes: BuildAttributes,
}

impl TryFrom<BTreeMap<String, Option<BuildAttributes>>> for BuildEntry {
    type Error = String;

    fn try_from(map: BTreeMap<String, Option<BuildAttributes>>) -> std::result::Result<Self, String> {
        if map.len() != 1 {
            return Err(format!(
                "build entry must have exactly one name, found {}",
                map.len()
            ));
        }
        let Some((name, attributes)) = map.into_iter().next() else {
            return Err("empty build entry".to_string());
        };
        Ok(Self {
            name,
            attributes: attributes.unwrap_or_default(),
        })
    }
}

/// A build matrix document (`builds.yml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatrixDocument {
    /// Attributes every build starts from.
    #[serde(default)]
    pub default: BuildAttributes,
    #[serde(default)]
    pub variants: Axes,
    #[serde(default)]
    pub build_filter: Vec<FilterSet>,
    #[serde(default)]
    pub builds: Vec<BuildEntry>,
    /// Project-specific sections (`apps`, `sim`, `disable_app_for`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl MatrixDocument {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Deserialize a project-specific section, if present.
    pub fn section<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        self.extra
            .get(key)
            .map(|value| serde_yaml::from_value(value.clone()))
            .transpose()
            .map_err(Into::into)
    }

    fn base_builds(&self, catalog: &Catalog) -> Result<Vec<Build>> {
        if self.builds.is_empty() {
            return catalog
                .platforms()
                .map(|platform| {
                    let attrs = BuildAttributes {
                        platform: Some(platform.name.clone()),
                        ..self.default.clone()
                    };
                    Build::from_attributes(platform.name.clone(), &attrs, catalog)
                })
                .collect();
        }

        self.builds
            .iter()
            .map(|entry| {
                let attrs = self.default.overlay(&entry.attributes);
                Build::from_attributes(entry.name.clone(), &attrs, catalog)
            })
            .collect()
    }
}

/// Resolve the full build list of `doc`.
///
/// Without variants the base builds are kept as they are (no validation);
/// with variants every base is resolved under every variant. In both cases
/// a build survives only if it passes the document's `build-filter`, the
/// `env` filter set and `extra`.
pub fn load_builds<F>(
    doc: &MatrixDocument,
    catalog: &Catalog,
    env: &FilterSet,
    extra: F,
) -> Result<Vec<Build>>
where
    F: Fn(&Build) -> bool,
{
    let env_filters = [env.clone()];
    let keep = |build: &Build| {
        filter::matches(build, &doc.build_filter) && filter::matches(build, &env_filters)
    };

    let bases = doc.base_builds(catalog)?;
    let variants = VariantGenerator::new().expand(&doc.variants);

    let builds: Vec<Build> = if variants.is_empty() {
        bases
            .into_iter()
            .filter(|b| keep(b) && extra(b))
            .collect()
    } else {
        bases
            .iter()
            .flat_map(|base| {
                variants
                    .iter()
                    .filter_map(|v| resolve(base, v, &extra))
                    .filter(|b| keep(b))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    debug!(bases = doc.builds.len(), variants = variants.len(), "Matrix expanded");
    info!(count = builds.len(), "Builds loaded");
    Ok(builds)
}
