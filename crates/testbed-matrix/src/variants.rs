//! Variant matrix expansion.

use serde::{Deserialize, Deserializer};
use testbed_core::attributes::scalar_to_string;

/// One point in the cross product of all axes: `(axis, value)` pairs in
/// axis declaration order.
pub type Variant = Vec<(String, String)>;

/// Named option axes, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Axes(Vec<(String, Vec<String>)>);

impl Axes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis; later axes vary fastest.
    pub fn axis<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<'de> Deserialize<'de> for Axes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
        let mut axes = Vec::with_capacity(mapping.len());

        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| D::Error::custom("variant axis name must be a string"))?
                .to_string();
            let values = match value {
                serde_yaml::Value::Sequence(items) => items
                    .iter()
                    .map(|item| {
                        scalar_to_string(item).ok_or_else(|| {
                            D::Error::custom(format!("axis {name}: values must be scalars"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![scalar_to_string(&other).ok_or_else(|| {
                    D::Error::custom(format!("axis {name}: expected a list of values"))
                })?],
            };
            axes.push((name, values));
        }

        Ok(Axes(axes))
    }
}

/// Expander for option axes.
pub struct VariantGenerator;

impl VariantGenerator {
    pub fn new() -> Self {
        Self
    }

    /// All selections of one value per axis. No axes yields no variants
    /// (as opposed to a single empty variant).
    pub fn expand(&self, axes: &Axes) -> Vec<Variant> {
        if axes.is_empty() {
            return vec![];
        }

        let mut result: Vec<Variant> = vec![vec![]];

        for (axis, values) in axes.iter() {
            let mut new_result = Vec::with_capacity(result.len() * values.len());

            for combo in &result {
                for value in values {
                    let mut new_combo = combo.clone();
                    new_combo.push((axis.to_string(), value.clone()));
                    new_result.push(new_combo);
                }
            }

            result = new_result;
        }

        result
    }
}

impl Default for VariantGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Naming suffix of a variant: its non-empty values joined with `_`.
pub fn variant_name(variant: &[(String, String)]) -> String {
    variant
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(_, v)| v.as_str())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_expansion_order() {
        let axes = Axes::new().axis("a", ["1", "2"]).axis("b", ["x"]);
        let variants = VariantGenerator::new().expand(&axes);

        assert_eq!(
            variants,
            vec![
                vec![pair("a", "1"), pair("b", "x")],
                vec![pair("a", "2"), pair("b", "x")],
            ]
        );
    }

    #[test]
    fn test_expansion_size_is_product() {
        let axes = Axes::new()
            .axis("mode", ["32", "64"])
            .axis("compiler", ["gcc", "clang"])
            .axis("debug", ["debug", "release", "verification"]);
        let variants = VariantGenerator::new().expand(&axes);

        assert_eq!(variants.len(), 12); // 2 × 2 × 3
        let mut unique = variants.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_empty_axes_yield_no_variants() {
        assert!(VariantGenerator::new().expand(&Axes::new()).is_empty());
    }

    #[test]
    fn test_axis_with_no_values_yields_no_variants() {
        let axes = Axes::new().axis("a", ["1"]).axis("b", Vec::<String>::new());
        assert!(VariantGenerator::new().expand(&axes).is_empty());
    }

    #[test]
    fn test_deserialize_preserves_order_and_stringifies() {
        let axes: Axes = serde_yaml::from_str("smp: ['', smp]\nmode: [64, 32]\n").unwrap();
        let collected: Vec<_> = axes.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect();

        assert_eq!(
            collected,
            vec![
                ("smp".to_string(), vec!["".to_string(), "smp".to_string()]),
                ("mode".to_string(), vec!["64".to_string(), "32".to_string()]),
            ]
        );
    }

    #[test]
    fn test_variant_name_skips_empty_values() {
        let variant = vec![pair("mode", "64"), pair("smp", ""), pair("debug", "release")];
        assert_eq!(variant_name(&variant), "64_release");
    }
}
