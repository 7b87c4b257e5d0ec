//! Build matrix resolution for Testbed.
//!
//! Expands the option axes of a matrix document into variants, resolves
//! each (base build, variant) pair into a valid `Build` or nothing, and
//! filters the result against configured and environment criteria.

pub mod filter;
pub mod loader;
pub mod resolver;
pub mod variants;

pub use filter::{ENV_FILTER_AXES, FilterSet, env_filter, matches};
pub use loader::{BuildEntry, MatrixDocument, load_builds};
pub use resolver::resolve;
pub use variants::{Axes, Variant, VariantGenerator, variant_name};
