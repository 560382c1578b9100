//! Compile-time registry of deployments.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a city means adding a TOML file under `deployments/` and an
//! entry here.

use crate::{ConfigError, DeploymentConfig};

/// Number of registered deployments. Enforced by a test.
#[cfg(test)]
const EXPECTED_DEPLOYMENT_COUNT: usize = 1;

/// Embedded TOML deployment definitions.
const DEPLOYMENT_TOMLS: &[(&str, &str)] = &[(
    "riverside",
    include_str!("../deployments/riverside.toml"),
)];

/// Returns all registered deployments.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse or validate. These are
/// compile-time constants, so a failure is a development error caught by
/// the tests below.
#[must_use]
pub fn all_deployments() -> Vec<DeploymentConfig> {
    DEPLOYMENT_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            DeploymentConfig::from_toml_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse deployment '{name}': {e}"))
        })
        .collect()
}

/// Looks up a registered deployment by id.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownDeployment`] if no deployment has this id.
pub fn find_deployment(id: &str) -> Result<DeploymentConfig, ConfigError> {
    all_deployments()
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| ConfigError::UnknownDeployment { id: id.to_string() })
}
