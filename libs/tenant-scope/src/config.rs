//! Tenant scoping configuration.
//!
//! ```yaml
//! tenant_scope:
//!   enabled: true
//!   tenants:
//!     organization_id: 1
//! ```

use std::collections::BTreeMap;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::value::TenantValue;

/// Key of the configuration section read by [`TenantScopeConfig::from_figment`].
pub const CONFIG_SECTION: &str = "tenant_scope";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenantScopeConfig {
    /// Initial state of the scoping switch.
    pub enabled: bool,
    /// Tenants bound at startup, for deployments with a fixed tenant.
    pub tenants: BTreeMap<String, TenantValue>,
}

impl Default for TenantScopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tenants: BTreeMap::new(),
        }
    }
}

impl TenantScopeConfig {
    /// Extract the `tenant_scope` section; a missing section yields defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::Extract` if the section is present but malformed.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        if !figment.contains(CONFIG_SECTION) {
            return Ok(Self::default());
        }
        Ok(figment.extract_inner(CONFIG_SECTION)?)
    }
}
