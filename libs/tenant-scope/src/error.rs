/// Errors raised by the tenant registry API.
///
/// Every variant is reported before the registry is touched, so a failed
/// call leaves bindings and the pending queue exactly as they were.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// The tenant value resolved to nothing (no explicit value and no key on
    /// the referenced tenant entity).
    #[error("tenant value for '{column}' must not be null")]
    NullTenantValue { column: String },

    /// The tenant reference could not be turned into a column name, or the
    /// column is not bound in the registry.
    #[error("unknown tenant column: {0}")]
    UnknownTenantColumn(String),

    /// A scope rule was built without one of its two strategies.
    #[error("incomplete scope rule: missing {0} strategy")]
    IncompleteRule(&'static str),
}

/// Errors that can occur while loading tenant scoping configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to extract tenant scope config: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("invalid static tenant: {0}")]
    Tenant(#[from] TenantError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}
