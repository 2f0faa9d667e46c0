use std::fmt;

use uuid::Uuid;

use crate::entity::TenantSource;
use crate::error::TenantError;
use crate::rule::ScopeRule;
use crate::value::TenantValue;

/// Names a tenant either by column or by the tenant row itself.
#[derive(Clone, Copy)]
pub enum TenantRef<'a> {
    /// Bare tenant column, e.g. `"organization_id"`.
    Column(&'a str),
    /// Tenant row; the column is its foreign key name.
    Entity(&'a dyn TenantSource),
}

impl<'a> TenantRef<'a> {
    #[must_use]
    pub fn column(name: &'a str) -> Self {
        Self::Column(name)
    }

    #[must_use]
    pub fn entity(source: &'a dyn TenantSource) -> Self {
        Self::Entity(source)
    }

    /// Resolve the tenant column this reference points at.
    ///
    /// # Errors
    /// Returns `TenantError::UnknownTenantColumn` for a blank column name or a
    /// tenant row without a foreign key name.
    pub fn resolve_column(&self) -> Result<String, TenantError> {
        let column = self.raw_column();
        if column.trim().is_empty() {
            return Err(TenantError::UnknownTenantColumn(column));
        }
        Ok(column)
    }

    /// Column name as given, before validation.
    pub(crate) fn raw_column(&self) -> String {
        match self {
            Self::Column(name) => (*name).to_owned(),
            Self::Entity(source) => source.foreign_key_name(),
        }
    }

    /// Value used when the caller did not supply one: the tenant row's key.
    pub(crate) fn implied_value(&self) -> Option<TenantValue> {
        match self {
            Self::Column(_) => None,
            Self::Entity(source) => source.primary_key_value(),
        }
    }
}

impl fmt::Debug for TenantRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => f.debug_tuple("Column").field(name).finish(),
            Self::Entity(source) => f
                .debug_tuple("Entity")
                .field(&source.foreign_key_name())
                .finish(),
        }
    }
}

impl<'a> From<&'a str> for TenantRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Column(name)
    }
}

impl<'a> From<&'a String> for TenantRef<'a> {
    fn from(name: &'a String) -> Self {
        Self::Column(name.as_str())
    }
}

impl<'a> From<&'a dyn TenantSource> for TenantRef<'a> {
    fn from(source: &'a dyn TenantSource) -> Self {
        Self::Entity(source)
    }
}

/// What a tenant column is bound to.
#[derive(Clone, Debug)]
pub enum TenantBinding {
    /// No value supplied; a tenant row reference contributes its own key.
    Implied,
    /// Explicit null. Always rejected.
    Null,
    /// Bind with the default equality rule.
    Value(TenantValue),
    /// Bind with a custom rule, stored as-is.
    Rule(ScopeRule),
}

impl From<TenantValue> for TenantBinding {
    fn from(value: TenantValue) -> Self {
        Self::Value(value)
    }
}

impl From<ScopeRule> for TenantBinding {
    fn from(rule: ScopeRule) -> Self {
        Self::Rule(rule)
    }
}

impl<T: Into<TenantValue>> From<Option<T>> for TenantBinding {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, |v| Self::Value(v.into()))
    }
}

macro_rules! binding_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for TenantBinding {
                fn from(value: $ty) -> Self {
                    Self::Value(TenantValue::from(value))
                }
            }
        )*
    };
}

binding_from_value!(i64, i32, u32, Uuid, String, &str);
