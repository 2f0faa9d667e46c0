use std::fmt;

use sea_orm::Value;
use uuid::Uuid;

/// The value a tenant column is bound to.
///
/// Tenants are keyed by integers, UUIDs or opaque strings (slugs). The
/// registry never needs anything more than equality on these values, so the
/// enum stays deliberately small and converts into a `SeaORM` [`Value`] only
/// when a condition is rendered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum TenantValue {
    Int(i64),
    Uuid(Uuid),
    Str(String),
}

impl TenantValue {
    /// Convert a `SeaORM` value back into a tenant value.
    ///
    /// Returns `None` for SQL `NULL` and for types that cannot carry a
    /// tenant key (floats, JSON, dates, ...).
    #[must_use]
    pub fn from_sea_value(value: &Value) -> Option<Self> {
        match value {
            Value::TinyInt(Some(v)) => Some(Self::Int(i64::from(*v))),
            Value::SmallInt(Some(v)) => Some(Self::Int(i64::from(*v))),
            Value::Int(Some(v)) => Some(Self::Int(i64::from(*v))),
            Value::BigInt(Some(v)) => Some(Self::Int(*v)),
            Value::TinyUnsigned(Some(v)) => Some(Self::Int(i64::from(*v))),
            Value::SmallUnsigned(Some(v)) => Some(Self::Int(i64::from(*v))),
            Value::Unsigned(Some(v)) => Some(Self::Int(i64::from(*v))),
            Value::BigUnsigned(Some(v)) => i64::try_from(*v).ok().map(Self::Int),
            Value::String(Some(s)) => Some(Self::Str(s.as_str().to_owned())),
            Value::Uuid(Some(u)) => Some(Self::Uuid(Uuid::from_bytes(*u.as_bytes()))),
            _ => None,
        }
    }
}

impl fmt::Display for TenantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<TenantValue> for Value {
    fn from(value: TenantValue) -> Self {
        match value {
            TenantValue::Int(v) => Value::from(v),
            TenantValue::Uuid(v) => Value::from(v),
            TenantValue::Str(v) => Value::from(v),
        }
    }
}

impl From<i64> for TenantValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for TenantValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for TenantValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Uuid> for TenantValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<String> for TenantValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for TenantValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sea_values_round_into_tenant_values() {
        assert_eq!(
            TenantValue::from_sea_value(&Value::Int(Some(7))),
            Some(TenantValue::Int(7))
        );
        assert_eq!(
            TenantValue::from_sea_value(&Value::from("acme".to_owned())),
            Some(TenantValue::Str("acme".to_owned()))
        );
        let id = Uuid::from_u128(42);
        assert_eq!(
            TenantValue::from_sea_value(&Value::from(id)),
            Some(TenantValue::Uuid(id))
        );
    }

    #[test]
    fn null_and_foreign_values_are_not_tenants() {
        assert_eq!(TenantValue::from_sea_value(&Value::BigInt(None)), None);
        assert_eq!(TenantValue::from_sea_value(&Value::Bool(Some(true))), None);
        assert_eq!(
            TenantValue::from_sea_value(&Value::BigUnsigned(Some(u64::MAX))),
            None
        );
    }

    #[test]
    fn untagged_serde_prefers_int_then_uuid_then_string() {
        let v: TenantValue = serde_json::from_str("12").unwrap();
        assert_eq!(v, TenantValue::Int(12));

        let v: TenantValue =
            serde_json::from_str("\"00000000-0000-0000-0000-00000000002a\"").unwrap();
        assert_eq!(v, TenantValue::Uuid(Uuid::from_u128(42)));

        let v: TenantValue = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(v, TenantValue::Str("acme".to_owned()));
    }
}
