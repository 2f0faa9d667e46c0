//! `SeaORM` adapter.
//!
//! ```rust,ignore
//! use tenant_scope::sea::{ScopedActiveModel, TenantColumns};
//!
//! impl TenantColumns for invoice::Entity {
//!     fn tenant_columns() -> Vec<invoice::Column> {
//!         vec![invoice::Column::OrgId]
//!     }
//! }
//!
//! let invoice: EntityRef = Arc::new(ScopedActiveModel::<invoice::Entity>::default());
//! registry.on_entity_create(&invoice);
//! registry.apply_scopes_to_query(&invoice);
//! ```

use std::fmt;

use parking_lot::RwLock;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ColumnType, EntityTrait, IdenStatic, Iterable, Select, Value,
};

use crate::entity::{Restrictions, TenantAware};
use crate::query::TenantQuery;
use crate::value::TenantValue;

/// Declares which columns of a `SeaORM` entity carry tenant keys.
pub trait TenantColumns: EntityTrait {
    fn tenant_columns() -> Vec<Self::Column>;
}

/// An `ActiveModel` taking part in tenant scoping.
///
/// Stamped tenant values are written into the wrapped model with the column's
/// declared type; [`find`](Self::find) returns `E::find()` narrowed by the
/// registered restrictions.
pub struct ScopedActiveModel<E: EntityTrait> {
    table: String,
    model: RwLock<E::ActiveModel>,
    restrictions: Restrictions,
}

impl<E> ScopedActiveModel<E>
where
    E: TenantColumns,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send + Sync,
{
    #[must_use]
    pub fn new(model: E::ActiveModel) -> Self {
        Self {
            table: E::default().table_name().to_owned(),
            model: RwLock::new(model),
            restrictions: Restrictions::new(),
        }
    }

    /// `E::find()` with every registered restriction applied.
    #[must_use]
    pub fn find(&self) -> Select<E> {
        TenantQuery::for_entity(self).apply(E::find())
    }

    /// `E::find()` skipping the named restrictions.
    #[must_use]
    pub fn find_without(&self, excluded: &[String]) -> Select<E> {
        TenantQuery::for_entity_without(self, excluded).apply(E::find())
    }

    /// Copy of the wrapped model, e.g. to insert it.
    #[must_use]
    pub fn active_model(&self) -> E::ActiveModel {
        self.model.read().clone()
    }

    #[must_use]
    pub fn into_active_model(self) -> E::ActiveModel {
        self.model.into_inner()
    }
}

impl<E> Default for ScopedActiveModel<E>
where
    E: TenantColumns,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Default + Send + Sync,
{
    fn default() -> Self {
        Self::new(<E::ActiveModel as Default>::default())
    }
}

impl<E> fmt::Debug for ScopedActiveModel<E>
where
    E: EntityTrait,
    E::ActiveModel: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedActiveModel")
            .field("table", &self.table)
            .field("model", &*self.model.read())
            .field("restrictions", &self.restrictions)
            .finish()
    }
}

impl<E> TenantAware for ScopedActiveModel<E>
where
    E: TenantColumns,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send + Sync,
{
    fn table_name(&self) -> &str {
        &self.table
    }

    fn tenant_columns(&self) -> Vec<String> {
        E::tenant_columns()
            .iter()
            .map(|c| c.as_str().to_owned())
            .collect()
    }

    fn attribute(&self, column: &str) -> Option<TenantValue> {
        let col = column_by_name::<E>(column)?;
        let value = self.model.read().get(col).into_value()?;
        TenantValue::from_sea_value(&value)
    }

    fn set_attribute(&self, column: &str, value: TenantValue) {
        let Some(col) = column_by_name::<E>(column) else {
            tracing::warn!(table = %self.table, column, "unknown column, tenant value not set");
            return;
        };
        let Some(coerced) = coerce(col.def().get_column_type(), &value) else {
            tracing::warn!(
                table = %self.table,
                column,
                value = %value,
                "tenant value does not fit column type, not set"
            );
            return;
        };
        self.model.write().set(col, coerced);
    }

    fn restrictions(&self) -> &Restrictions {
        &self.restrictions
    }
}

fn column_by_name<E: EntityTrait>(name: &str) -> Option<E::Column> {
    E::Column::iter().find(|c| c.as_str() == name)
}

/// Convert `value` into the `SeaORM` value variant `column_type` expects.
fn coerce(column_type: &ColumnType, value: &TenantValue) -> Option<Value> {
    match (column_type, value) {
        (ColumnType::TinyInteger, TenantValue::Int(v)) => i8::try_from(*v).ok().map(Value::from),
        (ColumnType::SmallInteger, TenantValue::Int(v)) => i16::try_from(*v).ok().map(Value::from),
        (ColumnType::Integer, TenantValue::Int(v)) => i32::try_from(*v).ok().map(Value::from),
        (ColumnType::BigInteger, TenantValue::Int(v)) => Some(Value::from(*v)),
        (ColumnType::Unsigned, TenantValue::Int(v)) => u32::try_from(*v).ok().map(Value::from),
        (ColumnType::BigUnsigned, TenantValue::Int(v)) => u64::try_from(*v).ok().map(Value::from),
        (ColumnType::Uuid, TenantValue::Uuid(v)) => Some(Value::from(*v)),
        (ColumnType::String(_) | ColumnType::Text | ColumnType::Char(_), v) => {
            Some(Value::from(v.to_string()))
        }
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use sea_orm::sea_query::StringLen;

    #[test]
    fn integers_are_narrowed_to_the_column_width() {
        assert_eq!(
            coerce(&ColumnType::Integer, &TenantValue::Int(5)),
            Some(Value::Int(Some(5)))
        );
        assert_eq!(
            coerce(&ColumnType::Integer, &TenantValue::Int(i64::MAX)),
            None
        );
        assert_eq!(
            coerce(&ColumnType::BigInteger, &TenantValue::Int(i64::MAX)),
            Some(Value::BigInt(Some(i64::MAX)))
        );
    }

    #[test]
    fn text_columns_accept_any_tenant_value() {
        assert_eq!(
            coerce(&ColumnType::String(StringLen::None), &TenantValue::Int(5)),
            Some(Value::from("5".to_owned()))
        );
        assert_eq!(coerce(&ColumnType::Uuid, &TenantValue::Int(5)), None);
    }
}
