//! Capabilities the host ORM exposes to the tenant registry.
//!
//! The registry never talks to a concrete model type. It sees entities through
//! [`TenantAware`] (what an entity declares and how its query is narrowed) and
//! tenant owners through [`TenantSource`] (how a tenant row maps to a column
//! and a value).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::query::{QualifiedColumn, TenantQuery};
use crate::value::TenantValue;

/// Shared handle to a tenant-aware entity.
///
/// Entities seen before any tenant is known are queued by handle and replayed
/// later, so the registry needs shared ownership rather than a borrow.
pub type EntityRef = Arc<dyn TenantAware>;

/// Contract for entities that take part in tenant scoping.
///
/// Implementations are shared across threads and mutated through `&self`;
/// attribute storage and the restriction set use interior mutability.
pub trait TenantAware: Send + Sync {
    /// Table the entity is stored in; used to qualify column names.
    fn table_name(&self) -> &str;

    /// Tenant columns this entity type opts into.
    ///
    /// Only the intersection with the registry's bound tenants is ever applied.
    fn tenant_columns(&self) -> Vec<String>;

    /// Column qualified with the entity's table.
    fn qualified_column(&self, column: &str) -> QualifiedColumn {
        QualifiedColumn::new(self.table_name(), column)
    }

    /// Current value of `column`, `None` when unset or NULL.
    fn attribute(&self, column: &str) -> Option<TenantValue>;

    /// Overwrite `column` with `value`.
    fn set_attribute(&self, column: &str, value: TenantValue);

    /// Named restrictions applied whenever a query is built for this entity.
    fn restrictions(&self) -> &Restrictions;
}

/// A tenant owner passed by reference instead of by column name.
///
/// `organization` with primary key `id` binds column `organization_id` to the
/// organization's key value.
pub trait TenantSource {
    /// Column that refers to this tenant from other tables.
    fn foreign_key_name(&self) -> String;

    /// Primary key value, `None` while the row has no key yet.
    fn primary_key_value(&self) -> Option<TenantValue>;
}

type RestrictionFn = dyn Fn(&mut TenantQuery, &dyn TenantAware) + Send + Sync;

/// A query-time restriction callback.
#[derive(Clone)]
pub struct Restriction(Arc<RestrictionFn>);

impl Restriction {
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut TenantQuery, &dyn TenantAware) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, query: &mut TenantQuery, entity: &dyn TenantAware) {
        (self.0)(query, entity);
    }
}

impl fmt::Debug for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Restriction").finish_non_exhaustive()
    }
}

/// Restrictions keyed by name.
///
/// Adding a restriction under an existing name replaces it, so applying the
/// same tenant scopes twice never stacks duplicate conditions.
#[derive(Default)]
pub struct Restrictions {
    inner: RwLock<BTreeMap<String, Restriction>>,
}

impl Restrictions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `restriction` under `name`, replacing any previous one.
    pub fn add(&self, name: impl Into<String>, restriction: Restriction) {
        self.inner.write().insert(name.into(), restriction);
    }

    /// Remove the restriction called `name`; returns whether it existed.
    #[must_use]
    pub fn remove(&self, name: &str) -> bool {
        self.inner.write().remove(name).is_some()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Run every restriction not listed in `excluded` against `query`.
    ///
    /// The lock is released before the callbacks run, so a restriction may
    /// inspect the entity's restriction set without deadlocking.
    pub(crate) fn apply(
        &self,
        query: &mut TenantQuery,
        entity: &dyn TenantAware,
        excluded: &[String],
    ) {
        let snapshot: Vec<(String, Restriction)> = self
            .inner
            .read()
            .iter()
            .filter(|(name, _)| !excluded.contains(*name))
            .map(|(name, r)| (name.clone(), r.clone()))
            .collect();

        for (name, restriction) in snapshot {
            restriction.apply(query, entity);
            query.mark_applied(&name);
            tracing::trace!(restriction = %name, table = query.table(), "restriction applied");
        }
    }
}

impl fmt::Debug for Restrictions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.read().keys()).finish()
    }
}
