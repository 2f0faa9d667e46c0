use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::{EntityRef, TenantAware};
use crate::query::TenantQuery;
use crate::reference::{TenantBinding, TenantRef};
use crate::registry::{add_scope_to_query, TenantRegistry};
use crate::rule::ScopeRule;
use crate::Result;

/// Thread-safe handle to a [`TenantRegistry`].
///
/// Cloning shares the same registry. The lock is only held while the
/// registry's own state is read or written; rules, stamps and restriction
/// registration run after it is released, so a custom rule may call back into
/// the registry.
#[derive(Clone, Debug, Default)]
pub struct SharedTenantRegistry {
    inner: Arc<RwLock<TenantRegistry>>,
}

impl SharedTenantRegistry {
    #[must_use]
    pub fn new(registry: TenantRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn enable(&self) {
        self.inner.write().enable();
    }

    pub fn disable(&self) {
        self.inner.write().disable();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.read().is_enabled()
    }

    /// See [`TenantRegistry::add_tenant`].
    ///
    /// # Errors
    /// Same as [`TenantRegistry::add_tenant`]; the registry is unchanged on error.
    pub fn add_tenant<'a>(
        &self,
        tenant: impl Into<TenantRef<'a>>,
        binding: impl Into<TenantBinding>,
    ) -> Result<()> {
        self.inner.write().add_tenant(tenant, binding)
    }

    /// See [`TenantRegistry::remove_tenant`].
    ///
    /// # Errors
    /// Returns `TenantError::UnknownTenantColumn` if the reference has no usable column.
    pub fn remove_tenant<'a>(&self, tenant: impl Into<TenantRef<'a>>) -> Result<bool> {
        self.inner.write().remove_tenant(tenant)
    }

    #[must_use]
    pub fn has_tenant<'a>(&self, tenant: impl Into<TenantRef<'a>>) -> bool {
        self.inner.read().has_tenant(tenant)
    }

    /// Snapshot of the current bindings.
    #[must_use]
    pub fn tenants(&self) -> BTreeMap<String, ScopeRule> {
        self.inner.read().tenants().clone()
    }

    /// See [`TenantRegistry::tenant_rule`].
    ///
    /// # Errors
    /// Returns `TenantError::UnknownTenantColumn` if the column is not bound.
    pub fn tenant_rule<'a>(&self, tenant: impl Into<TenantRef<'a>>) -> Result<ScopeRule> {
        self.inner.read().tenant_rule(tenant).cloned()
    }

    #[must_use]
    pub fn pending_entities(&self) -> usize {
        self.inner.read().pending_entities()
    }

    pub fn reset(&self) {
        self.inner.write().reset();
    }

    /// See [`TenantRegistry::apply_scopes_to_query`].
    pub fn apply_scopes_to_query(&self, entity: &EntityRef) {
        let rules = self.inner.write().scopes_for_hook(entity);
        for (column, rule) in rules.into_iter().flatten() {
            add_scope_to_query(entity.as_ref(), column, rule);
        }
    }

    /// See [`TenantRegistry::apply_scopes_to_deferred_entities`].
    pub fn apply_scopes_to_deferred_entities(&self) {
        let deferred = self.inner.write().take_deferred();
        for (entity, rules) in deferred {
            for (column, rule) in rules {
                add_scope_to_query(entity.as_ref(), column, rule);
            }
        }
    }

    /// See [`TenantRegistry::on_entity_create`].
    pub fn on_entity_create(&self, entity: &EntityRef) {
        let rules = self.inner.write().scopes_for_hook(entity);
        for (_, rule) in rules.into_iter().flatten() {
            rule.stamp(entity.as_ref());
        }
    }

    /// See [`TenantRegistry::query_without_tenant_scopes`].
    #[must_use]
    pub fn query_without_tenant_scopes(&self, entity: &dyn TenantAware) -> TenantQuery {
        let excluded: Vec<String> = self.inner.read().tenants().keys().cloned().collect();
        TenantQuery::for_entity_without(entity, &excluded)
    }

    /// Run `f` with scoping disabled, restoring the previous state afterwards
    /// (also when `f` panics).
    ///
    /// The switch is shared: while `f` runs, every clone of this handle is
    /// unscoped, including clones used by other threads serving other tenants.
    /// Queries and records they build in that window get no tenant scoping.
    /// Use a separate registry per request when that window is unacceptable.
    pub fn without_scoping<T>(&self, f: impl FnOnce() -> T) -> T {
        let was_enabled = {
            let mut registry = self.inner.write();
            let was_enabled = registry.is_enabled();
            registry.disable();
            was_enabled
        };
        let _restore = RestoreOnDrop {
            registry: self,
            enable: was_enabled,
        };
        f()
    }
}

struct RestoreOnDrop<'a> {
    registry: &'a SharedTenantRegistry,
    enable: bool,
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if self.enable {
            self.registry.enable();
        }
    }
}

impl From<TenantRegistry> for SharedTenantRegistry {
    fn from(registry: TenantRegistry) -> Self {
        Self::new(registry)
    }
}
