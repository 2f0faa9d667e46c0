//! The tenant registry: bound tenants, the scoping switch and the queue of
//! entities seen before any tenant was known.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::TenantScopeConfig;
use crate::entity::{EntityRef, Restriction, TenantAware};
use crate::error::TenantError;
use crate::query::TenantQuery;
use crate::reference::{TenantBinding, TenantRef};
use crate::rule::ScopeRule;
use crate::Result;

/// Tenant column → rule bindings plus the hooks a host ORM calls into.
///
/// One registry is created at startup and mutated as the current tenant
/// changes (typically per request). It is plain mutable state; wrap it in a
/// [`SharedTenantRegistry`](crate::SharedTenantRegistry) when several request
/// handlers touch it concurrently.
///
/// # Deferred entities
///
/// Models are often booted before the request that identifies the tenant has
/// been authenticated. Hooks fired while no tenant is bound queue the entity;
/// [`apply_scopes_to_deferred_entities`](Self::apply_scopes_to_deferred_entities)
/// replays the queue against the bindings that exist by then and empties it.
pub struct TenantRegistry {
    enabled: bool,
    bindings: BTreeMap<String, ScopeRule>,
    pending: Vec<EntityRef>,
}

impl Default for TenantRegistry {
    fn default() -> Self {
        Self {
            enabled: true,
            bindings: BTreeMap::new(),
            pending: Vec::new(),
        }
    }
}

impl fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("enabled", &self.enabled)
            .field("bindings", &self.bindings)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl TenantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded from configuration: the scoping switch plus any
    /// statically bound tenants.
    ///
    /// # Errors
    /// Returns the first `TenantError` raised while binding a static tenant.
    pub fn from_config(config: &TenantScopeConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (column, value) in &config.tenants {
            registry.add_tenant(column, value.clone())?;
        }
        if !config.enabled {
            registry.disable();
        }
        Ok(registry)
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Suspend scoping. Bindings and deferred entities are kept.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bind a tenant column, replacing any previous binding for it.
    ///
    /// `tenant` is either a column name or a tenant row (its foreign key name
    /// becomes the column). `binding` is the value to scope by, or a custom
    /// [`ScopeRule`] stored as-is. With [`TenantBinding::Implied`] a tenant row
    /// contributes its own primary key.
    ///
    /// # Errors
    /// - `TenantError::NullTenantValue` if no value could be resolved. This is
    ///   checked first, so it wins over an unusable reference.
    /// - `TenantError::UnknownTenantColumn` if the reference has no usable column.
    ///
    /// The registry is unchanged when an error is returned.
    pub fn add_tenant<'a>(
        &mut self,
        tenant: impl Into<TenantRef<'a>>,
        binding: impl Into<TenantBinding>,
    ) -> Result<()> {
        let tenant = tenant.into();

        let binding = match binding.into() {
            TenantBinding::Implied => tenant
                .implied_value()
                .map_or(TenantBinding::Null, TenantBinding::Value),
            binding => binding,
        };

        let (column, rule) = match binding {
            TenantBinding::Implied | TenantBinding::Null => {
                return Err(TenantError::NullTenantValue {
                    column: tenant.raw_column(),
                });
            }
            TenantBinding::Rule(rule) => (tenant.resolve_column()?, rule),
            TenantBinding::Value(value) => {
                let column = tenant.resolve_column()?;
                let rule = ScopeRule::equals(column.as_str(), value);
                (column, rule)
            }
        };

        let replaced = self.bindings.insert(column.clone(), rule).is_some();
        debug!(column = %column, replaced, "tenant bound");
        Ok(())
    }

    /// Unbind a tenant column. Removing an unbound column is not an error.
    ///
    /// Returns whether a binding was removed.
    ///
    /// # Errors
    /// Returns `TenantError::UnknownTenantColumn` if the reference has no usable column.
    pub fn remove_tenant<'a>(&mut self, tenant: impl Into<TenantRef<'a>>) -> Result<bool> {
        let column = tenant.into().resolve_column()?;
        let removed = self.bindings.remove(&column).is_some();
        if removed {
            debug!(column = %column, "tenant unbound");
        }
        Ok(removed)
    }

    #[must_use]
    pub fn has_tenant<'a>(&self, tenant: impl Into<TenantRef<'a>>) -> bool {
        tenant
            .into()
            .resolve_column()
            .is_ok_and(|column| self.bindings.contains_key(&column))
    }

    /// All bindings, keyed by tenant column.
    #[must_use]
    pub fn tenants(&self) -> &BTreeMap<String, ScopeRule> {
        &self.bindings
    }

    /// Bound tenant columns in key order.
    #[must_use]
    pub fn tenant_columns(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// The rule bound to a tenant column.
    ///
    /// # Errors
    /// Returns `TenantError::UnknownTenantColumn` if the column is not bound.
    pub fn tenant_rule<'a>(&self, tenant: impl Into<TenantRef<'a>>) -> Result<&ScopeRule> {
        let column = tenant.into().resolve_column()?;
        self.bindings
            .get(&column)
            .ok_or(TenantError::UnknownTenantColumn(column))
    }

    /// Number of entities waiting for the first tenant.
    #[must_use]
    pub fn pending_entities(&self) -> usize {
        self.pending.len()
    }

    /// Drop every binding and deferred entity and re-enable scoping.
    pub fn reset(&mut self) {
        self.enabled = true;
        self.bindings.clear();
        self.pending.clear();
    }

    /// Query-build hook: register one restriction per applicable tenant.
    ///
    /// Does nothing while disabled; defers `entity` while no tenant is bound.
    /// Restrictions are named after their tenant column, so firing the hook
    /// again replaces rather than duplicates them.
    pub fn apply_scopes_to_query(&mut self, entity: &EntityRef) {
        if let Some(rules) = self.scopes_for_hook(entity) {
            for (column, rule) in rules {
                add_scope_to_query(entity.as_ref(), column, rule);
            }
        }
    }

    /// Replay deferred entities against the current bindings and empty the queue.
    ///
    /// Entities declaring none of the bound columns are dropped without
    /// restrictions. Replay only narrows queries; deferred entities are never
    /// stamped. The queue is emptied even when no tenant is bound.
    pub fn apply_scopes_to_deferred_entities(&mut self) {
        for (entity, rules) in self.take_deferred() {
            for (column, rule) in rules {
                add_scope_to_query(entity.as_ref(), column, rule);
            }
        }
    }

    /// Creation hook: stamp applicable tenant columns left unset by the caller.
    ///
    /// Does nothing while disabled; defers `entity` while no tenant is bound.
    pub fn on_entity_create(&mut self, entity: &EntityRef) {
        if let Some(rules) = self.scopes_for_hook(entity) {
            for (column, rule) in rules {
                trace!(column = %column, table = entity.table_name(), "stamping tenant column");
                rule.stamp(entity.as_ref());
            }
        }
    }

    /// Fresh query for `entity` without any restriction named after a bound
    /// tenant, whether or not the entity declares that column.
    #[must_use]
    pub fn query_without_tenant_scopes(&self, entity: &dyn TenantAware) -> TenantQuery {
        let excluded: Vec<String> = self.bindings.keys().cloned().collect();
        TenantQuery::for_entity_without(entity, &excluded)
    }

    /// Bindings applicable to `entity`: bound columns the entity declares.
    pub(crate) fn model_tenants(&self, entity: &dyn TenantAware) -> Vec<(String, ScopeRule)> {
        let declared = entity.tenant_columns();
        self.bindings
            .iter()
            .filter(|(column, _)| declared.contains(*column))
            .map(|(column, rule)| (column.clone(), rule.clone()))
            .collect()
    }

    /// Shared gate for the two entity hooks.
    ///
    /// `None` means the hook has nothing to do: scoping is disabled, or the
    /// entity was deferred because no tenant is bound yet.
    pub(crate) fn scopes_for_hook(&mut self, entity: &EntityRef) -> Option<Vec<(String, ScopeRule)>> {
        if !self.enabled {
            return None;
        }
        if self.bindings.is_empty() {
            self.pending.push(Arc::clone(entity));
            debug!(
                table = entity.table_name(),
                pending = self.pending.len(),
                "no tenant bound yet, deferring entity"
            );
            return None;
        }
        Some(self.model_tenants(entity.as_ref()))
    }

    /// Drain the deferred queue, pairing each entity with its applicable rules.
    ///
    /// The queue is always emptied; entities matching no bound tenant come
    /// back with no rules.
    pub(crate) fn take_deferred(&mut self) -> Vec<(EntityRef, Vec<(String, ScopeRule)>)> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let pending = std::mem::take(&mut self.pending);
        debug!(
            pending = pending.len(),
            "applying tenant scopes to deferred entities"
        );
        pending
            .into_iter()
            .map(|entity| {
                let rules = self.model_tenants(entity.as_ref());
                (entity, rules)
            })
            .collect()
    }
}

/// Register `rule`'s narrowing on `entity` under the tenant column's name.
pub(crate) fn add_scope_to_query(entity: &dyn TenantAware, column: String, rule: ScopeRule) {
    trace!(column = %column, table = entity.table_name(), "adding tenant restriction");
    entity.restrictions().add(
        column,
        Restriction::new(move |query: &mut TenantQuery, entity: &dyn TenantAware| {
            rule.narrow(query, entity);
        }),
    );
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::value::TenantValue;
    use tracing_test::traced_test;

    fn stub(columns: &[&str]) -> EntityRef {
        Record::new("model_stub", "model_stubs")
            .with_tenant_columns(columns.iter().copied())
            .into_ref()
    }

    #[test]
    fn model_tenants_is_the_intersection() {
        let mut registry = TenantRegistry::new();
        registry.add_tenant("tenant_a_id", 1).unwrap();
        registry.add_tenant("tenant_b_id", 2).unwrap();
        registry.add_tenant("tenant_c_id", 3).unwrap();

        let entity = stub(&["tenant_a_id", "tenant_b_id", "tenant_d_id"]);
        let columns: Vec<String> = registry
            .model_tenants(entity.as_ref())
            .into_iter()
            .map(|(column, _)| column)
            .collect();
        assert_eq!(columns, ["tenant_a_id", "tenant_b_id"]);
    }

    #[test]
    fn failed_add_leaves_registry_untouched() {
        let mut registry = TenantRegistry::new();
        registry.add_tenant("tenant_a_id", 1).unwrap();

        let err = registry
            .add_tenant("tenant_b_id", None::<i64>)
            .unwrap_err();
        assert_eq!(
            err,
            TenantError::NullTenantValue {
                column: "tenant_b_id".to_owned()
            }
        );
        assert_eq!(registry.tenant_columns(), ["tenant_a_id"]);
    }

    #[test]
    fn null_value_is_reported_before_unknown_column() {
        let mut registry = TenantRegistry::new();
        let err = registry.add_tenant("", None::<i64>).unwrap_err();
        assert!(matches!(err, TenantError::NullTenantValue { .. }));

        let err = registry
            .add_tenant("", TenantBinding::Implied)
            .unwrap_err();
        assert!(matches!(err, TenantError::NullTenantValue { .. }));

        let err = registry.add_tenant("", 1).unwrap_err();
        assert!(matches!(err, TenantError::UnknownTenantColumn(_)));
        assert!(registry.tenants().is_empty());
    }

    #[test]
    fn take_deferred_always_drains_the_queue() {
        let mut registry = TenantRegistry::new();
        registry.apply_scopes_to_query(&stub(&["tenant_a_id"]));
        registry.add_tenant("tenant_a_id", 1).unwrap();
        registry.remove_tenant("tenant_a_id").unwrap();

        let deferred = registry.take_deferred();
        assert_eq!(deferred.len(), 1);
        assert!(deferred[0].1.is_empty());
        assert_eq!(registry.pending_entities(), 0);

        registry.apply_scopes_to_query(&stub(&["tenant_a_id"]));
        registry.add_tenant("tenant_a_id", 1).unwrap();
        let deferred = registry.take_deferred();
        assert_eq!(deferred[0].1.len(), 1);
        assert_eq!(registry.pending_entities(), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut registry = TenantRegistry::new();
        registry.apply_scopes_to_query(&stub(&["tenant_a_id"]));
        registry.add_tenant("tenant_a_id", 1).unwrap();
        registry.disable();

        registry.reset();
        assert!(registry.is_enabled());
        assert!(registry.tenants().is_empty());
        assert_eq!(registry.pending_entities(), 0);
    }

    #[test]
    #[traced_test]
    fn deferral_is_logged() {
        let mut registry = TenantRegistry::new();
        registry.on_entity_create(&stub(&["tenant_a_id"]));
        assert!(logs_contain("no tenant bound yet, deferring entity"));

        registry.add_tenant("tenant_a_id", TenantValue::Int(1)).unwrap();
        assert!(logs_contain("tenant bound"));
    }
}
