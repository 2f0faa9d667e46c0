use crate::entity::EntityRef;
use crate::registry::TenantRegistry;
use crate::shared::SharedTenantRegistry;

/// Hook points a host ORM must call for tenant scoping to work.
///
/// | Host event                          | Hook                       |
/// |-------------------------------------|----------------------------|
/// | a query is being built for a model  | `on_query_build`           |
/// | a new record is about to be created | `on_create`                |
/// | the first tenant has been bound     | `after_tenant_registered`  |
pub trait TenantLifecycle {
    fn on_query_build(&mut self, entity: &EntityRef);

    fn on_create(&mut self, entity: &EntityRef);

    fn after_tenant_registered(&mut self);
}

impl TenantLifecycle for TenantRegistry {
    fn on_query_build(&mut self, entity: &EntityRef) {
        self.apply_scopes_to_query(entity);
    }

    fn on_create(&mut self, entity: &EntityRef) {
        self.on_entity_create(entity);
    }

    fn after_tenant_registered(&mut self) {
        self.apply_scopes_to_deferred_entities();
    }
}

impl TenantLifecycle for SharedTenantRegistry {
    fn on_query_build(&mut self, entity: &EntityRef) {
        self.apply_scopes_to_query(entity);
    }

    fn on_create(&mut self, entity: &EntityRef) {
        self.on_entity_create(entity);
    }

    fn after_tenant_registered(&mut self) {
        self.apply_scopes_to_deferred_entities();
    }
}
