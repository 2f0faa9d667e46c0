#![allow(clippy::unwrap_used, clippy::expect_used)]

//! A minimal host ORM driving the registry through its lifecycle hooks.

use figment::Figment;
use figment::providers::Serialized;
use sea_orm::DbBackend;
use tenant_scope::{
    EntityRef, Record, SharedTenantRegistry, TenantAware, TenantLifecycle, TenantRegistry,
    TenantScopeConfig, TenantValue,
};

/// Boots models, builds queries and creates rows the way an ORM would,
/// firing the registry hooks at each step.
struct Host<L: TenantLifecycle> {
    scoping: L,
    booted: Vec<EntityRef>,
}

impl<L: TenantLifecycle> Host<L> {
    fn new(scoping: L) -> Self {
        Self {
            scoping,
            booted: Vec::new(),
        }
    }

    fn boot(&mut self, model: &str, table: &str, columns: &[&str]) -> EntityRef {
        let entity = Record::new(model, table)
            .with_tenant_columns(columns.iter().copied())
            .into_ref();
        self.scoping.on_query_build(&entity);
        self.booted.push(entity.clone());
        entity
    }

    fn create(&mut self, model: &str, table: &str, columns: &[&str]) -> EntityRef {
        let entity = Record::new(model, table)
            .with_tenant_columns(columns.iter().copied())
            .into_ref();
        self.scoping.on_create(&entity);
        entity
    }
}

fn select(entity: &EntityRef) -> String {
    tenant_scope::TenantQuery::for_entity(entity.as_ref()).to_sql(DbBackend::Sqlite)
}

#[test]
fn models_booted_before_authentication_are_scoped_afterwards() {
    let shared = SharedTenantRegistry::default();
    let mut host = Host::new(shared.clone());

    let invoices = host.boot("invoice", "invoices", &["organization_id"]);
    let users = host.boot("user", "users", &[]);
    assert_eq!(shared.pending_entities(), 2);

    // request authenticated
    shared.add_tenant("organization_id", 42).unwrap();
    host.scoping.after_tenant_registered();

    assert_eq!(shared.pending_entities(), 0);
    assert!(select(&invoices).contains("\"invoices\".\"organization_id\" = 42"));
    assert!(!select(&users).contains("WHERE"));

    let invoice = host.create("invoice", "invoices", &["organization_id"]);
    assert_eq!(
        invoice.attribute("organization_id"),
        Some(TenantValue::Int(42))
    );
    assert_eq!(host.booted.len(), 2);
}

#[test]
fn owned_registry_drives_the_same_hooks() {
    let mut registry = TenantRegistry::new();
    registry.add_tenant("team_id", "core").unwrap();
    let mut host = Host::new(registry);

    let tasks = host.boot("task", "tasks", &["team_id"]);
    assert!(select(&tasks).contains("\"tasks\".\"team_id\" = 'core'"));

    let task = host.create("task", "tasks", &["team_id"]);
    assert_eq!(
        task.attribute("team_id"),
        Some(TenantValue::Str("core".to_owned()))
    );
}

#[test]
fn administrative_access_bypasses_tenant_scopes() {
    let shared = SharedTenantRegistry::default();
    shared.add_tenant("organization_id", 1).unwrap();
    let mut host = Host::new(shared.clone());

    let invoices = host.boot("invoice", "invoices", &["organization_id"]);
    let unscoped = shared.query_without_tenant_scopes(invoices.as_ref());
    assert!(unscoped.is_unrestricted());

    let created = shared.without_scoping(|| host.create("invoice", "invoices", &["organization_id"]));
    assert_eq!(created.attribute("organization_id"), None);
}

#[test]
fn registry_seeded_from_configuration() {
    let figment = Figment::new().merge(Serialized::defaults(serde_json::json!({
        "tenant_scope": {
            "tenants": { "organization_id": 5 }
        }
    })));
    let config = TenantScopeConfig::from_figment(&figment).unwrap();
    let registry = TenantRegistry::from_config(&config).unwrap();

    assert!(registry.is_enabled());
    assert!(registry.has_tenant("organization_id"));

    let mut host = Host::new(registry);
    let invoices = host.boot("invoice", "invoices", &["organization_id"]);
    assert!(select(&invoices).contains("\"invoices\".\"organization_id\" = 5"));
}

#[test]
fn disabled_configuration_starts_unscoped() {
    let config = TenantScopeConfig {
        enabled: false,
        ..TenantScopeConfig::default()
    };
    let registry = TenantRegistry::from_config(&config).unwrap();
    assert!(!registry.is_enabled());

    let mut host = Host::new(registry);
    host.boot("invoice", "invoices", &["organization_id"]);
    assert_eq!(host.scoping.pending_entities(), 0);
}
