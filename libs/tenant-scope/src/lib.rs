#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Automatic tenant scoping for ORM queries and new records.
//!
//! A [`TenantRegistry`] maps tenant columns (`organization_id`, `team_id`, ...)
//! to [`ScopeRule`]s. The host ORM calls two hooks on it:
//!
//! - when a query is built for a model, every bound tenant column the model
//!   declares becomes a named restriction on the model's query;
//! - when a record is created, every bound tenant column the model declares is
//!   stamped with the tenant value unless the caller already set it.
//!
//! Models booted before any tenant is known are queued and replayed once the
//! first tenant is bound.
//!
//! # Example
//! ```rust
//! use tenant_scope::{Record, TenantAware, TenantRegistry, TenantValue};
//!
//! let mut registry = TenantRegistry::new();
//! registry.add_tenant("organization_id", 1).unwrap();
//!
//! let invoice = Record::new("invoice", "invoices")
//!     .with_tenant_columns(["organization_id"])
//!     .into_ref();
//!
//! registry.apply_scopes_to_query(&invoice);
//! registry.on_entity_create(&invoice);
//!
//! assert_eq!(invoice.attribute("organization_id"), Some(TenantValue::Int(1)));
//! assert!(invoice.restrictions().contains("organization_id"));
//! ```
//!
//! # Features
//! - `active-model` (default): [`sea::ScopedActiveModel`], an adapter that scopes
//!   `SeaORM` entities and stamps their `ActiveModel`s.

pub mod config;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod record;
pub mod reference;
pub mod registry;
pub mod rule;
#[cfg(feature = "active-model")]
pub mod sea;
pub mod shared;
pub mod value;

pub use config::{CONFIG_SECTION, TenantScopeConfig};
pub use entity::{EntityRef, Restriction, Restrictions, TenantAware, TenantSource};
pub use error::{ConfigError, TenantError};
pub use lifecycle::TenantLifecycle;
pub use query::{QualifiedColumn, TenantQuery};
pub use record::Record;
pub use reference::{TenantBinding, TenantRef};
pub use registry::TenantRegistry;
pub use rule::{ScopeRule, ScopeRuleBuilder};
pub use shared::SharedTenantRegistry;
pub use value::TenantValue;

pub type Result<T> = std::result::Result<T, TenantError>;
