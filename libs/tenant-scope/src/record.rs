use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::{EntityRef, Restrictions, TenantAware, TenantSource};
use crate::query::TenantQuery;
use crate::reference::TenantRef;
use crate::value::TenantValue;

/// A dynamically described row that takes part in tenant scoping.
///
/// `Record` is what a host without a typed model layer hands to the registry:
/// a model name, its table, the primary key column, the tenant columns it opts
/// into and the key-like attributes it carries. Used as a tenant reference its
/// foreign key follows the `<model>_<primary key>` convention, so a
/// `tenant_a` record keyed by `id` binds `tenant_a_id`.
#[derive(Debug)]
pub struct Record {
    model: String,
    table: String,
    primary_key: String,
    tenant_columns: Vec<String>,
    attributes: RwLock<BTreeMap<String, TenantValue>>,
    restrictions: Restrictions,
}

impl Record {
    #[must_use]
    pub fn new(model: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: table.into(),
            primary_key: "id".to_owned(),
            tenant_columns: Vec::new(),
            attributes: RwLock::new(BTreeMap::new()),
            restrictions: Restrictions::new(),
        }
    }

    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    #[must_use]
    pub fn with_tenant_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenant_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        column: impl Into<String>,
        value: impl Into<TenantValue>,
    ) -> Self {
        self.attributes
            .get_mut()
            .insert(column.into(), value.into());
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Query for this record's table with its restrictions applied.
    #[must_use]
    pub fn query(&self) -> TenantQuery {
        TenantQuery::for_entity(self)
    }

    #[must_use]
    pub fn into_ref(self) -> EntityRef {
        Arc::new(self)
    }
}

impl TenantAware for Record {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn tenant_columns(&self) -> Vec<String> {
        self.tenant_columns.clone()
    }

    fn attribute(&self, column: &str) -> Option<TenantValue> {
        self.attributes.read().get(column).cloned()
    }

    fn set_attribute(&self, column: &str, value: TenantValue) {
        self.attributes.write().insert(column.to_owned(), value);
    }

    fn restrictions(&self) -> &Restrictions {
        &self.restrictions
    }
}

impl TenantSource for Record {
    fn foreign_key_name(&self) -> String {
        format!("{}_{}", self.model, self.primary_key)
    }

    fn primary_key_value(&self) -> Option<TenantValue> {
        self.attribute(&self.primary_key)
    }
}

impl<'a> From<&'a Record> for TenantRef<'a> {
    fn from(record: &'a Record) -> Self {
        Self::Entity(record)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn foreign_key_follows_model_and_primary_key() {
        let org = Record::new("organization", "organizations");
        assert_eq!(org.foreign_key_name(), "organization_id");

        let team = Record::new("team", "teams").with_primary_key("uuid");
        assert_eq!(team.foreign_key_name(), "team_uuid");
        assert_eq!(team.primary_key_value(), None);
    }

    #[test]
    fn attributes_are_readable_and_writable_through_shared_handle() {
        let handle = Record::new("invoice", "invoices")
            .with_tenant_columns(["org_id"])
            .into_ref();

        assert_eq!(handle.attribute("org_id"), None);
        handle.set_attribute("org_id", TenantValue::Int(5));
        assert_eq!(handle.attribute("org_id"), Some(TenantValue::Int(5)));
        assert_eq!(handle.tenant_columns(), vec!["org_id".to_owned()]);
    }

    #[test]
    fn qualified_column_uses_table() {
        let invoice = Record::new("invoice", "invoices");
        assert_eq!(
            invoice.qualified_column("org_id").to_string(),
            "invoices.org_id"
        );
    }
}
