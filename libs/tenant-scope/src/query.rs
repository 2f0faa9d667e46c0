use std::fmt;

use sea_orm::sea_query::{
    Alias, Asterisk, Condition, Expr, IntoCondition, Query, SelectStatement,
};
use sea_orm::{DbBackend, EntityTrait, QueryFilter, Select};

use crate::entity::TenantAware;
use crate::value::TenantValue;

/// A column reference qualified by its table, e.g. `"model_stubs"."tenant_a_id"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedColumn {
    table: String,
    column: String,
}

impl QualifiedColumn {
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Column expression usable in `sea_query` conditions.
    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::col((Alias::new(self.table.as_str()), Alias::new(self.column.as_str())))
    }
}

impl fmt::Display for QualifiedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// The query being built for a tenant-aware entity.
///
/// Restrictions narrow the query by pushing conditions into it; the conditions
/// are AND-ed together when the query is rendered or applied onto a `SeaORM`
/// [`Select`]. The names of the restrictions that ran are kept so callers can
/// tell a scoped query from an unscoped one.
#[derive(Clone, Debug)]
pub struct TenantQuery {
    table: String,
    conditions: Vec<Condition>,
    applied: Vec<String>,
}

impl TenantQuery {
    /// Empty, unrestricted query over `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            applied: Vec::new(),
        }
    }

    /// Fresh query for `entity` with every registered restriction applied.
    #[must_use]
    pub fn for_entity(entity: &dyn TenantAware) -> Self {
        Self::for_entity_without(entity, &[])
    }

    /// Fresh query for `entity` skipping the restrictions named in `excluded`.
    #[must_use]
    pub fn for_entity_without(entity: &dyn TenantAware, excluded: &[String]) -> Self {
        let mut query = Self::new(entity.table_name());
        entity.restrictions().apply(&mut query, entity, excluded);
        query
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Add a condition; all conditions must hold.
    pub fn filter<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        self.conditions.push(condition.into_condition());
        self
    }

    /// Restrict `column` to exactly `value`.
    pub fn where_eq(&mut self, column: &QualifiedColumn, value: TenantValue) -> &mut Self {
        self.filter(column.expr().eq(value))
    }

    /// True when no restriction has added a condition.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Names of the restrictions that ran against this query, in order.
    #[must_use]
    pub fn applied_restrictions(&self) -> &[String] {
        &self.applied
    }

    pub(crate) fn mark_applied(&mut self, name: &str) {
        self.applied.push(name.to_owned());
    }

    /// The combined condition, or `None` for an unrestricted query.
    #[must_use]
    pub fn condition(&self) -> Option<Condition> {
        if self.conditions.is_empty() {
            return None;
        }
        Some(
            self.conditions
                .iter()
                .cloned()
                .fold(Condition::all(), Condition::add),
        )
    }

    /// `SELECT * FROM <table> [WHERE ...]`
    #[must_use]
    pub fn to_statement(&self) -> SelectStatement {
        let mut stmt = Query::select();
        stmt.column(Asterisk).from(Alias::new(self.table.as_str()));
        if let Some(cond) = self.condition() {
            stmt.cond_where(cond);
        }
        stmt
    }

    /// Render the statement with inlined values for `backend`.
    #[must_use]
    pub fn to_sql(&self, backend: DbBackend) -> String {
        backend.build(&self.to_statement()).to_string()
    }

    /// Apply the collected conditions onto a `SeaORM` select.
    #[must_use]
    pub fn apply<E: EntityTrait>(&self, select: Select<E>) -> Select<E> {
        match self.condition() {
            Some(cond) => select.filter(cond),
            None => select,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_query_has_no_where_clause() {
        let query = TenantQuery::new("invoices");
        assert!(query.is_unrestricted());
        assert!(query.condition().is_none());

        let sql = query.to_sql(DbBackend::Sqlite);
        assert!(sql.contains("FROM \"invoices\""), "{sql}");
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn conditions_are_anded() {
        let mut query = TenantQuery::new("invoices");
        query
            .where_eq(
                &QualifiedColumn::new("invoices", "org_id"),
                TenantValue::Int(1),
            )
            .where_eq(
                &QualifiedColumn::new("invoices", "team_id"),
                TenantValue::Int(2),
            );

        let sql = query.to_sql(DbBackend::Sqlite);
        assert!(sql.contains("\"invoices\".\"org_id\" = 1"), "{sql}");
        assert!(sql.contains("\"invoices\".\"team_id\" = 2"), "{sql}");
        assert!(sql.contains(" AND "), "{sql}");
    }

    #[test]
    fn qualified_column_displays_dotted() {
        let col = QualifiedColumn::new("model_stubs", "tenant_a_id");
        assert_eq!(col.to_string(), "model_stubs.tenant_a_id");
        assert_eq!(col.table(), "model_stubs");
        assert_eq!(col.column(), "tenant_a_id");
    }
}
