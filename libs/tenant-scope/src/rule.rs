use std::fmt;
use std::sync::Arc;

use crate::entity::TenantAware;
use crate::error::TenantError;
use crate::query::TenantQuery;
use crate::value::TenantValue;

type NarrowFn = dyn Fn(&mut TenantQuery, &dyn TenantAware) + Send + Sync;
type StampFn = dyn Fn(&dyn TenantAware) + Send + Sync;

/// How one tenant binding narrows queries and stamps new records.
///
/// A rule is immutable: both strategies are fixed at construction, and a
/// different behaviour means registering a new rule under the same column.
/// Cloning is cheap (two `Arc`s).
#[derive(Clone)]
pub struct ScopeRule {
    narrow: Arc<NarrowFn>,
    stamp: Arc<StampFn>,
}

impl ScopeRule {
    #[must_use]
    pub fn new<N, S>(narrow: N, stamp: S) -> Self
    where
        N: Fn(&mut TenantQuery, &dyn TenantAware) + Send + Sync + 'static,
        S: Fn(&dyn TenantAware) + Send + Sync + 'static,
    {
        Self {
            narrow: Arc::new(narrow),
            stamp: Arc::new(stamp),
        }
    }

    pub fn builder() -> ScopeRuleBuilder {
        ScopeRuleBuilder::default()
    }

    /// Rule that only narrows queries and leaves new records untouched.
    #[must_use]
    pub fn narrowing_only<N>(narrow: N) -> Self
    where
        N: Fn(&mut TenantQuery, &dyn TenantAware) + Send + Sync + 'static,
    {
        Self::new(narrow, |_: &dyn TenantAware| {})
    }

    /// The default rule: `<table>.<column> = value` on queries, and
    /// `column = value` on new records that have no value for it yet.
    #[must_use]
    pub fn equals(column: impl Into<String>, value: TenantValue) -> Self {
        let column: Arc<str> = Arc::from(column.into());
        let stamped = value.clone();
        let stamp_column = Arc::clone(&column);

        Self::new(
            move |query: &mut TenantQuery, entity: &dyn TenantAware| {
                query.where_eq(&entity.qualified_column(&column), value.clone());
            },
            move |entity: &dyn TenantAware| {
                if entity.attribute(&stamp_column).is_none() {
                    entity.set_attribute(&stamp_column, stamped.clone());
                }
            },
        )
    }

    /// Narrow `query` built for `entity`.
    pub fn narrow(&self, query: &mut TenantQuery, entity: &dyn TenantAware) {
        (self.narrow)(query, entity);
    }

    /// Stamp a record that is about to be created.
    pub fn stamp(&self, entity: &dyn TenantAware) {
        (self.stamp)(entity);
    }
}

impl fmt::Debug for ScopeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRule").finish_non_exhaustive()
    }
}

/// Collects both halves of a [`ScopeRule`]; `build` refuses a half-built rule.
#[derive(Default)]
#[must_use]
pub struct ScopeRuleBuilder {
    narrow: Option<Arc<NarrowFn>>,
    stamp: Option<Arc<StampFn>>,
}

impl ScopeRuleBuilder {
    pub fn on_query<N>(mut self, narrow: N) -> Self
    where
        N: Fn(&mut TenantQuery, &dyn TenantAware) + Send + Sync + 'static,
    {
        self.narrow = Some(Arc::new(narrow));
        self
    }

    pub fn on_create<S>(mut self, stamp: S) -> Self
    where
        S: Fn(&dyn TenantAware) + Send + Sync + 'static,
    {
        self.stamp = Some(Arc::new(stamp));
        self
    }

    /// # Errors
    /// Returns `TenantError::IncompleteRule` when either strategy is missing.
    pub fn build(self) -> Result<ScopeRule, TenantError> {
        let narrow = self.narrow.ok_or(TenantError::IncompleteRule("query"))?;
        let stamp = self.stamp.ok_or(TenantError::IncompleteRule("create"))?;
        Ok(ScopeRule { narrow, stamp })
    }
}

impl fmt::Debug for ScopeRuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRuleBuilder")
            .field("on_query", &self.narrow.is_some())
            .field("on_create", &self.stamp.is_some())
            .finish()
    }
}
