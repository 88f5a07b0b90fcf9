//! # Derived Scalar Properties
//!
//! Every scalar group expression carries a [`DerivedScalarProps`]. Members of one
//! scalar group share a single instance (see [`crate::memo`]).
//!
//! ## Two Ways In
//!
//! - **Lazy accessors** (`used_columns`, `has_subquery`, ...) compute and cache one
//!   field on first use.
//! - **Bulk [`DerivedScalarProps::derive`]** runs every accessor and then marks the
//!   set complete.
//!
//! Both paths go through the same per-field routine, guarded by a `OnceLock`, so a
//! field is computed at most once no matter how it was first requested and bulk
//! derivation after partial lazy use only fills the gaps.
//!
//! ## Children
//!
//! Derivation reads the properties of child groups and never derives them. A child
//! that is not complete yet is a programming error and panics; the search driver
//! derives groups bottom-up before any xform runs.
//!
//! ## Fields
//!
//! | Field | Rule |
//! |---|---|
//! | defined columns | project elements define their column; union of children |
//! | used columns | identifiers; outer references of subqueries; union of children |
//! | set-returning columns | project elements whose value comes from a set-returning function |
//! | has subquery | any `Subquery`/`SubqueryExists` in the subtree |
//! | partition info | partitioned tables scanned by subqueries in the subtree |
//! | function properties | most restrictive over every function in the subtree |
//! | non-scalar function | any set-returning function in the subtree |
//! | distinct aggregates | project lists only: distinct `DISTINCT` aggregate groups |
//! | multiple distinct aggregates | project lists only: two or more different argument lists |
//! | scalar array comparison | any `ArrayCmp` in the subtree |

use crate::context::OptContext;
use crate::error::Result;
use crate::expr::{ColumnSet, Operator, ScalarOp, TableRef};
use crate::memo::{ExprId, GroupExpr, GroupId};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Function volatility, ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Volatility {
    #[default]
    Immutable,
    Stable,
    Volatile,
}

/// What a function does with SQL data, ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DataAccess {
    #[default]
    NoSql,
    ContainsSql,
    ReadsSql,
    ModifiesSql,
}

/// Catalog-supplied attributes of a function, or the combination over a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FunctionProps {
    pub volatility: Volatility,
    pub data_access: DataAccess,
    pub returns_set: bool,
}

impl FunctionProps {
    pub fn new(volatility: Volatility, data_access: DataAccess, returns_set: bool) -> Self {
        Self {
            volatility,
            data_access,
            returns_set,
        }
    }

    /// Properties assumed for a function the catalog does not know.
    pub fn unknown() -> Self {
        Self::new(Volatility::Volatile, DataAccess::ContainsSql, false)
    }

    /// Most restrictive of the two.
    pub fn combine(self, other: FunctionProps) -> FunctionProps {
        FunctionProps {
            volatility: self.volatility.max(other.volatility),
            data_access: self.data_access.max(other.data_access),
            returns_set: self.returns_set || other.returns_set,
        }
    }
}

/// Partitioned tables consumed underneath an expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionInfo {
    consumers: BTreeSet<TableRef>,
}

impl PartitionInfo {
    pub fn add(&mut self, table: TableRef) {
        self.consumers.insert(table);
    }

    pub fn merge(&mut self, other: &PartitionInfo) {
        self.consumers.extend(other.consumers.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn contains(&self, table: &TableRef) -> bool {
        self.consumers.contains(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableRef> {
        self.consumers.iter()
    }
}

/// Memoized scalar properties of a scalar group expression.
#[derive(Debug, Default)]
pub struct DerivedScalarProps {
    defined: OnceLock<ColumnSet>,
    used: OnceLock<ColumnSet>,
    set_returning: OnceLock<ColumnSet>,
    has_subquery: OnceLock<bool>,
    partition_info: OnceLock<PartitionInfo>,
    function_props: OnceLock<FunctionProps>,
    has_non_scalar_function: OnceLock<bool>,
    total_distinct_aggs: OnceLock<usize>,
    has_multiple_distinct_aggs: OnceLock<bool>,
    has_scalar_array_cmp: OnceLock<bool>,
    complete: AtomicBool,
    derivations: AtomicUsize,
}

impl DerivedScalarProps {
    /// True once [`derive`](Self::derive) has run.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Number of per-field derivation routines executed so far.
    pub fn derivation_count(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    /// Derive every field and mark the set complete. Cheap when already complete.
    pub fn derive(&self, ctx: &OptContext, expr: ExprId) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        ctx.guard.check(0)?;
        self.defined_columns(ctx, expr);
        self.used_columns(ctx, expr);
        self.set_returning_columns(ctx, expr);
        self.has_subquery(ctx, expr);
        self.partition_info(ctx, expr);
        self.function_props(ctx, expr);
        self.has_non_scalar_function(ctx, expr);
        self.total_distinct_aggs(ctx, expr);
        self.has_multiple_distinct_aggs(ctx, expr);
        self.has_scalar_array_cmp(ctx, expr);
        self.complete.store(true, Ordering::Release);
        Ok(())
    }

    fn compute<'a, T>(&'a self, cell: &'a OnceLock<T>, f: impl FnOnce() -> T) -> &'a T {
        cell.get_or_init(|| {
            self.derivations.fetch_add(1, Ordering::Relaxed);
            f()
        })
    }

    pub fn defined_columns(&self, ctx: &OptContext, expr: ExprId) -> &ColumnSet {
        self.compute(&self.defined, || {
            let gexpr = ctx.memo.expr(expr);
            let mut cols = ColumnSet::new();
            if let Operator::Scalar(ScalarOp::ProjectElement(c)) = &*gexpr.op {
                cols.insert(c.id);
            }
            for (child, props) in scalar_children(ctx, gexpr) {
                cols.extend(props.defined_columns(ctx, child));
            }
            cols
        })
    }

    pub fn used_columns(&self, ctx: &OptContext, expr: ExprId) -> &ColumnSet {
        self.compute(&self.used, || {
            let gexpr = ctx.memo.expr(expr);
            let mut cols = ColumnSet::new();
            if let Operator::Scalar(ScalarOp::Ident(c)) = &*gexpr.op {
                cols.insert(c.id);
            }
            for (child, props) in scalar_children(ctx, gexpr) {
                cols.extend(props.used_columns(ctx, child));
            }
            // A subquery uses whatever it references from outside.
            for (child, props) in relational_children(ctx, gexpr) {
                cols.extend(props.outer_references(ctx, child));
            }
            cols
        })
    }

    pub fn set_returning_columns(&self, ctx: &OptContext, expr: ExprId) -> &ColumnSet {
        self.compute(&self.set_returning, || {
            let gexpr = ctx.memo.expr(expr);
            let mut cols = ColumnSet::new();
            match &*gexpr.op {
                Operator::Scalar(ScalarOp::ProjectElement(c)) => {
                    for (child, props) in scalar_children(ctx, gexpr) {
                        if props.function_props(ctx, child).returns_set {
                            cols.insert(c.id);
                        }
                    }
                }
                Operator::Scalar(ScalarOp::ProjectList) => {
                    for (child, props) in scalar_children(ctx, gexpr) {
                        cols.extend(props.set_returning_columns(ctx, child));
                    }
                }
                _ => {}
            }
            cols
        })
    }

    pub fn has_subquery(&self, ctx: &OptContext, expr: ExprId) -> bool {
        *self.compute(&self.has_subquery, || {
            let gexpr = ctx.memo.expr(expr);
            matches!(
                &*gexpr.op,
                Operator::Scalar(ScalarOp::Subquery(_) | ScalarOp::SubqueryExists)
            ) || scalar_children(ctx, gexpr).any(|(child, props)| props.has_subquery(ctx, child))
        })
    }

    pub fn partition_info(&self, ctx: &OptContext, expr: ExprId) -> &PartitionInfo {
        self.compute(&self.partition_info, || {
            let gexpr = ctx.memo.expr(expr);
            let mut info = PartitionInfo::default();
            for (child, props) in scalar_children(ctx, gexpr) {
                info.merge(props.partition_info(ctx, child));
            }
            for (child, props) in relational_children(ctx, gexpr) {
                info.merge(props.partition_info(ctx, child));
            }
            info
        })
    }

    pub fn function_props(&self, ctx: &OptContext, expr: ExprId) -> FunctionProps {
        *self.compute(&self.function_props, || {
            let gexpr = ctx.memo.expr(expr);
            let own = match &*gexpr.op {
                Operator::Scalar(ScalarOp::Func { name }) => ctx
                    .catalog
                    .function_props(name)
                    .unwrap_or_else(FunctionProps::unknown),
                _ => FunctionProps::default(),
            };
            scalar_children(ctx, gexpr)
                .fold(own, |acc, (child, props)| acc.combine(props.function_props(ctx, child)))
        })
    }

    pub fn has_non_scalar_function(&self, ctx: &OptContext, expr: ExprId) -> bool {
        *self.compute(&self.has_non_scalar_function, || {
            let gexpr = ctx.memo.expr(expr);
            let own = match &*gexpr.op {
                Operator::Scalar(ScalarOp::Func { name }) => ctx
                    .catalog
                    .function_props(name)
                    .is_some_and(|f| f.returns_set),
                _ => false,
            };
            own || scalar_children(ctx, gexpr)
                .any(|(child, props)| props.has_non_scalar_function(ctx, child))
        })
    }

    /// Number of distinct `DISTINCT` aggregates in a project list. Identical
    /// aggregates live in one group and count once.
    pub fn total_distinct_aggs(&self, ctx: &OptContext, expr: ExprId) -> usize {
        *self.compute(&self.total_distinct_aggs, || {
            distinct_aggs(ctx, ctx.memo.expr(expr))
                .map(|(agg_groups, _)| agg_groups.len())
                .unwrap_or(0)
        })
    }

    /// Whether a project list holds `DISTINCT` aggregates over two or more
    /// different argument lists.
    pub fn has_multiple_distinct_aggs(&self, ctx: &OptContext, expr: ExprId) -> bool {
        *self.compute(&self.has_multiple_distinct_aggs, || {
            distinct_aggs(ctx, ctx.memo.expr(expr))
                .map(|(_, arg_lists)| arg_lists.len() >= 2)
                .unwrap_or(false)
        })
    }

    pub fn has_scalar_array_cmp(&self, ctx: &OptContext, expr: ExprId) -> bool {
        *self.compute(&self.has_scalar_array_cmp, || {
            let gexpr = ctx.memo.expr(expr);
            matches!(&*gexpr.op, Operator::Scalar(ScalarOp::ArrayCmp { .. }))
                || scalar_children(ctx, gexpr)
                    .any(|(child, props)| props.has_scalar_array_cmp(ctx, child))
        })
    }
}

/// Scalar child groups paired with the member expression their shared
/// properties should be read through.
fn scalar_children<'a>(
    ctx: &'a OptContext<'a>,
    gexpr: &'a GroupExpr,
) -> impl Iterator<Item = (ExprId, &'a DerivedScalarProps)> + 'a {
    gexpr
        .children
        .iter()
        .filter(move |&&g| ctx.memo.group(g).is_scalar())
        .map(move |&g| (ctx.memo.group(g).exprs()[0], ctx.derived_scalar(g)))
}

fn relational_children<'a>(
    ctx: &'a OptContext<'a>,
    gexpr: &'a GroupExpr,
) -> impl Iterator<Item = (GroupId, &'a crate::relational::DerivedRelationalProps)> + 'a {
    gexpr
        .children
        .iter()
        .filter(move |&&g| !ctx.memo.group(g).is_scalar())
        .map(move |&g| (g, ctx.derived_relational(g)))
}

/// For a project list: the set of `DISTINCT` aggregate groups and the set of
/// their argument lists. `None` for any other operator.
fn distinct_aggs(
    ctx: &OptContext,
    gexpr: &GroupExpr,
) -> Option<(BTreeSet<GroupId>, BTreeSet<Vec<GroupId>>)> {
    if !matches!(&*gexpr.op, Operator::Scalar(ScalarOp::ProjectList)) {
        return None;
    }
    let memo = ctx.memo;
    let mut agg_groups = BTreeSet::new();
    let mut arg_lists = BTreeSet::new();
    for &element_group in &gexpr.children {
        let element = memo.expr(memo.group(element_group).exprs()[0]);
        if !matches!(&*element.op, Operator::Scalar(ScalarOp::ProjectElement(_))) {
            continue;
        }
        for &value_group in &element.children {
            let value = memo.expr(memo.group(value_group).exprs()[0]);
            if let Operator::Scalar(ScalarOp::AggFunc { distinct: true, .. }) = &*value.op {
                agg_groups.insert(value_group);
                arg_lists.insert(value.children.clone());
            }
        }
    }
    Some((agg_groups, arg_lists))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::expr::{AggFunc, ColumnRef};
    use crate::guard::ExecGuard;
    use crate::memo::Memo;

    fn ident(memo: &mut Memo, id: u32, name: &str) -> GroupId {
        memo.insert(Operator::ident(ColumnRef::new(id, Some("t"), name)), vec![])
            .0
    }

    fn derive_all(memo: &Memo, catalog: &InMemoryCatalog) {
        let guard = ExecGuard::default();
        let ctx = OptContext::new(memo, catalog, &guard);
        for g in memo.groups() {
            let first = g.exprs()[0];
            memo.expr(first).scalar_props().derive(&ctx, first).unwrap();
        }
    }

    fn agg(memo: &mut Memo, func: AggFunc, arg: GroupId, out: u32) -> GroupId {
        let (a, _) = memo.insert(
            Operator::Scalar(ScalarOp::AggFunc {
                func,
                distinct: true,
            }),
            vec![arg],
        );
        memo.insert(
            Operator::Scalar(ScalarOp::ProjectElement(ColumnRef::new(out, None, "agg"))),
            vec![a],
        )
        .0
    }

    #[test]
    fn test_distinct_aggregate_counting() {
        let mut memo = Memo::new();
        let a = ident(&mut memo, 1, "a");
        let b = ident(&mut memo, 2, "b");
        // count(distinct a), sum(distinct a), count(distinct b)
        let e1 = agg(&mut memo, AggFunc::Count, a, 10);
        let e2 = agg(&mut memo, AggFunc::Sum, a, 11);
        let e3 = agg(&mut memo, AggFunc::Count, b, 12);
        let (_, list) = memo.insert(Operator::Scalar(ScalarOp::ProjectList), vec![e1, e2, e3]);
        let (_, single) = memo.insert(Operator::Scalar(ScalarOp::ProjectList), vec![e1, e2]);

        let catalog = InMemoryCatalog::new();
        derive_all(&memo, &catalog);
        let guard = ExecGuard::default();
        let ctx = OptContext::new(&memo, &catalog, &guard);

        let props = memo.expr(list).scalar_props();
        assert_eq!(props.total_distinct_aggs(&ctx, list), 3);
        assert!(props.has_multiple_distinct_aggs(&ctx, list));
        assert_eq!(
            props.defined_columns(&ctx, list),
            &ColumnSet::from([10, 11, 12])
        );
        assert_eq!(props.used_columns(&ctx, list), &ColumnSet::from([1, 2]));

        let props = memo.expr(single).scalar_props();
        assert_eq!(props.total_distinct_aggs(&ctx, single), 2);
        assert!(!props.has_multiple_distinct_aggs(&ctx, single));
    }

    #[test]
    fn test_volatility_is_most_restrictive() {
        let mut memo = Memo::new();
        let a = ident(&mut memo, 1, "a");
        let (f, _) = memo.insert(Operator::Scalar(ScalarOp::Func { name: "lower".into() }), vec![a]);
        let (r, _) = memo.insert(Operator::Scalar(ScalarOp::Func { name: "random".into() }), vec![]);
        let (_, sum) = memo.insert(Operator::binary(crate::expr::BinaryOp::Add), vec![f, r]);

        let mut catalog = InMemoryCatalog::new();
        catalog.add_function(
            "lower",
            FunctionProps::new(Volatility::Immutable, DataAccess::NoSql, false),
        );
        derive_all(&memo, &catalog);
        let guard = ExecGuard::default();
        let ctx = OptContext::new(&memo, &catalog, &guard);

        let props = memo.expr(sum).scalar_props();
        assert_eq!(props.function_props(&ctx, sum).volatility, Volatility::Volatile);
        let lower = memo.group(f).exprs()[0];
        assert_eq!(
            memo.expr(lower).scalar_props().function_props(&ctx, lower).volatility,
            Volatility::Immutable
        );
    }

    #[test]
    fn test_derive_is_idempotent_and_reuses_lazy_fields() {
        let mut memo = Memo::new();
        let a = ident(&mut memo, 1, "a");
        let b = ident(&mut memo, 2, "b");
        let (_, eq) = memo.insert(Operator::binary(crate::expr::BinaryOp::Eq), vec![a, b]);
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();
        let ctx = OptContext::new(&memo, &catalog, &guard);
        for g in [a, b] {
            let first = memo.group(g).exprs()[0];
            memo.expr(first).scalar_props().derive(&ctx, first).unwrap();
        }

        let props = memo.expr(eq).scalar_props();
        assert_eq!(props.used_columns(&ctx, eq), &ColumnSet::from([1, 2]));
        assert_eq!(props.derivation_count(), 1);
        assert!(!props.is_complete());

        props.derive(&ctx, eq).unwrap();
        let after_first = props.derivation_count();
        assert_eq!(after_first, 10);
        assert!(props.is_complete());

        props.derive(&ctx, eq).unwrap();
        assert_eq!(props.derivation_count(), after_first);
        assert_eq!(props.used_columns(&ctx, eq), &ColumnSet::from([1, 2]));
        assert!(!props.has_subquery(&ctx, eq));
    }

    #[test]
    #[should_panic(expected = "used before derivation")]
    fn test_incomplete_child_panics() {
        let mut memo = Memo::new();
        let a = ident(&mut memo, 1, "a");
        let (_, not) = memo.insert(
            Operator::Scalar(ScalarOp::Unary(crate::expr::UnaryOp::Not)),
            vec![a],
        );
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();
        let ctx = OptContext::new(&memo, &catalog, &guard);
        memo.expr(not).scalar_props().used_columns(&ctx, not);
    }
}
