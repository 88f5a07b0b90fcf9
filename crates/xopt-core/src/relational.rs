//! # Derived Relational Properties
//!
//! Logical properties of a relational group. All logical members of a group produce
//! the same result, so the properties are stored once per group and computed from
//! its first logical member, whose children are always older groups.
//!
//! The lazy/bulk contract is the one used for scalar properties in
//! [`crate::properties`]: one routine per field behind a `OnceLock`, `derive` fills
//! every field and sets `complete`, and children must already be complete.

use crate::constraint::{self, Constraint};
use crate::context::OptContext;
use crate::error::Result;
use crate::expr::{ColumnSet, JoinType, LogicalOp, Operator};
use crate::memo::{ExprId, GroupExpr, GroupId};
use crate::properties::PartitionInfo;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Default)]
pub struct DerivedRelationalProps {
    output: OnceLock<ColumnSet>,
    outer_refs: OnceLock<ColumnSet>,
    max_card: OnceLock<Option<u64>>,
    join_depth: OnceLock<usize>,
    partition_info: OnceLock<PartitionInfo>,
    constraint: OnceLock<Option<Arc<Constraint>>>,
    complete: AtomicBool,
    derivations: AtomicUsize,
}

impl DerivedRelationalProps {
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn derivation_count(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn derive(&self, ctx: &OptContext, group: GroupId) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        ctx.guard.check(0)?;
        self.output_columns(ctx, group);
        self.outer_references(ctx, group);
        self.constraint(ctx, group)?;
        self.max_cardinality(ctx, group)?;
        self.join_depth(ctx, group);
        self.partition_info(ctx, group);
        self.complete.store(true, Ordering::Release);
        Ok(())
    }

    fn compute<'a, T>(&'a self, cell: &'a OnceLock<T>, f: impl FnOnce() -> T) -> &'a T {
        cell.get_or_init(|| {
            self.derivations.fetch_add(1, Ordering::Relaxed);
            f()
        })
    }

    fn try_compute<'a, T>(
        &'a self,
        cell: &'a OnceLock<T>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<&'a T> {
        if let Some(value) = cell.get() {
            return Ok(value);
        }
        let value = f()?;
        self.derivations.fetch_add(1, Ordering::Relaxed);
        Ok(cell.get_or_init(|| value))
    }

    /// Columns produced by the group.
    pub fn output_columns(&self, ctx: &OptContext, group: GroupId) -> &ColumnSet {
        self.compute(&self.output, || {
            let gexpr = first_logical(ctx, group);
            let mut cols = ColumnSet::new();
            match logical_op(gexpr) {
                LogicalOp::Get { columns, .. } => cols.extend(columns.iter().map(|c| c.id)),
                LogicalOp::Join {
                    join_type: JoinType::Semi | JoinType::Anti,
                } => {
                    cols.extend(rel_output(ctx, gexpr.children[0]));
                }
                LogicalOp::GbAgg { group_by } => {
                    cols.extend(group_by.iter().map(|c| c.id));
                    for (expr, props) in scalar_children(ctx, gexpr) {
                        cols.extend(props.defined_columns(ctx, expr));
                    }
                }
                LogicalOp::Project => {
                    cols.extend(rel_output(ctx, gexpr.children[0]));
                    for (expr, props) in scalar_children(ctx, gexpr) {
                        cols.extend(props.defined_columns(ctx, expr));
                    }
                }
                _ => {
                    for child in rel_children(ctx, gexpr) {
                        cols.extend(rel_output(ctx, child));
                    }
                }
            }
            cols
        })
    }

    /// Columns used in the subtree that none of its relational inputs produce.
    pub fn outer_references(&self, ctx: &OptContext, group: GroupId) -> &ColumnSet {
        self.compute(&self.outer_refs, || {
            let gexpr = first_logical(ctx, group);
            let mut used = ColumnSet::new();
            let mut available = ColumnSet::new();
            if let LogicalOp::GbAgg { group_by } = logical_op(gexpr) {
                used.extend(group_by.iter().map(|c| c.id));
            }
            for (expr, props) in scalar_children(ctx, gexpr) {
                used.extend(props.used_columns(ctx, expr));
            }
            for child in rel_children(ctx, gexpr) {
                let props = ctx.derived_relational(child);
                used.extend(props.outer_references(ctx, child));
                available.extend(props.output_columns(ctx, child));
            }
            used.difference(&available).copied().collect()
        })
    }

    /// Predicate summary over the group's output, if anything is known.
    pub fn constraint(&self, ctx: &OptContext, group: GroupId) -> Result<Option<Arc<Constraint>>> {
        self.try_compute(&self.constraint, || derive_constraint(ctx, group))
            .cloned()
    }

    /// Upper bound on the number of rows, `None` when unbounded.
    pub fn max_cardinality(&self, ctx: &OptContext, group: GroupId) -> Result<Option<u64>> {
        if let Some(card) = self.max_card.get() {
            return Ok(*card);
        }
        let contradiction = self
            .constraint(ctx, group)?
            .is_some_and(|c| c.is_contradiction());
        self.try_compute(&self.max_card, || {
            if contradiction {
                return Ok(Some(0));
            }
            let gexpr = first_logical(ctx, group);
            let child_card = |g: GroupId| ctx.derived_relational(g).max_cardinality(ctx, g);
            Ok(match logical_op(gexpr) {
                LogicalOp::Get { .. } => None,
                LogicalOp::Limit { count, .. } => {
                    Some(child_card(gexpr.children[0])?.map_or(*count, |c| c.min(*count)))
                }
                LogicalOp::GbAgg { group_by } if group_by.is_empty() => Some(1),
                LogicalOp::Join {
                    join_type: JoinType::Semi | JoinType::Anti,
                } => child_card(gexpr.children[0])?,
                LogicalOp::Join { .. } | LogicalOp::NAryJoin => {
                    let mut product = Some(1u64);
                    for child in rel_children(ctx, gexpr) {
                        product = match (product, child_card(child)?) {
                            (Some(p), Some(c)) => Some(p.saturating_mul(c)),
                            _ => None,
                        };
                    }
                    product
                }
                LogicalOp::Select | LogicalOp::Project | LogicalOp::GbAgg { .. } => {
                    child_card(gexpr.children[0])?
                }
            })
        })
        .copied()
    }

    /// Number of base relations joined underneath.
    pub fn join_depth(&self, ctx: &OptContext, group: GroupId) -> usize {
        *self.compute(&self.join_depth, || {
            let gexpr = first_logical(ctx, group);
            match logical_op(gexpr) {
                LogicalOp::Get { .. } => 1,
                _ => rel_children(ctx, gexpr)
                    .map(|g| ctx.derived_relational(g).join_depth(ctx, g))
                    .sum(),
            }
        })
    }

    /// Partitioned tables scanned underneath.
    pub fn partition_info(&self, ctx: &OptContext, group: GroupId) -> &PartitionInfo {
        self.compute(&self.partition_info, || {
            let gexpr = first_logical(ctx, group);
            let mut info = PartitionInfo::default();
            if let LogicalOp::Get { table, .. } = logical_op(gexpr) {
                if ctx.catalog.is_partitioned(table) {
                    info.add(table.clone());
                }
            }
            for (expr, props) in scalar_children(ctx, gexpr) {
                info.merge(props.partition_info(ctx, expr));
            }
            for child in rel_children(ctx, gexpr) {
                info.merge(ctx.derived_relational(child).partition_info(ctx, child));
            }
            info
        })
    }
}

fn derive_constraint(ctx: &OptContext, group: GroupId) -> Result<Option<Arc<Constraint>>> {
    let gexpr = first_logical(ctx, group);
    let child = |g: GroupId| ctx.derived_relational(g).constraint(ctx, g);
    let mut parts = Vec::new();
    match logical_op(gexpr) {
        LogicalOp::Get { .. } => return Ok(None),
        LogicalOp::Select => {
            parts.extend(child(gexpr.children[0])?);
            parts.extend(constraint::from_predicate(ctx, gexpr.children[1])?);
        }
        LogicalOp::Join { join_type } => match join_type {
            JoinType::Inner | JoinType::Cross => {
                parts.extend(child(gexpr.children[0])?);
                parts.extend(child(gexpr.children[1])?);
                parts.extend(constraint::from_predicate(ctx, gexpr.children[2])?);
            }
            JoinType::Left | JoinType::Semi | JoinType::Anti => {
                parts.extend(child(gexpr.children[0])?)
            }
            JoinType::Right => parts.extend(child(gexpr.children[1])?),
            JoinType::Full => return Ok(None),
        },
        LogicalOp::NAryJoin => {
            for g in rel_children(ctx, gexpr) {
                parts.extend(child(g)?);
            }
            let pred = gexpr.children[gexpr.children.len() - 1];
            parts.extend(constraint::from_predicate(ctx, pred)?);
        }
        LogicalOp::Project | LogicalOp::Limit { .. } => {
            return child(gexpr.children[0]);
        }
        LogicalOp::GbAgg { group_by } => {
            let keys: ColumnSet = group_by.iter().map(|c| c.id).collect();
            return Ok(child(gexpr.children[0])?
                .and_then(|c| c.constraint_on_columns(&keys))
                .map(Arc::new));
        }
    }
    Ok(Constraint::conjunction(parts))
}

fn first_logical<'a>(ctx: &OptContext<'a>, group: GroupId) -> &'a GroupExpr {
    let memo = ctx.memo;
    match memo.group(group).logical_exprs(memo).next() {
        Some(expr) => memo.expr(expr),
        None => panic!("relational group {} has no logical expression", group),
    }
}

fn logical_op(gexpr: &GroupExpr) -> &LogicalOp {
    match &*gexpr.op {
        Operator::Logical(op) => op,
        other => panic!("expression {} is {}, expected a logical operator", gexpr.id, other),
    }
}

fn rel_output<'a>(ctx: &OptContext<'a>, group: GroupId) -> &'a ColumnSet {
    ctx.derived_relational(group).output_columns(ctx, group)
}

fn rel_children<'a>(ctx: &OptContext<'a>, gexpr: &'a GroupExpr) -> impl Iterator<Item = GroupId> + 'a {
    let memo = ctx.memo;
    gexpr
        .children
        .iter()
        .copied()
        .filter(move |&g| !memo.group(g).is_scalar())
}

fn scalar_children<'a>(
    ctx: &OptContext<'a>,
    gexpr: &'a GroupExpr,
) -> impl Iterator<Item = (ExprId, &'a crate::properties::DerivedScalarProps)> + 'a {
    let ctx = *ctx;
    gexpr
        .children
        .iter()
        .copied()
        .filter(move |&g| ctx.memo.group(g).is_scalar())
        .map(move |g| (ctx.memo.group(g).exprs()[0], ctx.derived_scalar(g)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::expr::{ColumnRef, TableRef};
    use crate::guard::ExecGuard;
    use crate::memo::Memo;

    #[test]
    fn test_lazy_fields_are_computed_once() {
        let mut memo = Memo::new();
        let t = TableRef::new("default", "t");
        let cols = vec![ColumnRef::new(1, Some("t"), "a"), ColumnRef::new(2, Some("t"), "b")];
        let (get, _) = memo.insert(Operator::get(t, cols), vec![]);
        let (limit, _) = memo.insert(
            Operator::Logical(LogicalOp::Limit { offset: 0, count: 5 }),
            vec![get],
        );
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();
        let ctx = OptContext::new(&memo, &catalog, &guard);

        let get_props = memo.group(get).relational_props();
        get_props.derive(&ctx, get).unwrap();
        assert!(get_props.is_complete());
        let derived = get_props.derivation_count();

        let props = memo.group(limit).relational_props();
        assert_eq!(props.max_cardinality(&ctx, limit).unwrap(), Some(5));
        assert_eq!(props.output_columns(&ctx, limit), &ColumnSet::from([1, 2]));
        let partial = props.derivation_count();
        assert!(!props.is_complete());

        props.derive(&ctx, limit).unwrap();
        assert!(props.is_complete());
        let full = props.derivation_count();
        assert!(full > partial);

        // Repeated reads and derives hit the cached cells.
        assert_eq!(props.max_cardinality(&ctx, limit).unwrap(), Some(5));
        assert_eq!(props.join_depth(&ctx, limit), 1);
        props.derive(&ctx, limit).unwrap();
        assert_eq!(props.derivation_count(), full);
        assert_eq!(get_props.derivation_count(), derived);
    }
}
