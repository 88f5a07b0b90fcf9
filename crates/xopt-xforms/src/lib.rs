//! # Built-in Xforms
//!
//! The default xform catalog for the xopt search driver.
//!
//! ## Exploration (Logical -> Logical)
//!
//! - **`JoinCommutativity`**: `A ⋈ B -> B ⋈ A` for inner and cross joins.
//! - **`JoinAssociativity`**: `(A ⋈ B) ⋈ C -> A ⋈ (B ⋈ C)` and `B ⋈ (A ⋈ C)`,
//!   redistributing conjuncts to the lowest join that can evaluate them.
//! - **`ExpandNAryJoinGreedy`**: turns an n-ary join into one binary join tree
//!   using greedy join ordering.
//! - **`PushSelectIntoJoin`**: merges a `Select` predicate over an inner join into
//!   the join predicate.
//!
//! ## Implementation (Logical -> Physical)
//!
//! - **`Get2TableScan`**, **`Select2Filter`**, **`Project2ComputeScalar`**,
//!   **`Limit2Limit`**: one physical operator per logical one.
//! - **`Join2HashJoin`**: needs an equality conjunct across the inputs and no
//!   subquery in the predicate.
//! - **`Join2NLJoin`**: any join.
//! - **`GbAgg2HashAgg`**: any aggregate.

pub mod expand_nary_join;
pub mod impl_agg;
pub mod impl_join;
pub mod impl_scan;
pub mod impl_unary;
pub mod join_associativity;
pub mod join_commutativity;
pub mod predicate_pushdown;

use xopt_core::context::OptContext;
use xopt_core::expr::{ColumnSet, Expression, JoinType, LogicalOp, Operator, ScalarOp, ScalarValue};
use xopt_core::memo::GroupId;
use xopt_core::xform::{AltExpr, XformRegistry};

/// Registry holding every built-in xform.
pub fn default_xform_registry() -> XformRegistry {
    let mut registry = XformRegistry::new();

    registry.add(Box::new(join_commutativity::JoinCommutativity::new()));
    registry.add(Box::new(join_associativity::JoinAssociativity::new()));
    registry.add(Box::new(expand_nary_join::ExpandNAryJoinGreedy::new()));
    registry.add(Box::new(predicate_pushdown::PushSelectIntoJoin::new()));

    registry.add(Box::new(impl_scan::Get2TableScan::new()));
    registry.add(Box::new(impl_unary::Select2Filter::new()));
    registry.add(Box::new(impl_unary::Project2ComputeScalar::new()));
    registry.add(Box::new(impl_unary::Limit2Limit::new()));
    registry.add(Box::new(impl_join::Join2HashJoin::new()));
    registry.add(Box::new(impl_join::Join2NLJoin::new()));
    registry.add(Box::new(impl_agg::GbAgg2HashAgg::new()));

    registry
}

/// `AND` of the given conjunct groups. No conjuncts is `TRUE`.
pub(crate) fn conjunction(conjuncts: &[GroupId]) -> AltExpr {
    match conjuncts {
        [] => AltExpr::node(Operator::constant(ScalarValue::Bool(true)), vec![]),
        [single] => AltExpr::Group(*single),
        many => AltExpr::over_groups(Operator::Scalar(ScalarOp::And), many),
    }
}

/// Columns referenced by the predicate in scalar group `group`.
pub(crate) fn used_columns<'a>(ctx: &OptContext<'a>, group: GroupId) -> &'a ColumnSet {
    let first = ctx.memo.group(group).exprs()[0];
    ctx.derived_scalar(group).used_columns(ctx, first)
}

/// Columns produced by relational group `group`.
pub(crate) fn output_columns<'a>(ctx: &OptContext<'a>, group: GroupId) -> &'a ColumnSet {
    ctx.derived_relational(group).output_columns(ctx, group)
}

/// Join type of a bound join, `None` for anything else.
pub(crate) fn join_type(expr: &Expression) -> Option<JoinType> {
    match &*expr.op {
        Operator::Logical(LogicalOp::Join { join_type }) => Some(*join_type),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use xopt_core::catalog::Catalog;
    use xopt_core::context::OptContext;
    use xopt_core::expr::{BinaryOp, ColId, ColumnRef, Operator, ScalarValue, TableRef};
    use xopt_core::guard::ExecGuard;
    use xopt_core::memo::{GroupId, Memo};

    pub fn column(table: &str, id: ColId) -> ColumnRef {
        ColumnRef::new(id, Some(table), "id")
    }

    /// `Get` of table `s.<name>` with a single column `<name>.id#<col>`.
    pub fn get(memo: &mut Memo, name: &str, col: ColId) -> GroupId {
        memo.insert(
            Operator::get(TableRef::new("s", name), vec![column(name, col)]),
            vec![],
        )
        .0
    }

    pub fn ident(memo: &mut Memo, (table, col): (&str, ColId)) -> GroupId {
        memo.insert(Operator::ident(column(table, col)), vec![]).0
    }

    pub fn eq(memo: &mut Memo, left: (&str, ColId), right: (&str, ColId)) -> GroupId {
        let l = ident(memo, left);
        let r = ident(memo, right);
        memo.insert(Operator::binary(BinaryOp::Eq), vec![l, r]).0
    }

    pub fn lt_const(memo: &mut Memo, left: (&str, ColId), value: i64) -> GroupId {
        let l = ident(memo, left);
        let (r, _) = memo.insert(Operator::constant(ScalarValue::Int64(value)), vec![]);
        memo.insert(Operator::binary(BinaryOp::Lt), vec![l, r]).0
    }

    /// Derive scalar and relational properties for every group, children first.
    pub fn derive_all(memo: &Memo, catalog: &dyn Catalog, guard: &ExecGuard) {
        let ctx = OptContext::new(memo, catalog, guard);
        for group in memo.groups() {
            if group.is_scalar() {
                let first = group.exprs()[0];
                memo.expr(first).scalar_props().derive(&ctx, first).unwrap();
            } else if group.logical_exprs(memo).next().is_some() {
                group.relational_props().derive(&ctx, group.id).unwrap();
            }
        }
    }
}
