//! # Select Pushdown into Joins
//!
//! A `Select` over an inner join is the same as the join with the select predicate
//! ANDed into the join predicate:
//!
//! ```text
//! Before: Select(Join(A, B, p), q)
//! After:  Join(A, B, p AND q)
//! ```
//!
//! The merged join lands in the select's group next to the original, so both
//! shapes stay available to the later phases. Having every conjunct on the join lets
//! associativity push each one down to the lowest join that covers its columns.
//!
//! Outer, semi and anti joins are left alone: filtering after them is not the same
//! as filtering inside them.

use crate::{conjunction, join_type};
use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, JoinType, LogicalOp, LogicalOpKind, Operator};
use xopt_core::memo::{ExprId, GroupId};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Promise, Xform, XformKind};

/// `Select(Join(A, B, p), q) -> Join(A, B, p AND q)`.
pub struct PushSelectIntoJoin {
    pattern: Pattern,
}

impl PushSelectIntoJoin {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::logical(
                LogicalOpKind::Select,
                vec![Pattern::with_leaves(LogicalOpKind::Join, 3), Pattern::Leaf],
            ),
        }
    }
}

impl Default for PushSelectIntoJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for PushSelectIntoJoin {
    fn name(&self) -> &'static str {
        "PushSelectIntoJoin"
    }

    fn kind(&self) -> XformKind {
        XformKind::Exploration
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn promise(&self, _ctx: &OptContext, _expr: ExprId) -> Promise {
        Promise::High
    }

    fn transform(&self, ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        if !matches!(&*expr.op, Operator::Logical(LogicalOp::Select)) {
            return Ok(vec![]);
        }
        let join = &expr.children[0];
        if !matches!(join_type(join), Some(JoinType::Inner | JoinType::Cross)) {
            return Ok(vec![]);
        }

        let conjuncts: Vec<GroupId> = ctx
            .memo
            .conjuncts(join.child_group(2))
            .into_iter()
            .chain(ctx.memo.conjuncts(expr.child_group(1)))
            .collect();

        Ok(vec![AltExpr::node(
            Operator::join(JoinType::Inner),
            vec![
                AltExpr::Group(join.child_group(0)),
                AltExpr::Group(join.child_group(1)),
                conjunction(&conjuncts),
            ],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use xopt_core::catalog::InMemoryCatalog;
    use xopt_core::expr::ScalarOp;
    use xopt_core::guard::ExecGuard;
    use xopt_core::memo::Memo;
    use xopt_core::xform::apply_xform;

    fn select_over_join(join_type: JoinType) -> (Memo, GroupId, ExprId, GroupId, GroupId) {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        let b = get(&mut memo, "b", 2);
        let on = eq(&mut memo, ("a", 1), ("b", 2));
        let (j, _) = memo.insert(Operator::join(join_type), vec![a, b, on]);
        let filter = lt_const(&mut memo, ("a", 1), 10);
        let (s, select) = memo.insert(Operator::Logical(LogicalOp::Select), vec![j, filter]);
        (memo, s, select, on, filter)
    }

    #[test]
    fn test_merges_select_predicate_into_inner_join() {
        let (mut memo, s, select, on, filter) = select_over_join(JoinType::Inner);
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();

        let added = apply_xform(&mut memo, &catalog, &guard, &PushSelectIntoJoin::new(), select)
            .unwrap();
        assert_eq!(added, 2);

        let merged = memo.group(s).exprs()[1];
        assert!(matches!(
            &*memo.expr(merged).op,
            Operator::Logical(LogicalOp::Join {
                join_type: JoinType::Inner
            })
        ));
        let pred = memo.expr(merged).children[2];
        assert_eq!(memo.scalar_op(pred), Some(&ScalarOp::And));
        assert_eq!(memo.conjuncts(pred), vec![on, filter]);
    }

    #[test]
    fn test_left_join_is_not_merged() {
        let (mut memo, s, select, _, _) = select_over_join(JoinType::Left);
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();

        let added = apply_xform(&mut memo, &catalog, &guard, &PushSelectIntoJoin::new(), select)
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(memo.group(s).len(), 1);
    }
}
