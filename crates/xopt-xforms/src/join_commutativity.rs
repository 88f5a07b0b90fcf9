//! # Join Commutativity
//!
//! `A ⋈ B = B ⋈ A` for symmetric join types (inner and cross).
//!
//! In the memo the swapped join is a second member of the same group, sharing the
//! predicate group with the original. Swapping it back dedups into the original
//! expression, so the xform cannot loop.
//!
//! Left, right, semi and anti joins have fixed sides and are skipped by the promise.

use crate::join_type;
use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, JoinType, LogicalOp, LogicalOpKind, Operator};
use xopt_core::memo::ExprId;
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Promise, Xform, XformKind};

/// `A ⋈ B -> B ⋈ A`.
pub struct JoinCommutativity {
    pattern: Pattern,
}

impl JoinCommutativity {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Join, 3),
        }
    }
}

impl Default for JoinCommutativity {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for JoinCommutativity {
    fn name(&self) -> &'static str {
        "JoinCommutativity"
    }

    fn kind(&self) -> XformKind {
        XformKind::Exploration
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn priority(&self) -> u32 {
        10
    }

    fn promise(&self, ctx: &OptContext, expr: ExprId) -> Promise {
        match &*ctx.memo.expr(expr).op {
            Operator::Logical(LogicalOp::Join { join_type }) if join_type.is_inner() => {
                Promise::High
            }
            _ => Promise::Skip,
        }
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let Some(jt @ (JoinType::Inner | JoinType::Cross)) = join_type(expr) else {
            return Ok(vec![]);
        };
        Ok(vec![AltExpr::over_groups(
            Operator::join(jt),
            &[expr.child_group(1), expr.child_group(0), expr.child_group(2)],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xopt_core::catalog::InMemoryCatalog;
    use xopt_core::expr::{ColumnRef, ScalarValue, TableRef};
    use xopt_core::guard::ExecGuard;
    use xopt_core::memo::Memo;
    use xopt_core::xform::apply_xform;

    fn two_table_join(join_type: JoinType) -> (Memo, ExprId) {
        let mut memo = Memo::new();
        let (a, _) = memo.insert(
            Operator::get(TableRef::new("s", "a"), vec![ColumnRef::new(1, Some("a"), "x")]),
            vec![],
        );
        let (b, _) = memo.insert(
            Operator::get(TableRef::new("s", "b"), vec![ColumnRef::new(2, Some("b"), "y")]),
            vec![],
        );
        let (t, _) = memo.insert(Operator::constant(ScalarValue::Bool(true)), vec![]);
        let (_, join) = memo.insert(Operator::join(join_type), vec![a, b, t]);
        (memo, join)
    }

    #[test]
    fn test_swaps_inner_join_and_is_idempotent() {
        let (mut memo, join) = two_table_join(JoinType::Inner);
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();
        let xform = JoinCommutativity::new();

        assert_eq!(apply_xform(&mut memo, &catalog, &guard, &xform, join).unwrap(), 1);
        let group = memo.expr(join).group;
        let swapped = memo.group(group).exprs()[1];
        let original = memo.expr(join).children.clone();
        assert_eq!(
            memo.expr(swapped).children,
            vec![original[1], original[0], original[2]]
        );

        assert_eq!(apply_xform(&mut memo, &catalog, &guard, &xform, swapped).unwrap(), 0);
        assert_eq!(memo.group(group).len(), 2);
    }

    #[test]
    fn test_outer_join_is_skipped() {
        let (memo, join) = two_table_join(JoinType::Left);
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();
        let ctx = OptContext::new(&memo, &catalog, &guard);
        assert_eq!(JoinCommutativity::new().promise(&ctx, join), Promise::Skip);
    }
}
