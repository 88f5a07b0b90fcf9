//! # Join Implementations
//!
//! ## Hash Join (`Join2HashJoin`)
//!
//! Builds a hash table on the right input and probes it with the left. Only
//! applicable when the predicate has at least one `l = r` conjunct with `l` from
//! one input and `r` from the other. A predicate containing a subquery is left to
//! the nested-loop join, which can re-evaluate it per row pair.
//!
//! **Cost**: O(build_rows) memory + O(build_rows + probe_rows) CPU.
//!
//! ## Nested Loop Join (`Join2NLJoin`)
//!
//! The universal fallback: for each left row, scans all right rows. Always
//! applicable (any predicate, cross joins), but O(n * m) makes it lose against a
//! hash join whenever one is available.

use crate::{join_type, output_columns};
use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, LogicalOpKind, Operator, PhysicalOp};
use xopt_core::memo::{ExprId, GroupId};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Promise, Xform, XformKind};

/// `Join(A, B, p) -> HashJoin(A, B, p)` when `p` has an equi conjunct across A and B.
pub struct Join2HashJoin {
    pattern: Pattern,
}

impl Join2HashJoin {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Join, 3),
        }
    }
}

impl Default for Join2HashJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for Join2HashJoin {
    fn name(&self) -> &'static str {
        "Join2HashJoin"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn priority(&self) -> u32 {
        10
    }

    fn promise(&self, ctx: &OptContext, expr: ExprId) -> Promise {
        let children = &ctx.memo.expr(expr).children;
        let (left, right, predicate) = (children[0], children[1], children[2]);
        let first = ctx.memo.group(predicate).exprs()[0];
        if ctx.derived_scalar(predicate).has_subquery(ctx, first) {
            return Promise::Skip;
        }
        if has_equi_conjunct(ctx, left, right, predicate) {
            Promise::High
        } else {
            Promise::Skip
        }
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let Some(join_type) = join_type(expr) else {
            return Ok(vec![]);
        };
        Ok(vec![AltExpr::over_groups(
            Operator::Physical(PhysicalOp::HashJoin { join_type }),
            &[expr.child_group(0), expr.child_group(1), expr.child_group(2)],
        )])
    }
}

/// `Join(A, B, p) -> NLJoin(A, B, p)`.
pub struct Join2NLJoin {
    pattern: Pattern,
}

impl Join2NLJoin {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Join, 3),
        }
    }
}

impl Default for Join2NLJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for Join2NLJoin {
    fn name(&self) -> &'static str {
        "Join2NLJoin"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let Some(join_type) = join_type(expr) else {
            return Ok(vec![]);
        };
        Ok(vec![AltExpr::over_groups(
            Operator::Physical(PhysicalOp::NLJoin { join_type }),
            &[expr.child_group(0), expr.child_group(1), expr.child_group(2)],
        )])
    }
}

/// Whether some conjunct of `predicate` equates a column of `left` with one of `right`.
fn has_equi_conjunct(ctx: &OptContext, left: GroupId, right: GroupId, predicate: GroupId) -> bool {
    let (l, r) = (output_columns(ctx, left), output_columns(ctx, right));
    ctx.memo
        .conjuncts(predicate)
        .into_iter()
        .filter_map(|c| ctx.memo.equi_join_columns(c))
        .any(|(a, b)| (l.contains(&a) && r.contains(&b)) || (l.contains(&b) && r.contains(&a)))
}
