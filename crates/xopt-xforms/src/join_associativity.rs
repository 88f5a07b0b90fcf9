//! # Join Associativity
//!
//! For inner joins: `(A ⋈₁ B) ⋈₂ C = A ⋈₁ (B ⋈₂ C)`.
//!
//! Associativity changes the shape of the join tree (left-deep, right-deep,
//! bushy). Together with commutativity it reaches every join order of a
//! predicate-connected graph.
//!
//! ## Predicate Handling
//!
//! Conjuncts of the outer predicate that reference only the moved input and `C`,
//! and touch both, go to the new inner join. Everything else, including the whole
//! original inner predicate, stays on the new outer join, where all three inputs
//! are visible. The xform only fires if the new inner join gets at least one
//! conjunct; otherwise it would introduce a cross join.
//!
//! ## Both Orientations
//!
//! - `(A ⋈ B) ⋈ C -> A ⋈ (B ⋈ C)` when the outer predicate connects B and C
//! - `(A ⋈ B) ⋈ C -> B ⋈ (A ⋈ C)` when it connects A and C
//!
//! Trying both avoids depending on commutativity having fired on the inner join.
//!
//! Outer joins are not reassociated.

use crate::{conjunction, join_type, output_columns, used_columns};
use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{ColumnSet, Expression, JoinType, LogicalOp, LogicalOpKind, Operator};
use xopt_core::memo::{ExprId, GroupId};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Promise, Xform, XformKind};

/// `(A ⋈ B) ⋈ C -> A ⋈ (B ⋈ C)` and `B ⋈ (A ⋈ C)`.
pub struct JoinAssociativity {
    pattern: Pattern,
}

impl JoinAssociativity {
    pub fn new() -> Self {
        Self {
            // Join(Join(A, B, p1), C, p2)
            pattern: Pattern::logical(
                LogicalOpKind::Join,
                vec![
                    Pattern::with_leaves(LogicalOpKind::Join, 3),
                    Pattern::Leaf,
                    Pattern::Leaf,
                ],
            ),
        }
    }
}

impl Default for JoinAssociativity {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for JoinAssociativity {
    fn name(&self) -> &'static str {
        "JoinAssociativity"
    }

    fn kind(&self) -> XformKind {
        XformKind::Exploration
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn promise(&self, ctx: &OptContext, expr: ExprId) -> Promise {
        match &*ctx.memo.expr(expr).op {
            Operator::Logical(LogicalOp::Join {
                join_type: JoinType::Inner,
            }) => Promise::High,
            _ => Promise::Skip,
        }
    }

    fn transform(&self, ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let inner = &expr.children[0];
        if join_type(expr) != Some(JoinType::Inner) || join_type(inner) != Some(JoinType::Inner) {
            return Ok(vec![]);
        }
        let (a, b, c) = (inner.child_group(0), inner.child_group(1), expr.child_group(1));
        let (a_cols, b_cols, c_cols) = (
            output_columns(ctx, a),
            output_columns(ctx, b),
            output_columns(ctx, c),
        );

        let outer_conjuncts: Vec<(GroupId, &ColumnSet)> = ctx
            .memo
            .conjuncts(expr.child_group(2))
            .into_iter()
            .map(|g| (g, used_columns(ctx, g)))
            .collect();
        let inner_conjuncts = ctx.memo.conjuncts(inner.child_group(2));

        let mut out = Vec::new();
        out.extend(try_reassociate(&outer_conjuncts, &inner_conjuncts, a, b, c, b_cols, c_cols));
        out.extend(try_reassociate(&outer_conjuncts, &inner_conjuncts, b, a, c, a_cols, c_cols));
        Ok(out)
    }
}

/// `(stay ⋈ moved) ⋈ c -> stay ⋈ (moved ⋈ c)`, or `None` if no outer conjunct
/// connects `moved` with `c`.
fn try_reassociate(
    outer_conjuncts: &[(GroupId, &ColumnSet)],
    inner_conjuncts: &[GroupId],
    stay: GroupId,
    moved: GroupId,
    c: GroupId,
    moved_cols: &ColumnSet,
    c_cols: &ColumnSet,
) -> Option<AltExpr> {
    let mut pushed = Vec::new();
    let mut kept: Vec<GroupId> = inner_conjuncts.to_vec();
    for &(conjunct, cols) in outer_conjuncts {
        let within = cols.iter().all(|col| moved_cols.contains(col) || c_cols.contains(col));
        let touches_moved = cols.iter().any(|col| moved_cols.contains(col));
        let touches_c = cols.iter().any(|col| c_cols.contains(col));
        if within && touches_moved && touches_c {
            pushed.push(conjunct);
        } else {
            kept.push(conjunct);
        }
    }
    if pushed.is_empty() {
        return None;
    }

    Some(AltExpr::node(
        Operator::join(JoinType::Inner),
        vec![
            AltExpr::Group(stay),
            AltExpr::node(
                Operator::join(JoinType::Inner),
                vec![AltExpr::Group(moved), AltExpr::Group(c), conjunction(&pushed)],
            ),
            conjunction(&kept),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(ids: &[u32]) -> ColumnSet {
        ids.iter().copied().collect()
    }

    // Groups: A = 0, B = 1, C = 2; conjunct groups from 10 up.

    #[test]
    fn test_reassociate_moves_connecting_conjunct() {
        // (A ⋈_{a1=b2} B) ⋈_{b3=c4} C  ->  A ⋈_{a1=b2} (B ⋈_{b3=c4} C)
        let bc = cols(&[3, 4]);
        let alt = try_reassociate(&[(11, &bc)], &[10], 0, 1, 2, &cols(&[2, 3]), &cols(&[4]))
            .expect("reassociation");
        assert_eq!(
            alt,
            AltExpr::node(
                Operator::join(JoinType::Inner),
                vec![
                    AltExpr::Group(0),
                    AltExpr::over_groups(Operator::join(JoinType::Inner), &[1, 2, 11]),
                    AltExpr::Group(10),
                ],
            )
        );
    }

    #[test]
    fn test_no_connecting_conjunct_means_no_cross_join() {
        // (A ⋈_{a1=b2} B) ⋈_{a5=c4} C with B moved: nothing connects B and C.
        let ac = cols(&[5, 4]);
        assert!(try_reassociate(&[(11, &ac)], &[10], 0, 1, 2, &cols(&[2]), &cols(&[4])).is_none());
        // The flipped orientation moves A, which the outer conjunct does connect.
        assert!(try_reassociate(&[(11, &ac)], &[10], 1, 0, 2, &cols(&[1, 5]), &cols(&[4])).is_some());
    }

    #[test]
    fn test_conjunct_referencing_stay_side_is_kept() {
        // Outer predicate b3=c4 AND a1=c4: only the first moves down.
        let bc = cols(&[3, 4]);
        let ac = cols(&[1, 4]);
        let alt = try_reassociate(
            &[(11, &bc), (12, &ac)],
            &[10],
            0,
            1,
            2,
            &cols(&[3]),
            &cols(&[4]),
        )
        .expect("reassociation");
        let AltExpr::Node(_, children) = alt else {
            panic!("expected a join node");
        };
        assert_eq!(
            children[2],
            AltExpr::over_groups(
                Operator::Scalar(xopt_core::expr::ScalarOp::And),
                &[10, 12]
            )
        );
    }
}
