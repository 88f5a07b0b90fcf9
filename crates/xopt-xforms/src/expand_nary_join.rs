//! # N-ary Join Expansion
//!
//! An `NAryJoin(inputs.., predicate)` inner-joins all of its inputs. This xform
//! hands the inputs and the conjuncts of the predicate to the greedy join-order
//! enumerator and turns the resulting tree into nested binary inner joins, each
//! carrying the conjuncts that first become evaluable at it. Conjuncts that no join
//! can place (constants, outer references) go on the topmost join.
//!
//! The expansion lands in the n-ary join's own group, so commutativity and
//! associativity can explore around the greedy order afterwards.

use crate::conjunction;
use std::collections::BTreeSet;
use tracing::trace;
use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, JoinType, LogicalOp, LogicalOpKind, Operator};
use xopt_core::join_order::{GreedyJoinOrder, JoinGraph, JoinTree};
use xopt_core::memo::{ExprId, GroupId};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Promise, Xform, XformKind};

/// `NAryJoin(A, B, C.., p) -> ((A ⋈ B) ⋈ C) ..` in greedy order.
pub struct ExpandNAryJoinGreedy {
    pattern: Pattern,
}

impl ExpandNAryJoinGreedy {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::logical(
                LogicalOpKind::NAryJoin,
                vec![Pattern::MultiLeaf, Pattern::Leaf],
            ),
        }
    }
}

impl Default for ExpandNAryJoinGreedy {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for ExpandNAryJoinGreedy {
    fn name(&self) -> &'static str {
        "ExpandNAryJoinGreedy"
    }

    fn kind(&self) -> XformKind {
        XformKind::Exploration
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn priority(&self) -> u32 {
        20
    }

    fn promise(&self, ctx: &OptContext, expr: ExprId) -> Promise {
        // Needs at least one input besides the predicate.
        if ctx.memo.expr(expr).arity() >= 2 {
            Promise::High
        } else {
            Promise::Skip
        }
    }

    fn transform(&self, ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let arity = expr.arity();
        if arity < 2 || !matches!(&*expr.op, Operator::Logical(LogicalOp::NAryJoin)) {
            return Ok(vec![]);
        }
        let inputs: Vec<GroupId> = (0..arity - 1).map(|i| expr.child_group(i)).collect();
        let predicate = expr.child_group(arity - 1);

        if inputs.len() == 1 {
            return Ok(vec![AltExpr::over_groups(
                Operator::Logical(LogicalOp::Select),
                &[inputs[0], predicate],
            )]);
        }

        let graph = JoinGraph::from_nary_join(ctx, &inputs, predicate);
        let tree = GreedyJoinOrder::new(&graph, ctx.guard).enumerate()?;
        trace!("expand n-ary join {}: greedy order {}", expr.expr_id, tree);

        let placed = placed_predicates(&tree);
        let leftover: Vec<GroupId> = graph
            .predicates
            .iter()
            .enumerate()
            .filter(|(i, _)| !placed.contains(i))
            .filter_map(|(_, p)| p.group)
            .collect();
        let alt = build(&tree, &graph, &inputs, &leftover);
        Ok(vec![alt])
    }
}

/// Predicate indices applied anywhere in `tree`.
fn placed_predicates(tree: &JoinTree) -> BTreeSet<usize> {
    let mut placed = BTreeSet::new();
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        if let JoinTree::Join {
            left,
            right,
            predicates,
            ..
        } = node
        {
            placed.extend(predicates.iter().copied());
            stack.push(left);
            stack.push(right);
        }
    }
    placed
}

/// Nested binary joins for `tree`; `extra` conjuncts go on its root.
fn build(tree: &JoinTree, graph: &JoinGraph, inputs: &[GroupId], extra: &[GroupId]) -> AltExpr {
    match tree {
        JoinTree::Leaf(i) => AltExpr::Group(inputs[*i]),
        JoinTree::Join {
            left,
            right,
            predicates,
            ..
        } => {
            let conjuncts: Vec<GroupId> = predicates
                .iter()
                .filter_map(|&i| graph.predicates[i].group)
                .chain(extra.iter().copied())
                .collect();
            AltExpr::node(
                Operator::join(JoinType::Inner),
                vec![
                    build(left, graph, inputs, &[]),
                    build(right, graph, inputs, &[]),
                    conjunction(&conjuncts),
                ],
            )
        }
    }
}
