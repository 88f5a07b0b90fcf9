//! # Greedy Join Ordering
//!
//! Builds one join tree out of a flat set of join components and the predicates
//! connecting them:
//!
//! 1. Seed with the pair of components whose join has the lowest estimated
//!    cardinality. Only predicate-connected pairs are considered unless there are
//!    none. Ties go to the lowest component indices.
//! 2. Repeatedly join in the remaining component that gives the smallest result,
//!    considering only components adjacent to the current result (sharing a
//!    predicate with it).
//! 3. If no remaining component is adjacent, allow a cross join instead of
//!    stalling. Cross joins are therefore delayed as long as possible.
//! 4. Stop once every component is part of the result.
//!
//! Cardinalities come from [`crate::stats`]: equi predicates use the NDV formula
//! and any other predicate that becomes applicable at a join applies the default
//! filter selectivity.

use crate::context::OptContext;
use crate::error::{OptError, Result};
use crate::expr::{ColId, ColumnSet};
use crate::guard::ExecGuard;
use crate::memo::GroupId;
use crate::stats::{self, Statistics, DEFAULT_FILTER_SELECTIVITY};
use std::fmt;
use tracing::trace;

/// One input of the join.
#[derive(Debug, Clone)]
pub struct JoinComponent {
    /// Group the component comes from, when built from a memo.
    pub group: Option<GroupId>,
    pub stats: Statistics,
    /// Columns the component produces.
    pub columns: ColumnSet,
}

/// One conjunct of the join predicate.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    /// Scalar group holding the conjunct, when built from a memo.
    pub group: Option<GroupId>,
    pub columns: ColumnSet,
    /// `a = b` over two columns.
    pub equi: Option<(ColId, ColId)>,
}

/// Flat join graph handed to the enumerator.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    pub components: Vec<JoinComponent>,
    pub predicates: Vec<JoinPredicate>,
}

impl JoinGraph {
    /// Join graph of an n-ary join: one component per relational input and one
    /// predicate per conjunct of `predicate`. Inputs must have derived properties.
    pub fn from_nary_join(ctx: &OptContext, inputs: &[GroupId], predicate: GroupId) -> Self {
        let components = inputs
            .iter()
            .map(|&g| JoinComponent {
                group: Some(g),
                stats: stats::group_stats(ctx.memo, ctx.catalog, g).clone(),
                columns: ctx.derived_relational(g).output_columns(ctx, g).clone(),
            })
            .collect();
        let predicates = ctx
            .memo
            .conjuncts(predicate)
            .into_iter()
            .map(|c| {
                let first = ctx.memo.group(c).exprs()[0];
                JoinPredicate {
                    group: Some(c),
                    columns: ctx.derived_scalar(c).used_columns(ctx, first).clone(),
                    equi: ctx.memo.equi_join_columns(c),
                }
            })
            .collect();
        Self {
            components,
            predicates,
        }
    }
}

/// A join tree over component indices.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTree {
    Leaf(usize),
    Join {
        left: Box<JoinTree>,
        right: Box<JoinTree>,
        /// Indices of the predicates applied at this join. Empty for a cross join.
        predicates: Vec<usize>,
        cardinality: f64,
    },
}

impl JoinTree {
    /// Component indices left to right.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                JoinTree::Leaf(i) => out.push(*i),
                JoinTree::Join { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        out
    }

    pub fn is_cross_join(&self) -> bool {
        matches!(self, JoinTree::Join { predicates, .. } if predicates.is_empty())
    }
}

impl fmt::Display for JoinTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinTree::Leaf(i) => write!(f, "{}", i),
            JoinTree::Join { left, right, .. } => write!(f, "({} ⋈ {})", left, right),
        }
    }
}

struct Partial {
    tree: JoinTree,
    stats: Statistics,
    columns: ColumnSet,
}

/// The greedy enumerator.
pub struct GreedyJoinOrder<'a> {
    graph: &'a JoinGraph,
    guard: &'a ExecGuard,
}

impl<'a> GreedyJoinOrder<'a> {
    pub fn new(graph: &'a JoinGraph, guard: &'a ExecGuard) -> Self {
        Self { graph, guard }
    }

    pub fn enumerate(&self) -> Result<JoinTree> {
        let n = self.graph.components.len();
        if n == 0 {
            return Err(OptError::InvalidJoinGraph("no join components".into()));
        }
        if n == 1 {
            return Ok(JoinTree::Leaf(0));
        }

        let mut current = self.seed()?;
        let mut remaining: Vec<usize> = (0..n)
            .filter(|i| !current.tree.leaves().contains(i))
            .collect();

        while !remaining.is_empty() {
            self.guard.check(0)?;
            let candidates: Vec<(usize, Partial)> = remaining
                .iter()
                .enumerate()
                .map(|(slot, &i)| (slot, self.join(&current, &self.leaf(i))))
                .collect();
            let adjacent = candidates.iter().any(|(_, p)| !p.tree.is_cross_join());
            let mut best: Option<(usize, Partial)> = None;
            for (slot, candidate) in candidates {
                if adjacent && candidate.tree.is_cross_join() {
                    continue;
                }
                match &best {
                    Some((_, b)) if b.stats.row_count <= candidate.stats.row_count => {}
                    _ => best = Some((slot, candidate)),
                }
            }
            let Some((slot, next)) = best else {
                unreachable!("no join candidate among {} remaining components", remaining.len());
            };
            trace!(
                "greedy join order: add component {} -> {:.1} rows{}",
                remaining[slot],
                next.stats.row_count,
                if adjacent { "" } else { " (cross join)" }
            );
            remaining.remove(slot);
            current = next;
        }
        Ok(current.tree)
    }

    /// Cheapest pair, preferring predicate-connected ones.
    fn seed(&self) -> Result<Partial> {
        let n = self.graph.components.len();
        let mut connected: Option<Partial> = None;
        let mut any: Option<Partial> = None;
        for i in 0..n {
            self.guard.check(0)?;
            for j in i + 1..n {
                let pair = self.join(&self.leaf(i), &self.leaf(j));
                let slot = if pair.tree.is_cross_join() {
                    &mut any
                } else {
                    &mut connected
                };
                if slot
                    .as_ref()
                    .map_or(true, |best| pair.stats.row_count < best.stats.row_count)
                {
                    *slot = Some(pair);
                }
            }
        }
        match connected.or(any) {
            Some(seed) => {
                trace!("greedy join order: seed {} -> {:.1} rows", seed.tree, seed.stats.row_count);
                Ok(seed)
            }
            None => unreachable!("at least two components yield a seed pair"),
        }
    }

    fn leaf(&self, i: usize) -> Partial {
        let component = &self.graph.components[i];
        Partial {
            tree: JoinTree::Leaf(i),
            stats: component.stats.clone(),
            columns: component.columns.clone(),
        }
    }

    /// Join two partial results, applying every predicate that first becomes
    /// evaluable here.
    fn join(&self, left: &Partial, right: &Partial) -> Partial {
        let columns: ColumnSet = left.columns.union(&right.columns).copied().collect();
        let applicable: Vec<usize> = self
            .graph
            .predicates
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.columns.is_subset(&columns)
                    && !p.columns.is_subset(&left.columns)
                    && !p.columns.is_subset(&right.columns)
            })
            .map(|(i, _)| i)
            .collect();

        let mut pairs = Vec::new();
        let mut residual = 0;
        for &i in &applicable {
            match self.graph.predicates[i].equi {
                Some((a, b)) if left.columns.contains(&a) && right.columns.contains(&b) => {
                    pairs.push((a, b))
                }
                Some((a, b)) if left.columns.contains(&b) && right.columns.contains(&a) => {
                    pairs.push((b, a))
                }
                _ => residual += 1,
            }
        }
        let mut joined = stats::derive_join_stats(&left.stats, &right.stats, &pairs);
        if residual > 0 {
            joined = stats::derive_filter_stats(&joined, DEFAULT_FILTER_SELECTIVITY.powi(residual));
        }

        Partial {
            tree: JoinTree::Join {
                left: Box::new(left.tree.clone()),
                right: Box::new(right.tree.clone()),
                predicates: applicable,
                cardinality: joined.row_count,
            },
            stats: joined,
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ColumnStatistics;

    fn component(rows: f64, cols: &[(ColId, f64)]) -> JoinComponent {
        JoinComponent {
            group: None,
            stats: cols.iter().fold(Statistics::new(rows, rows * 10.0), |s, &(c, ndv)| {
                s.with_column(c, ColumnStatistics::new(ndv, 0.0))
            }),
            columns: cols.iter().map(|&(c, _)| c).collect(),
        }
    }

    fn eq(a: ColId, b: ColId) -> JoinPredicate {
        JoinPredicate {
            group: None,
            columns: [a, b].into_iter().collect(),
            equi: Some((a, b)),
        }
    }

    #[test]
    fn test_chain_seeds_with_cheapest_connected_pair() {
        // big(1) = small(2), small(3) = mid(4)
        let graph = JoinGraph {
            components: vec![
                component(100_000.0, &[(1, 100_000.0)]),
                component(10.0, &[(2, 10.0), (3, 10.0)]),
                component(100.0, &[(4, 100.0)]),
            ],
            predicates: vec![eq(1, 2), eq(3, 4)],
        };
        let guard = ExecGuard::default();
        let tree = GreedyJoinOrder::new(&graph, &guard).enumerate().unwrap();
        // big ⋈ small and small ⋈ mid both give 10 rows; the tie goes to (0, 1).
        assert_eq!(tree.leaves(), vec![0, 1, 2]);
        assert!(!tree.is_cross_join());
    }

    #[test]
    fn test_prefers_smaller_result() {
        let graph = JoinGraph {
            components: vec![
                component(1000.0, &[(1, 10.0)]),
                component(1000.0, &[(2, 10.0)]),
                component(1000.0, &[(3, 1000.0)]),
            ],
            predicates: vec![eq(1, 2), eq(1, 3)],
        };
        let guard = ExecGuard::default();
        let tree = GreedyJoinOrder::new(&graph, &guard).enumerate().unwrap();
        // 0 ⋈ 2 gives 1000 rows, 0 ⋈ 1 gives 100 000.
        assert_eq!(tree.leaves(), vec![0, 2, 1]);
    }

    #[test]
    fn test_cross_join_is_delayed() {
        let graph = JoinGraph {
            components: vec![
                component(100.0, &[(1, 100.0)]),
                component(2.0, &[(2, 2.0)]),
                component(100.0, &[(3, 100.0)]),
            ],
            predicates: vec![eq(1, 3)],
        };
        let guard = ExecGuard::default();
        let tree = GreedyJoinOrder::new(&graph, &guard).enumerate().unwrap();
        assert_eq!(tree.leaves(), vec![0, 2, 1]);
        assert!(tree.is_cross_join());
        match &tree {
            JoinTree::Join { left, .. } => assert!(!left.is_cross_join()),
            JoinTree::Leaf(_) => panic!("expected a join"),
        }
    }

    #[test]
    fn test_degenerate_graphs() {
        let guard = ExecGuard::default();
        let empty = JoinGraph::default();
        assert!(matches!(
            GreedyJoinOrder::new(&empty, &guard).enumerate(),
            Err(OptError::InvalidJoinGraph(_))
        ));

        let single = JoinGraph {
            components: vec![component(5.0, &[(1, 5.0)])],
            predicates: vec![],
        };
        assert_eq!(
            GreedyJoinOrder::new(&single, &guard).enumerate().unwrap(),
            JoinTree::Leaf(0)
        );
    }

    #[test]
    fn test_cancelled() {
        let graph = JoinGraph {
            components: vec![component(1.0, &[(1, 1.0)]), component(1.0, &[(2, 1.0)])],
            predicates: vec![eq(1, 2)],
        };
        let guard = ExecGuard::default();
        guard.cancel_handle().cancel();
        assert_eq!(
            GreedyJoinOrder::new(&graph, &guard).enumerate(),
            Err(OptError::Cancelled)
        );
    }
}
