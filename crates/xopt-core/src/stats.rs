//! # Statistics and Cardinality Estimation
//!
//! Statistics drive the join-order enumerator and any cost model plugged into the
//! search driver. They are kept per relational group, derived lazily from the
//! group's first logical expression and cached in the group.
//!
//! ## Statistics Hierarchy
//!
//! - **Relation-level**: row count and total size in bytes.
//! - **Column-level** (keyed by column id): number of distinct values (NDV), null
//!   fraction and average value size. A column is present in `column_stats` iff
//!   the relation produces it.
//!
//! ## Derivation Formulas
//!
//! - **Filter**: output_rows = input_rows * selectivity. Column NDVs are scaled by
//!   the row reduction ratio.
//! - **Join**: output_rows = |left| * |right| / max(NDV_left_key, NDV_right_key) per
//!   equi-join pair (independence assumption across pairs).
//! - **Aggregate**: output_rows = product of group-by NDVs, capped by input rows.
//!
//! ## Selectivity Estimation
//!
//! - **Equality with a constant**: 1 / NDV.
//! - **Range comparison**: fixed 1/3.
//! - **Anything else**: 0.1.

use crate::catalog::Catalog;
use crate::expr::{BinaryOp, ColId, JoinType, LogicalOp, Operator, ScalarOp};
use crate::memo::{GroupId, Memo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row count assumed for tables the catalog has no statistics for.
pub const DEFAULT_ROW_COUNT: f64 = 1000.0;
/// Default filter selectivity when nothing better is known.
pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;
pub const RANGE_SELECTIVITY: f64 = 1.0 / 3.0;

/// Statistics for a relation (or a group in the memo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub total_size_bytes: f64,
    pub column_stats: HashMap<ColId, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, column: ColId, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(column, stats);
        self
    }

    pub fn has_column(&self, column: ColId) -> bool {
        self.column_stats.contains_key(&column)
    }

    /// NDV of `column`, or the row count when unknown (all values distinct).
    pub fn ndv(&self, column: ColId) -> f64 {
        self.column_stats
            .get(&column)
            .map(|s| s.distinct_count)
            .unwrap_or(self.row_count)
    }

    fn avg_row_size(&self) -> f64 {
        if self.row_count > 0.0 {
            self.total_size_bytes / self.row_count
        } else {
            100.0
        }
    }
}

/// Per-column statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values.
    pub distinct_count: f64,
    /// Fraction of rows that are NULL, in [0.0, 1.0].
    pub null_fraction: f64,
    /// Average size of a single value in bytes.
    pub avg_size: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
            avg_size: 8.0,
        }
    }
}

/// Derive statistics for an equi-join on `join_columns` (left id, right id).
///
/// Missing NDVs fall back to the side's row count. With no join columns the
/// result is the cross product.
pub fn derive_join_stats(
    left: &Statistics,
    right: &Statistics,
    join_columns: &[(ColId, ColId)],
) -> Statistics {
    let mut selectivity = 1.0_f64;
    for &(l, r) in join_columns {
        selectivity /= left.ndv(l).max(right.ndv(r)).max(1.0);
    }

    let row_count = (left.row_count * right.row_count * selectivity).max(1.0);
    let total_size_bytes = row_count * (left.avg_row_size() + right.avg_row_size());

    // NDV can't exceed the output row count.
    let column_stats = left
        .column_stats
        .iter()
        .chain(&right.column_stats)
        .map(|(&col, s)| {
            let mut cs = s.clone();
            cs.distinct_count = cs.distinct_count.min(row_count);
            (col, cs)
        })
        .collect();

    Statistics {
        row_count,
        total_size_bytes,
        column_stats,
    }
}

/// Derive statistics for a filter with the given selectivity.
pub fn derive_filter_stats(input: &Statistics, selectivity: f64) -> Statistics {
    let row_count = (input.row_count * selectivity).max(1.0);
    let ratio = if input.row_count > 0.0 {
        row_count / input.row_count
    } else {
        1.0
    };

    let column_stats = input
        .column_stats
        .iter()
        .map(|(&col, s)| {
            let mut cs = s.clone();
            cs.distinct_count = (cs.distinct_count * ratio).max(1.0).min(row_count);
            (col, cs)
        })
        .collect();

    Statistics {
        row_count,
        total_size_bytes: input.total_size_bytes * ratio,
        column_stats,
    }
}

/// Derive statistics for an aggregate grouped by `group_by`. A global aggregate
/// produces one row.
pub fn derive_aggregate_stats(input: &Statistics, group_by: &[ColId]) -> Statistics {
    let mut row_count = 1.0_f64;
    for &col in group_by {
        row_count *= input.ndv(col);
    }
    row_count = row_count.min(input.row_count).max(1.0);

    let column_stats = group_by
        .iter()
        .filter_map(|col| {
            input.column_stats.get(col).map(|s| {
                let mut cs = s.clone();
                cs.distinct_count = cs.distinct_count.min(row_count);
                (*col, cs)
            })
        })
        .collect();

    Statistics {
        row_count,
        total_size_bytes: row_count * 100.0,
        column_stats,
    }
}

/// Selectivity of `column = constant`: `1 / NDV`.
pub fn equality_selectivity(stats: &Statistics, column: ColId) -> f64 {
    stats
        .column_stats
        .get(&column)
        .map(|cs| 1.0 / cs.distinct_count.max(1.0))
        .unwrap_or(DEFAULT_FILTER_SELECTIVITY)
}

/// Selectivity of the predicate in scalar group `predicate` over `input`.
pub fn predicate_selectivity(memo: &Memo, input: &Statistics, predicate: GroupId) -> f64 {
    memo.conjuncts(predicate)
        .into_iter()
        .map(|conjunct| conjunct_selectivity(memo, input, conjunct))
        .product()
}

fn conjunct_selectivity(memo: &Memo, input: &Statistics, conjunct: GroupId) -> f64 {
    let Some(ScalarOp::Binary(op)) = memo.scalar_op(conjunct) else {
        return DEFAULT_FILTER_SELECTIVITY;
    };
    if !op.is_comparison() {
        return DEFAULT_FILTER_SELECTIVITY;
    }
    let children = &memo.expr(memo.group(conjunct).exprs()[0]).children;
    let (l, r) = (children[0], children[1]);
    let column = memo.as_column(l).or_else(|| memo.as_column(r));
    let constant = memo.as_constant(l).is_some() || memo.as_constant(r).is_some();
    match (column, *op == BinaryOp::Eq) {
        (Some(c), true) if constant => equality_selectivity(input, c.id),
        (Some(_), true) => match memo.equi_join_columns(conjunct) {
            Some((a, b)) => 1.0 / input.ndv(a).max(input.ndv(b)).max(1.0),
            None => DEFAULT_FILTER_SELECTIVITY,
        },
        (Some(_), false) => RANGE_SELECTIVITY,
        (None, _) => DEFAULT_FILTER_SELECTIVITY,
    }
}

/// Equi-join pairs among `conjuncts` oriented as (left column, right column).
pub fn equi_pairs(
    memo: &Memo,
    left: &Statistics,
    right: &Statistics,
    conjuncts: &[GroupId],
) -> Vec<(ColId, ColId)> {
    conjuncts
        .iter()
        .filter_map(|&c| memo.equi_join_columns(c))
        .filter_map(|(a, b)| {
            if left.has_column(a) && right.has_column(b) {
                Some((a, b))
            } else if left.has_column(b) && right.has_column(a) {
                Some((b, a))
            } else {
                None
            }
        })
        .collect()
}

/// Statistics of a relational group, derived on first use and cached.
pub fn group_stats<'m>(memo: &'m Memo, catalog: &dyn Catalog, group: GroupId) -> &'m Statistics {
    let slot = memo.group(group).stats_slot();
    if let Some(stats) = slot.get() {
        return stats;
    }
    let stats = derive_group_stats(memo, catalog, group);
    slot.get_or_init(|| stats)
}

fn derive_group_stats(memo: &Memo, catalog: &dyn Catalog, group: GroupId) -> Statistics {
    let g = memo.group(group);
    assert!(!g.is_scalar(), "statistics requested for scalar group {}", group);
    let Some(first) = g.logical_exprs(memo).next() else {
        panic!("relational group {} has no logical expression", group);
    };
    let gexpr = memo.expr(first);
    let child = |i: usize| group_stats(memo, catalog, gexpr.children[i]);

    let Operator::Logical(op) = &*gexpr.op else {
        unreachable!("logical_exprs yielded a non-logical expression");
    };
    match op {
        LogicalOp::Get { table, columns } => {
            let mut stats = catalog
                .get_table_stats(table)
                .unwrap_or_else(|| Statistics::new(DEFAULT_ROW_COUNT, DEFAULT_ROW_COUNT * 100.0));
            for c in columns {
                let rows = stats.row_count;
                stats
                    .column_stats
                    .entry(c.id)
                    .or_insert_with(|| ColumnStatistics::new(rows, 0.0));
            }
            stats
        }
        LogicalOp::Select => {
            let input = child(0);
            derive_filter_stats(input, predicate_selectivity(memo, input, gexpr.children[1]))
        }
        LogicalOp::Project => child(0).clone(),
        LogicalOp::Limit { count, .. } => {
            let input = child(0);
            let limit = *count as f64;
            if input.row_count > limit && input.row_count > 0.0 {
                derive_filter_stats(input, limit / input.row_count)
            } else {
                input.clone()
            }
        }
        LogicalOp::GbAgg { group_by } => {
            let keys: Vec<ColId> = group_by.iter().map(|c| c.id).collect();
            derive_aggregate_stats(child(0), &keys)
        }
        LogicalOp::Join { join_type } => {
            let (left, right) = (child(0), child(1));
            let conjuncts = memo.conjuncts(gexpr.children[2]);
            let joined = derive_join_stats(left, right, &equi_pairs(memo, left, right, &conjuncts));
            match join_type {
                JoinType::Semi | JoinType::Anti => {
                    let ratio = (joined.row_count / left.row_count.max(1.0)).min(1.0);
                    let sel = if *join_type == JoinType::Semi { ratio } else { 1.0 - ratio };
                    derive_filter_stats(left, sel.max(DEFAULT_FILTER_SELECTIVITY))
                }
                JoinType::Left if joined.row_count < left.row_count => Statistics {
                    row_count: left.row_count,
                    ..joined
                },
                JoinType::Right if joined.row_count < right.row_count => Statistics {
                    row_count: right.row_count,
                    ..joined
                },
                _ => joined,
            }
        }
        LogicalOp::NAryJoin => {
            let arity = gexpr.children.len();
            let conjuncts = memo.conjuncts(gexpr.children[arity - 1]);
            let mut acc = child(0).clone();
            for i in 1..arity - 1 {
                let next = child(i);
                acc = derive_join_stats(&acc, next, &equi_pairs(memo, &acc, next, &conjuncts));
            }
            acc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: f64, cols: &[(ColId, f64)]) -> Statistics {
        cols.iter().fold(Statistics::new(rows, rows * 10.0), |s, &(c, ndv)| {
            s.with_column(c, ColumnStatistics::new(ndv, 0.0))
        })
    }

    #[test]
    fn test_join_cardinality() {
        let orders = table(1_000_000.0, &[(1, 100_000.0)]);
        let customer = table(100_000.0, &[(2, 100_000.0)]);
        let joined = derive_join_stats(&orders, &customer, &[(1, 2)]);
        assert!((joined.row_count - 1_000_000.0).abs() < 1e-6);

        let cross = derive_join_stats(&orders, &customer, &[]);
        assert!((cross.row_count - 1e11).abs() < 1.0);
    }

    #[test]
    fn test_aggregate_is_capped_by_input() {
        let t = table(50.0, &[(1, 40.0), (2, 30.0)]);
        assert_eq!(derive_aggregate_stats(&t, &[1, 2]).row_count, 50.0);
        assert_eq!(derive_aggregate_stats(&t, &[]).row_count, 1.0);
    }

    #[test]
    fn test_filter_scales_ndv() {
        let t = table(1000.0, &[(1, 500.0)]);
        let f = derive_filter_stats(&t, 0.1);
        assert_eq!(f.row_count, 100.0);
        assert_eq!(f.column_stats[&1].distinct_count, 50.0);
    }
}
