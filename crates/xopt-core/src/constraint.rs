//! # Constraints
//!
//! A constraint summarizes the values columns may take after a predicate has been
//! applied. It is a tree of three kinds of node:
//!
//! - **Interval**: one column, a sorted list of disjoint value ranges, and whether
//!   NULL is allowed.
//! - **Conjunction**: every child holds.
//! - **Disjunction**: at least one child holds.
//!
//! Conjunctions and disjunctions index their children by the columns they mention
//! when they are built. Constraint trees are immutable and shared through `Arc`;
//! remapping columns builds a new tree.
//!
//! ## Soundness of Per-Column Views
//!
//! `constraint_on_column` may only ever *widen* the information. For a disjunction,
//! a disjunct that does not mention the column imposes nothing on it, so unless every
//! disjunct mentions the column the answer is "unbounded, NULL allowed".

use crate::context::OptContext;
use crate::error::Result;
use crate::expr::{BinaryOp, ColId, ColumnSet, Operator, ScalarOp, ScalarValue, UnaryOp};
use crate::memo::GroupId;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// A contiguous range of values. Either end may be open, closed or unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub lower: Bound<ScalarValue>,
    pub upper: Bound<ScalarValue>,
}

impl Range {
    pub fn new(lower: Bound<ScalarValue>, upper: Bound<ScalarValue>) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn point(value: ScalarValue) -> Self {
        Self::new(Bound::Included(value.clone()), Bound::Included(value))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!((&self.lower, &self.upper), (Bound::Unbounded, Bound::Unbounded))
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(l), Bound::Included(u)) => cmp_values(l, u) == Ordering::Greater,
            (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => {
                cmp_values(l, u) != Ordering::Less
            }
        }
    }

    fn intersect(&self, other: &Range) -> Option<Range> {
        let lower = if cmp_lower(&self.lower, &other.lower) == Ordering::Less {
            other.lower.clone()
        } else {
            self.lower.clone()
        };
        let upper = if cmp_upper(&self.upper, &other.upper) == Ordering::Greater {
            other.upper.clone()
        } else {
            self.upper.clone()
        };
        let range = Range::new(lower, upper);
        (!range.is_empty()).then_some(range)
    }

    /// Whether `next` (which starts no earlier than `self`) overlaps or touches `self`.
    fn connects(&self, next: &Range) -> bool {
        match (&self.upper, &next.lower) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
            (Bound::Excluded(u), Bound::Excluded(l)) => cmp_values(l, u) == Ordering::Less,
            (Bound::Included(u) | Bound::Excluded(u), Bound::Included(l) | Bound::Excluded(l)) => {
                cmp_values(l, u) != Ordering::Greater
            }
        }
    }
}

/// Total order over values used for range arithmetic. Values of different types
/// are ordered by type.
fn cmp_values(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    fn rank(v: &ScalarValue) -> u8 {
        match v {
            ScalarValue::Null => 0,
            ScalarValue::Bool(_) => 1,
            ScalarValue::Int64(_) | ScalarValue::Float64(_) => 2,
            ScalarValue::Utf8(_) => 3,
            ScalarValue::Date(_) => 4,
        }
    }
    a.compare(b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

fn cmp_lower(a: &Bound<ScalarValue>, b: &Bound<ScalarValue>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            cmp_values(x, y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => cmp_values(x, y).then(Ordering::Less),
        (Bound::Excluded(x), Bound::Included(y)) => cmp_values(x, y).then(Ordering::Greater),
    }
}

fn cmp_upper(a: &Bound<ScalarValue>, b: &Bound<ScalarValue>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Greater,
        (_, Bound::Unbounded) => Ordering::Less,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            cmp_values(x, y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => cmp_values(x, y).then(Ordering::Greater),
        (Bound::Excluded(x), Bound::Included(y)) => cmp_values(x, y).then(Ordering::Less),
    }
}

/// Allowed values of a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    column: ColId,
    ranges: Vec<Range>,
    includes_null: bool,
}

impl Interval {
    /// Build an interval, normalizing `ranges` into sorted disjoint form.
    pub fn new(column: ColId, ranges: Vec<Range>, includes_null: bool) -> Self {
        let mut ranges: Vec<Range> = ranges.into_iter().filter(|r| !r.is_empty()).collect();
        ranges.sort_by(|a, b| cmp_lower(&a.lower, &b.lower));
        let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
        for range in ranges {
            if let Some(last) = merged.last_mut() {
                if last.connects(&range) {
                    if cmp_upper(&range.upper, &last.upper) == Ordering::Greater {
                        last.upper = range.upper;
                    }
                    continue;
                }
            }
            merged.push(range);
        }
        Self {
            column,
            ranges: merged,
            includes_null,
        }
    }

    /// Any value, NULL included.
    pub fn unbounded(column: ColId) -> Self {
        Self::new(column, vec![Range::unbounded()], true)
    }

    pub fn not_null(column: ColId) -> Self {
        Self::new(column, vec![Range::unbounded()], false)
    }

    pub fn null_only(column: ColId) -> Self {
        Self::new(column, Vec::new(), true)
    }

    /// Values satisfying `column <op> value`. `None` for non-comparison operators.
    pub fn from_comparison(column: ColId, op: BinaryOp, value: ScalarValue) -> Option<Self> {
        if value.is_null() {
            // A comparison with NULL is never true.
            return Some(Self::new(column, Vec::new(), false));
        }
        let ranges = match op {
            BinaryOp::Eq => vec![Range::point(value)],
            BinaryOp::NotEq => vec![
                Range::new(Bound::Unbounded, Bound::Excluded(value.clone())),
                Range::new(Bound::Excluded(value), Bound::Unbounded),
            ],
            BinaryOp::Lt => vec![Range::new(Bound::Unbounded, Bound::Excluded(value))],
            BinaryOp::LtEq => vec![Range::new(Bound::Unbounded, Bound::Included(value))],
            BinaryOp::Gt => vec![Range::new(Bound::Excluded(value), Bound::Unbounded)],
            BinaryOp::GtEq => vec![Range::new(Bound::Included(value), Bound::Unbounded)],
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => return None,
        };
        Some(Self::new(column, ranges, false))
    }

    pub fn column(&self) -> ColId {
        self.column
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn includes_null(&self) -> bool {
        self.includes_null
    }

    pub fn is_contradiction(&self) -> bool {
        self.ranges.is_empty() && !self.includes_null
    }

    pub fn is_unbounded(&self) -> bool {
        self.includes_null && self.ranges.len() == 1 && self.ranges[0].is_unbounded()
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        assert_eq!(
            self.column, other.column,
            "intersecting intervals on columns {} and {}",
            self.column, other.column
        );
        let mut ranges = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                ranges.extend(a.intersect(b));
            }
        }
        Interval::new(self.column, ranges, self.includes_null && other.includes_null)
    }

    pub fn union(&self, other: &Interval) -> Interval {
        assert_eq!(
            self.column, other.column,
            "unioning intervals on columns {} and {}",
            self.column, other.column
        );
        let ranges = self.ranges.iter().chain(&other.ranges).cloned().collect();
        Interval::new(self.column, ranges, self.includes_null || other.includes_null)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} in {{", self.column)?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &r.lower {
                Bound::Unbounded => write!(f, "(-inf")?,
                Bound::Included(v) => write!(f, "[{}", v)?,
                Bound::Excluded(v) => write!(f, "({}", v)?,
            }
            match &r.upper {
                Bound::Unbounded => write!(f, ", inf)")?,
                Bound::Included(v) => write!(f, ", {}]", v)?,
                Bound::Excluded(v) => write!(f, ", {})", v)?,
            }
        }
        if self.includes_null {
            write!(f, "{}null", if self.ranges.is_empty() { "" } else { ", " })?;
        }
        write!(f, "}}")
    }
}

fn column_index(children: &[Arc<Constraint>]) -> BTreeMap<ColId, Vec<usize>> {
    let mut index: BTreeMap<ColId, Vec<usize>> = BTreeMap::new();
    for (i, child) in children.iter().enumerate() {
        for col in child.columns() {
            index.entry(col).or_default().push(i);
        }
    }
    index
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conjunction {
    children: Vec<Arc<Constraint>>,
    index: BTreeMap<ColId, Vec<usize>>,
}

impl Conjunction {
    pub fn new(children: Vec<Arc<Constraint>>) -> Self {
        let index = column_index(&children);
        Self { children, index }
    }

    pub fn children(&self) -> &[Arc<Constraint>] {
        &self.children
    }

    pub fn is_contradiction(&self) -> bool {
        self.children.iter().any(|c| c.is_contradiction())
            || self.index.keys().any(|&col| {
                self.constraint_on_column(col)
                    .is_some_and(|c| c.is_contradiction())
            })
    }

    pub fn constraint_on_column(&self, col: ColId) -> Option<Constraint> {
        let owners = self.index.get(&col)?;
        let parts = owners
            .iter()
            .filter_map(|&i| self.children[i].constraint_on_column(col))
            .map(Arc::new)
            .collect();
        Constraint::conjunction(parts).map(into_owned)
    }

    pub fn constraint_on_columns(&self, cols: &ColumnSet) -> Option<Constraint> {
        let parts = self
            .children
            .iter()
            .filter_map(|c| c.constraint_on_columns(cols))
            .map(Arc::new)
            .collect();
        Constraint::conjunction(parts).map(into_owned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disjunction {
    children: Vec<Arc<Constraint>>,
    index: BTreeMap<ColId, Vec<usize>>,
}

impl Disjunction {
    pub fn new(children: Vec<Arc<Constraint>>) -> Self {
        let index = column_index(&children);
        Self { children, index }
    }

    pub fn children(&self) -> &[Arc<Constraint>] {
        &self.children
    }

    /// True iff every disjunct is a contradiction.
    pub fn is_contradiction(&self) -> bool {
        self.children.iter().all(|c| c.is_contradiction())
    }

    /// `None` when no disjunct mentions `col`; unbounded when only some do;
    /// otherwise the disjunction of the per-disjunct constraints on `col`.
    pub fn constraint_on_column(&self, col: ColId) -> Option<Constraint> {
        let owners = self.index.get(&col)?;
        if owners.len() < self.children.len() {
            return Some(Constraint::Interval(Interval::unbounded(col)));
        }
        let mut parts = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child.constraint_on_column(col) {
                Some(c) if !c.is_unbounded() => parts.push(Arc::new(c)),
                _ => return Some(Constraint::Interval(Interval::unbounded(col))),
            }
        }
        Constraint::disjunction(parts).map(into_owned)
    }

    /// `None` (unbounded) as soon as one disjunct says nothing about `cols`.
    pub fn constraint_on_columns(&self, cols: &ColumnSet) -> Option<Constraint> {
        let mut parts = Vec::with_capacity(self.children.len());
        for child in &self.children {
            parts.push(Arc::new(child.constraint_on_columns(cols)?));
        }
        Constraint::disjunction(parts).map(into_owned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Interval(Interval),
    Conjunction(Conjunction),
    Disjunction(Disjunction),
}

impl Constraint {
    /// Conjunction of `children`, flattening nested conjunctions and merging
    /// intervals on the same column. `None` for no children.
    pub fn conjunction(children: Vec<Arc<Constraint>>) -> Option<Arc<Constraint>> {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match &*child {
                Constraint::Conjunction(c) => flat.extend(c.children.iter().cloned()),
                _ => flat.push(child),
            }
        }
        if flat.len() <= 1 {
            return flat.pop();
        }
        let intervals: Option<Vec<&Interval>> = flat.iter().map(|c| c.as_interval()).collect();
        if let Some(intervals) = intervals {
            let mut per_column: BTreeMap<ColId, Interval> = BTreeMap::new();
            for interval in intervals {
                per_column
                    .entry(interval.column)
                    .and_modify(|acc| *acc = acc.intersect(interval))
                    .or_insert_with(|| interval.clone());
            }
            let mut merged: Vec<Arc<Constraint>> = per_column
                .into_values()
                .map(|i| Arc::new(Constraint::Interval(i)))
                .collect();
            if merged.len() == 1 {
                return merged.pop();
            }
            flat = merged;
        }
        Some(Arc::new(Constraint::Conjunction(Conjunction::new(flat))))
    }

    /// Disjunction of `children`, flattening nested disjunctions. Intervals all on
    /// one column collapse into their union. `None` for no children.
    pub fn disjunction(children: Vec<Arc<Constraint>>) -> Option<Arc<Constraint>> {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match &*child {
                Constraint::Disjunction(d) => flat.extend(d.children.iter().cloned()),
                _ => flat.push(child),
            }
        }
        if flat.len() <= 1 {
            return flat.pop();
        }
        let intervals: Option<Vec<&Interval>> = flat.iter().map(|c| c.as_interval()).collect();
        if let Some(intervals) = intervals {
            let column = intervals[0].column;
            if intervals.iter().all(|i| i.column == column) {
                let union = intervals[1..]
                    .iter()
                    .fold(intervals[0].clone(), |acc, i| acc.union(i));
                return Some(Arc::new(Constraint::Interval(union)));
            }
        }
        Some(Arc::new(Constraint::Disjunction(Disjunction::new(flat))))
    }

    pub fn as_interval(&self) -> Option<&Interval> {
        match self {
            Constraint::Interval(i) => Some(i),
            _ => None,
        }
    }

    /// Columns mentioned anywhere in the tree.
    pub fn columns(&self) -> ColumnSet {
        match self {
            Constraint::Interval(i) => ColumnSet::from([i.column]),
            Constraint::Conjunction(c) => c.index.keys().copied().collect(),
            Constraint::Disjunction(d) => d.index.keys().copied().collect(),
        }
    }

    pub fn is_contradiction(&self) -> bool {
        match self {
            Constraint::Interval(i) => i.is_contradiction(),
            Constraint::Conjunction(c) => c.is_contradiction(),
            Constraint::Disjunction(d) => d.is_contradiction(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.as_interval().is_some_and(Interval::is_unbounded)
    }

    /// What the tree implies about `col` alone, `None` when it says nothing.
    ///
    /// Callers read `None` as unbounded and nullable; disjunctions that only
    /// partly constrain `col` return an explicit unbounded interval instead.
    pub fn constraint_on_column(&self, col: ColId) -> Option<Constraint> {
        match self {
            Constraint::Interval(i) => (i.column == col).then(|| self.clone()),
            Constraint::Conjunction(c) => c.constraint_on_column(col),
            Constraint::Disjunction(d) => d.constraint_on_column(col),
        }
    }

    /// What the tree implies about the columns in `cols`, `None` when it says nothing.
    /// `None` means unbounded: a disjunction with any disjunct silent on `cols`
    /// degrades to it.
    pub fn constraint_on_columns(&self, cols: &ColumnSet) -> Option<Constraint> {
        match self {
            Constraint::Interval(i) => cols.contains(&i.column).then(|| self.clone()),
            Constraint::Conjunction(c) => c.constraint_on_columns(cols),
            Constraint::Disjunction(d) => d.constraint_on_columns(cols),
        }
    }

    /// Deep copy with columns substituted through `map`. Columns missing from the
    /// map are kept. Column indexes are rebuilt.
    pub fn copy_with_remapped_columns(&self, map: &HashMap<ColId, ColId>) -> Constraint {
        let remap_all = |children: &[Arc<Constraint>]| -> Vec<Arc<Constraint>> {
            children
                .iter()
                .map(|c| Arc::new(c.copy_with_remapped_columns(map)))
                .collect()
        };
        match self {
            Constraint::Interval(i) => Constraint::Interval(Interval {
                column: map.get(&i.column).copied().unwrap_or(i.column),
                ranges: i.ranges.clone(),
                includes_null: i.includes_null,
            }),
            Constraint::Conjunction(c) => {
                Constraint::Conjunction(Conjunction::new(remap_all(&c.children)))
            }
            Constraint::Disjunction(d) => {
                Constraint::Disjunction(Disjunction::new(remap_all(&d.children)))
            }
        }
    }
}

fn into_owned(c: Arc<Constraint>) -> Constraint {
    Arc::try_unwrap(c).unwrap_or_else(|shared| (*shared).clone())
}

/// Constraint implied by the scalar predicate in `group`, if one can be derived.
///
/// Recognized forms: `col <cmp> const` (either side), `col IS [NOT] NULL`, `AND`
/// of anything (unrecognized conjuncts are dropped), and `OR` when every disjunct
/// is recognized.
pub fn from_predicate(ctx: &OptContext, group: GroupId) -> Result<Option<Arc<Constraint>>> {
    from_scalar(ctx, group, 0)
}

fn from_scalar(ctx: &OptContext, group: GroupId, depth: usize) -> Result<Option<Arc<Constraint>>> {
    ctx.guard.check(depth)?;
    let memo = ctx.memo;
    let gexpr = memo.expr(memo.group(group).exprs()[0]);
    let interval = |i: Option<Interval>| Ok(i.map(|i| Arc::new(Constraint::Interval(i))));

    match &*gexpr.op {
        Operator::Scalar(ScalarOp::Binary(op)) if op.is_comparison() => {
            let (l, r) = (gexpr.children[0], gexpr.children[1]);
            if let (Some(col), Some(value)) = (memo.as_column(l), memo.as_constant(r)) {
                return interval(Interval::from_comparison(col.id, *op, value.clone()));
            }
            if let (Some(value), Some(col), Some(op)) =
                (memo.as_constant(l), memo.as_column(r), op.commute())
            {
                return interval(Interval::from_comparison(col.id, op, value.clone()));
            }
            Ok(None)
        }
        Operator::Scalar(ScalarOp::Unary(UnaryOp::IsNull)) => {
            interval(memo.as_column(gexpr.children[0]).map(|c| Interval::null_only(c.id)))
        }
        Operator::Scalar(ScalarOp::Unary(UnaryOp::IsNotNull)) => {
            interval(memo.as_column(gexpr.children[0]).map(|c| Interval::not_null(c.id)))
        }
        Operator::Scalar(ScalarOp::And) => {
            let mut parts = Vec::with_capacity(gexpr.children.len());
            for &child in &gexpr.children {
                parts.extend(from_scalar(ctx, child, depth + 1)?);
            }
            Ok(Constraint::conjunction(parts))
        }
        Operator::Scalar(ScalarOp::Or) => {
            let mut parts = Vec::with_capacity(gexpr.children.len());
            for &child in &gexpr.children {
                match from_scalar(ctx, child, depth + 1)? {
                    Some(c) => parts.push(c),
                    None => return Ok(None),
                }
            }
            Ok(Constraint::disjunction(parts))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(col: ColId, op: BinaryOp, v: i64) -> Arc<Constraint> {
        Arc::new(Constraint::Interval(
            Interval::from_comparison(col, op, ScalarValue::Int64(v)).unwrap(),
        ))
    }

    fn contradiction(col: ColId) -> Arc<Constraint> {
        Arc::new(Constraint::Interval(Interval::new(col, vec![], false)))
    }

    #[test]
    fn test_interval_normalizes_ranges() {
        let i = Interval::new(
            1,
            vec![
                Range::new(Bound::Included(ScalarValue::Int64(5)), Bound::Excluded(ScalarValue::Int64(9))),
                Range::new(Bound::Unbounded, Bound::Included(ScalarValue::Int64(5))),
                Range::new(Bound::Excluded(ScalarValue::Int64(20)), Bound::Excluded(ScalarValue::Int64(20))),
            ],
            false,
        );
        assert_eq!(
            i.ranges(),
            &[Range::new(Bound::Unbounded, Bound::Excluded(ScalarValue::Int64(9)))]
        );
    }

    #[test]
    fn test_excluded_endpoints_do_not_merge() {
        let ne = Interval::from_comparison(1, BinaryOp::NotEq, ScalarValue::Int64(3)).unwrap();
        assert_eq!(ne.ranges().len(), 2);
        let eq = Interval::from_comparison(1, BinaryOp::Eq, ScalarValue::Int64(3)).unwrap();
        assert!(ne.intersect(&eq).is_contradiction());
        assert!(!ne.union(&eq).includes_null());
        assert_eq!(ne.union(&eq).ranges(), &[Range::unbounded()]);
    }

    #[test]
    fn test_conjunction_merges_same_column() {
        let c = Constraint::conjunction(vec![cmp(1, BinaryOp::Gt, 10), cmp(1, BinaryOp::Lt, 5)]).unwrap();
        assert!(c.is_contradiction());
        let c = Constraint::conjunction(vec![cmp(1, BinaryOp::Gt, 10), cmp(2, BinaryOp::Lt, 5)]).unwrap();
        assert!(matches!(&*c, Constraint::Conjunction(_)));
        assert!(!c.is_contradiction());
        assert_eq!(c.columns(), ColumnSet::from([1, 2]));
    }

    #[test]
    fn test_disjunction_contradiction_needs_all_children() {
        let d = Disjunction::new(vec![contradiction(1), cmp(2, BinaryOp::Eq, 1)]);
        assert!(!d.is_contradiction());
        let d = Disjunction::new(vec![contradiction(1), contradiction(2)]);
        assert!(d.is_contradiction());
    }

    #[test]
    fn test_disjunction_partial_column_is_unbounded() {
        // (a < 3) OR (a > 7 AND b = 1) OR (b = 2): column a is missing from one disjunct.
        let a_hi_b = Constraint::conjunction(vec![cmp(1, BinaryOp::Gt, 7), cmp(3, BinaryOp::Eq, 1)]).unwrap();
        let d = Disjunction::new(vec![cmp(1, BinaryOp::Lt, 3), a_hi_b, cmp(3, BinaryOp::Eq, 2)]);
        let on_a = d.constraint_on_column(1).unwrap();
        assert!(on_a.is_unbounded());
        assert!(d.constraint_on_column(99).is_none());
    }

    #[test]
    fn test_disjunction_full_column_is_union() {
        let d = Disjunction::new(vec![cmp(1, BinaryOp::Lt, 3), cmp(1, BinaryOp::Gt, 7)]);
        let on_a = d.constraint_on_column(1).unwrap();
        let interval = on_a.as_interval().unwrap();
        assert_eq!(interval.ranges().len(), 2);
        assert!(!interval.includes_null());
    }

    #[test]
    fn test_disjunction_on_column_set_degrades_when_disjoint() {
        let d = Disjunction::new(vec![cmp(1, BinaryOp::Lt, 3), cmp(2, BinaryOp::Gt, 7)]);
        assert!(d.constraint_on_columns(&ColumnSet::from([1])).is_none());
        let wrapped = Constraint::Disjunction(d.clone());
        assert!(wrapped.constraint_on_columns(&ColumnSet::from([2])).is_none());
        let both = d.constraint_on_columns(&ColumnSet::from([1, 2])).unwrap();
        assert!(matches!(both, Constraint::Disjunction(_)));
    }

    #[test]
    fn test_remap_rebuilds_index() {
        let d = Constraint::Disjunction(Disjunction::new(vec![
            cmp(1, BinaryOp::Lt, 3),
            cmp(2, BinaryOp::Gt, 7),
        ]));
        let remapped = d.copy_with_remapped_columns(&HashMap::from([(1, 10)]));
        assert_eq!(remapped.columns(), ColumnSet::from([2, 10]));
        assert!(remapped.constraint_on_column(1).is_none());
        assert!(remapped.constraint_on_column(10).unwrap().is_unbounded());
    }
}
