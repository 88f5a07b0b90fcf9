//! # Operators and Bound Expressions
//!
//! This module defines the operator vocabulary stored in the memo and the transient
//! expression trees produced by binding extraction. It is organized into three
//! operator families plus the bound-tree type:
//!
//! ## Logical Operators (`LogicalOp`)
//! Relational operators describing *what* to compute. Their relational inputs and
//! their scalar arguments are both child groups: a `Select` has children
//! `[input, predicate]`, a `Join` has `[left, right, predicate]`, an `NAryJoin` has
//! `[input_0, .., input_n, predicate]`. Keeping scalar trees in the memo lets
//! scalar properties be derived once per scalar group and shared.
//!
//! ## Physical Operators (`PhysicalOp`)
//! Produced by implementation xforms. They keep the child layout of the logical
//! operator they implement.
//!
//! ## Scalar Operators (`ScalarOp`)
//! Column references, constants, comparisons, boolean connectives, function and
//! aggregate calls, project lists and subqueries. A scalar operator lives in a
//! scalar group.
//!
//! ## Bound Expressions (`Expression`)
//! A materialized tree extracted from the memo by [`crate::binding`]: one chosen
//! group expression at each node. Children are shared `Arc`s so that successive
//! bindings reuse unchanged subtrees.

use crate::memo::{ExprId, GroupId};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Column identifier, unique within one optimization session.
pub type ColId = u32;

/// Ordered set of column identifiers.
pub type ColumnSet = BTreeSet<ColId>;

/// Reference to a table in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Reference to a column. Identity is the `id`; the names are for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub id: ColId,
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(id: ColId, table: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            id,
            table: table.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref t) = self.table {
            write!(f, "{}.{}#{}", t, self.name, self.id)
        } else {
            write!(f, "{}#{}", self.name, self.id)
        }
    }
}

/// Scalar value for constants and constraint bounds.
///
/// Uses `OrderedFloat` for `f64` so that constants can take part in memo
/// deduplication (Eq/Hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
    /// Days since Unix epoch.
    Date(i32),
}

impl ScalarValue {
    /// Compare two values of the same type. Values of different types, and
    /// NULL, are incomparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Int64(b)) => Some(a.cmp(b)),
            (Self::Float64(a), Self::Float64(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Float64(b)) => OrderedFloat(*a as f64).partial_cmp(b),
            (Self::Float64(a), Self::Int64(b)) => a.partial_cmp(&OrderedFloat(*b as f64)),
            (Self::Utf8(a), Self::Utf8(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float64(v) => write!(f, "{}", v),
            Self::Utf8(v) => write!(f, "'{}'", v),
            Self::Date(v) => write!(f, "date({})", v),
        }
    }
}

/// Binary operators for comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    /// The operator that gives the same result with operands swapped
    /// (`a < b` is `b > a`). Arithmetic other than `+`/`*` has none.
    pub fn commute(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Eq),
            BinaryOp::NotEq => Some(BinaryOp::NotEq),
            BinaryOp::Lt => Some(BinaryOp::Gt),
            BinaryOp::LtEq => Some(BinaryOp::GtEq),
            BinaryOp::Gt => Some(BinaryOp::Lt),
            BinaryOp::GtEq => Some(BinaryOp::LtEq),
            BinaryOp::Add => Some(BinaryOp::Add),
            BinaryOp::Mul => Some(BinaryOp::Mul),
            BinaryOp::Sub | BinaryOp::Div => None,
        }
    }
}

/// Unary operators for boolean logic and null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// SQL join types.
///
/// Only Inner and Cross joins are commutative and freely reassociable; the
/// other types have fixed left/right semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    Cross,
}

impl JoinType {
    pub fn is_inner(self) -> bool {
        matches!(self, JoinType::Inner | JoinType::Cross)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Quantifier of a `scalar op ANY/ALL (array)` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayCmpKind {
    Any,
    All,
}

/// Logical (relational) operators.
///
/// Child layout is fixed per operator; see the module docs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    /// Base table access. Leaf; defines `columns`.
    Get {
        table: TableRef,
        columns: Vec<ColumnRef>,
    },
    /// Children: `[input, predicate]`.
    Select,
    /// Children: `[input, project_list]`.
    Project,
    /// Children: `[left, right, predicate]`.
    Join { join_type: JoinType },
    /// Inner join of any number of inputs. Children: `[inputs.., predicate]`.
    NAryJoin,
    /// Children: `[input, project_list]` where the list holds the aggregates.
    GbAgg { group_by: Vec<ColumnRef> },
    /// Children: `[input]`.
    Limit { offset: u64, count: u64 },
}

/// Physical operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalOp {
    TableScan {
        table: TableRef,
        columns: Vec<ColumnRef>,
    },
    Filter,
    ComputeScalar,
    /// Builds on the right input, probes with the left.
    HashJoin { join_type: JoinType },
    NLJoin { join_type: JoinType },
    HashAgg { group_by: Vec<ColumnRef> },
    Limit { offset: u64, count: u64 },
}

/// Scalar operators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarOp {
    Ident(ColumnRef),
    Const(ScalarValue),
    /// Children: `[left, right]`.
    Binary(BinaryOp),
    /// Children: `[operand]`.
    Unary(UnaryOp),
    And,
    Or,
    /// Function call; volatility and set-returning-ness come from the catalog.
    Func { name: String },
    AggFunc { func: AggFunc, distinct: bool },
    /// Children: project elements.
    ProjectList,
    /// Defines `column` as the value of its single child.
    ProjectElement(ColumnRef),
    /// Scalar subquery producing `column`. Children: `[relational input]`.
    Subquery(ColumnRef),
    /// Children: `[relational input]`.
    SubqueryExists,
    /// Children: `[scalar, array]`.
    ArrayCmp { op: BinaryOp, kind: ArrayCmpKind },
    Array,
}

/// Unified operator enum stored in the memo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Logical(LogicalOp),
    Physical(PhysicalOp),
    Scalar(ScalarOp),
}

impl Operator {
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Operator::Scalar(_))
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Operator::Logical(l) => OpKind::Logical(l.kind()),
            Operator::Physical(p) => OpKind::Physical(p.kind()),
            Operator::Scalar(s) => OpKind::Scalar(s.kind()),
        }
    }

    pub fn ident(column: ColumnRef) -> Self {
        Operator::Scalar(ScalarOp::Ident(column))
    }

    pub fn constant(value: ScalarValue) -> Self {
        Operator::Scalar(ScalarOp::Const(value))
    }

    pub fn binary(op: BinaryOp) -> Self {
        Operator::Scalar(ScalarOp::Binary(op))
    }

    pub fn get(table: TableRef, columns: Vec<ColumnRef>) -> Self {
        Operator::Logical(LogicalOp::Get { table, columns })
    }

    pub fn join(join_type: JoinType) -> Self {
        Operator::Logical(LogicalOp::Join { join_type })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Logical(LogicalOp::Get { table, .. }) => write!(f, "Get({})", table),
            Operator::Logical(LogicalOp::Join { join_type }) => write!(f, "Join({:?})", join_type),
            Operator::Logical(LogicalOp::Limit { offset, count }) => {
                write!(f, "Limit({}, {})", offset, count)
            }
            Operator::Logical(l) => write!(f, "{:?}", l.kind()),
            Operator::Physical(PhysicalOp::TableScan { table, .. }) => {
                write!(f, "TableScan({})", table)
            }
            Operator::Physical(PhysicalOp::HashJoin { join_type }) => {
                write!(f, "HashJoin({:?})", join_type)
            }
            Operator::Physical(PhysicalOp::NLJoin { join_type }) => {
                write!(f, "NLJoin({:?})", join_type)
            }
            Operator::Physical(p) => write!(f, "{:?}", p.kind()),
            Operator::Scalar(ScalarOp::Ident(c)) => write!(f, "{}", c),
            Operator::Scalar(ScalarOp::Const(v)) => write!(f, "{}", v),
            Operator::Scalar(ScalarOp::Binary(op)) => write!(f, "{:?}", op),
            Operator::Scalar(ScalarOp::Func { name }) => write!(f, "{}()", name),
            Operator::Scalar(s) => write!(f, "{:?}", s.kind()),
        }
    }
}

/// Kind discriminant for pattern matching (without data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Logical(LogicalOpKind),
    Physical(PhysicalOpKind),
    Scalar(ScalarOpKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOpKind {
    Get,
    Select,
    Project,
    Join,
    NAryJoin,
    GbAgg,
    Limit,
}

impl LogicalOp {
    pub fn kind(&self) -> LogicalOpKind {
        match self {
            LogicalOp::Get { .. } => LogicalOpKind::Get,
            LogicalOp::Select => LogicalOpKind::Select,
            LogicalOp::Project => LogicalOpKind::Project,
            LogicalOp::Join { .. } => LogicalOpKind::Join,
            LogicalOp::NAryJoin => LogicalOpKind::NAryJoin,
            LogicalOp::GbAgg { .. } => LogicalOpKind::GbAgg,
            LogicalOp::Limit { .. } => LogicalOpKind::Limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalOpKind {
    TableScan,
    Filter,
    ComputeScalar,
    HashJoin,
    NLJoin,
    HashAgg,
    Limit,
}

impl PhysicalOp {
    pub fn kind(&self) -> PhysicalOpKind {
        match self {
            PhysicalOp::TableScan { .. } => PhysicalOpKind::TableScan,
            PhysicalOp::Filter => PhysicalOpKind::Filter,
            PhysicalOp::ComputeScalar => PhysicalOpKind::ComputeScalar,
            PhysicalOp::HashJoin { .. } => PhysicalOpKind::HashJoin,
            PhysicalOp::NLJoin { .. } => PhysicalOpKind::NLJoin,
            PhysicalOp::HashAgg { .. } => PhysicalOpKind::HashAgg,
            PhysicalOp::Limit { .. } => PhysicalOpKind::Limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarOpKind {
    Ident,
    Const,
    Binary,
    Unary,
    And,
    Or,
    Func,
    AggFunc,
    ProjectList,
    ProjectElement,
    Subquery,
    SubqueryExists,
    ArrayCmp,
    Array,
}

impl ScalarOp {
    pub fn kind(&self) -> ScalarOpKind {
        match self {
            ScalarOp::Ident(_) => ScalarOpKind::Ident,
            ScalarOp::Const(_) => ScalarOpKind::Const,
            ScalarOp::Binary(_) => ScalarOpKind::Binary,
            ScalarOp::Unary(_) => ScalarOpKind::Unary,
            ScalarOp::And => ScalarOpKind::And,
            ScalarOp::Or => ScalarOpKind::Or,
            ScalarOp::Func { .. } => ScalarOpKind::Func,
            ScalarOp::AggFunc { .. } => ScalarOpKind::AggFunc,
            ScalarOp::ProjectList => ScalarOpKind::ProjectList,
            ScalarOp::ProjectElement(_) => ScalarOpKind::ProjectElement,
            ScalarOp::Subquery(_) => ScalarOpKind::Subquery,
            ScalarOp::SubqueryExists => ScalarOpKind::SubqueryExists,
            ScalarOp::ArrayCmp { .. } => ScalarOpKind::ArrayCmp,
            ScalarOp::Array => ScalarOpKind::Array,
        }
    }
}

/// A tree extracted from the memo by binding.
///
/// Every node remembers the group expression it was bound to; that is all the
/// cursor state the binding needs to produce the next tree.
#[derive(Debug, Clone)]
pub struct Expression {
    pub op: Arc<Operator>,
    pub expr_id: ExprId,
    pub group_id: GroupId,
    pub children: Vec<Arc<Expression>>,
}

impl Expression {
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// Child groups of the bound node, whether or not they were expanded.
    pub fn child_group(&self, i: usize) -> GroupId {
        self.children[i].group_id
    }

    /// Render the tree on one line, e.g. `Join(Inner)(Get(s.a), Get(s.b), true)`.
    pub fn display(&self) -> String {
        let mut out = self.op.to_string();
        if !self.children.is_empty() {
            out.push('(');
            let parts: Vec<String> = self.children.iter().map(|c| c.display()).collect();
            out.push_str(&parts.join(", "));
            out.push(')');
        }
        out
    }
}

impl PartialEq for Expression {
    /// Two bound trees are equal when they chose the same group expression at
    /// every node.
    fn eq(&self, other: &Self) -> bool {
        self.expr_id == other.expr_id && self.children == other.children
    }
}

impl Eq for Expression {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_value_compare() {
        assert_eq!(
            ScalarValue::Int64(3).compare(&ScalarValue::Int64(5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            ScalarValue::Int64(3).compare(&ScalarValue::Float64(OrderedFloat(2.5))),
            Some(Ordering::Greater)
        );
        assert_eq!(ScalarValue::Null.compare(&ScalarValue::Int64(1)), None);
        assert_eq!(ScalarValue::Utf8("a".into()).compare(&ScalarValue::Int64(1)), None);
    }

    #[test]
    fn test_commute() {
        assert_eq!(BinaryOp::Lt.commute(), Some(BinaryOp::Gt));
        assert_eq!(BinaryOp::GtEq.commute(), Some(BinaryOp::LtEq));
        assert_eq!(BinaryOp::Sub.commute(), None);
    }
}
