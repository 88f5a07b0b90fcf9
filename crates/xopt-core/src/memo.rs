//! # The Memo
//!
//! The memo compactly stores every alternative the search has discovered. It is made
//! of two arenas addressed by stable `u32` indices:
//!
//! - **Groups**: equivalence classes. A group owns an append-only, insertion-ordered
//!   list of its member expressions. Positions in that list never change, so a
//!   binding cursor that remembers a position can resume after further inserts.
//! - **Group expressions**: one operator plus an ordered list of child *groups*.
//!   Each records the group that owns it and its position in that group.
//!
//! Back-references are indices, never pointers, so there are no ownership cycles
//! and the whole memo is torn down as a unit.
//!
//! ## Deduplication
//!
//! No two group expressions share the same `(operator, child groups)` shape.
//! Every insert first consults a hash index of shapes; if the shape already exists
//! the existing expression is returned, wherever it lives.
//!
//! ## Scalar Groups
//!
//! A group whose first member is a scalar operator is a *scalar* group and may
//! only ever hold scalar operators. Members of a scalar group share one
//! [`DerivedScalarProps`] instance: deriving properties for any member derives them
//! for all of them.
//!
//! ## Closing
//!
//! Once the search is done the driver closes the memo. Inserting into a closed
//! group is a programming error and panics.

use crate::expr::{BinaryOp, ColId, ColumnRef, Operator, ScalarOp, ScalarValue};
use crate::properties::DerivedScalarProps;
use crate::relational::DerivedRelationalProps;
use crate::stats::Statistics;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Index of a group in the memo.
pub type GroupId = u32;
/// Index of a group expression in the memo.
pub type ExprId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Open,
    /// Terminal; no further inserts.
    Closed,
}

/// An equivalence class of expressions.
#[derive(Debug)]
pub struct Group {
    pub id: GroupId,
    scalar: bool,
    exprs: Vec<ExprId>,
    state: GroupState,
    relational_props: Option<Arc<DerivedRelationalProps>>,
    stats: OnceLock<Statistics>,
}

impl Group {
    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    /// All members in insertion order.
    pub fn exprs(&self) -> &[ExprId] {
        &self.exprs
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Logical members in insertion order.
    pub fn logical_exprs<'a>(&'a self, memo: &'a Memo) -> impl Iterator<Item = ExprId> + 'a {
        self.exprs
            .iter()
            .copied()
            .filter(move |&e| memo.expr(e).op.is_logical())
    }

    /// Physical members in insertion order.
    pub fn physical_exprs<'a>(&'a self, memo: &'a Memo) -> impl Iterator<Item = ExprId> + 'a {
        self.exprs
            .iter()
            .copied()
            .filter(move |&e| memo.expr(e).op.is_physical())
    }

    /// Relational properties shared by all members. Panics for scalar groups.
    pub fn relational_props(&self) -> &Arc<DerivedRelationalProps> {
        match self.relational_props {
            Some(ref props) => props,
            None => panic!("group {} is scalar and has no relational properties", self.id),
        }
    }

    /// Cache slot for the group's statistics, filled by [`crate::stats::group_stats`].
    pub(crate) fn stats_slot(&self) -> &OnceLock<Statistics> {
        &self.stats
    }
}

/// One operator application with child groups.
#[derive(Debug)]
pub struct GroupExpr {
    pub id: ExprId,
    pub op: Arc<Operator>,
    pub children: Vec<GroupId>,
    /// Owning group.
    pub group: GroupId,
    /// Position within the owning group's member list.
    pub pos: usize,
    scalar_props: Option<Arc<DerivedScalarProps>>,
}

impl GroupExpr {
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// Scalar properties of this expression. Panics for relational expressions.
    pub fn scalar_props(&self) -> &Arc<DerivedScalarProps> {
        match self.scalar_props {
            Some(ref props) => props,
            None => panic!(
                "expression {} ({}) in group {} is not scalar",
                self.id, self.op, self.group
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExprKey {
    op: Arc<Operator>,
    children: Vec<GroupId>,
}

/// The memo table.
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<GroupExpr>,
    index: HashMap<ExprKey, ExprId>,
    /// `(expression, xform hash)` pairs that have already fired.
    applied: HashSet<(ExprId, u64)>,
    /// Set by [`Memo::close`]; no new groups after that.
    closed: bool,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    pub fn group(&self, id: GroupId) -> &Group {
        match self.groups.get(id as usize) {
            Some(g) => g,
            None => panic!("group {} does not exist ({} groups)", id, self.groups.len()),
        }
    }

    pub fn expr(&self, id: ExprId) -> &GroupExpr {
        match self.exprs.get(id as usize) {
            Some(e) => e,
            None => panic!("expression {} does not exist ({} expressions)", id, self.exprs.len()),
        }
    }

    /// All groups in creation order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Find an existing expression with exactly this shape.
    pub fn lookup(&self, op: &Operator, children: &[GroupId]) -> Option<ExprId> {
        let key = ExprKey {
            op: Arc::new(op.clone()),
            children: children.to_vec(),
        };
        self.index.get(&key).copied()
    }

    /// Insert an expression, creating a new singleton group for it unless the
    /// shape is already present. Returns the owning group and the expression.
    ///
    /// Panics if the shape is new and the memo has been closed.
    pub fn insert(&mut self, op: Operator, children: Vec<GroupId>) -> (GroupId, ExprId) {
        let key = self.make_key(op, children);
        if let Some(&existing) = self.index.get(&key) {
            return (self.exprs[existing as usize].group, existing);
        }
        assert!(!self.closed, "insert of {} into closed memo", key.op);
        let group_id = self.new_group(key.op.is_scalar());
        let expr_id = self.push_expr(group_id, key);
        (group_id, expr_id)
    }

    /// Insert an expression into `group`. If the shape already exists anywhere in
    /// the memo the existing expression is returned and nothing is added.
    ///
    /// Panics if the group is closed, or if the operator family (scalar vs
    /// relational) does not match the group.
    pub fn insert_into(&mut self, group: GroupId, op: Operator, children: Vec<GroupId>) -> ExprId {
        let key = self.make_key(op, children);
        if let Some(&existing) = self.index.get(&key) {
            let owner = self.exprs[existing as usize].group;
            if owner != group {
                trace!(
                    "expression {} already lives in group {}, not merging into group {}",
                    existing,
                    owner,
                    group
                );
            }
            return existing;
        }
        let g = self.group(group);
        assert!(
            g.state == GroupState::Open,
            "insert of {} into closed group {}",
            key.op,
            group
        );
        assert!(
            g.scalar == key.op.is_scalar(),
            "operator {} does not belong in {} group {}",
            key.op,
            if g.scalar { "scalar" } else { "relational" },
            group
        );
        self.push_expr(group, key)
    }

    /// Close one group for modification.
    pub fn close_group(&mut self, group: GroupId) {
        let len = self.groups.len();
        match self.groups.get_mut(group as usize) {
            Some(g) => g.state = GroupState::Closed,
            None => panic!("group {} does not exist ({} groups)", group, len),
        }
    }

    /// Close every group. Called by the driver once a plan has been extracted.
    pub fn close(&mut self) {
        for g in &mut self.groups {
            g.state = GroupState::Closed;
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn xform_applied(&self, expr: ExprId, xform_hash: u64) -> bool {
        self.applied.contains(&(expr, xform_hash))
    }

    pub fn mark_xform_applied(&mut self, expr: ExprId, xform_hash: u64) {
        self.applied.insert((expr, xform_hash));
    }

    /// Operator of the first member of a scalar group; `None` for relational groups.
    pub fn scalar_op(&self, group: GroupId) -> Option<&ScalarOp> {
        let g = self.group(group);
        if !g.is_scalar() {
            return None;
        }
        match &*self.expr(g.exprs[0]).op {
            Operator::Scalar(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_column(&self, group: GroupId) -> Option<&ColumnRef> {
        match self.scalar_op(group)? {
            ScalarOp::Ident(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_constant(&self, group: GroupId) -> Option<&ScalarValue> {
        match self.scalar_op(group)? {
            ScalarOp::Const(v) => Some(v),
            _ => None,
        }
    }

    /// Conjuncts of the predicate in `group` with nested `AND`s flattened, in
    /// left-to-right order. A constant `TRUE` contributes nothing.
    pub fn conjuncts(&self, group: GroupId) -> Vec<GroupId> {
        let mut out = Vec::new();
        let mut stack = vec![group];
        while let Some(g) = stack.pop() {
            match self.scalar_op(g) {
                Some(ScalarOp::And) => {
                    let first = self.group(g).exprs[0];
                    stack.extend(self.expr(first).children.iter().rev());
                }
                Some(ScalarOp::Const(ScalarValue::Bool(true))) => {}
                _ => out.push(g),
            }
        }
        out
    }

    /// The two columns of an `a = b` predicate group.
    pub fn equi_join_columns(&self, group: GroupId) -> Option<(ColId, ColId)> {
        if self.scalar_op(group)? != &ScalarOp::Binary(BinaryOp::Eq) {
            return None;
        }
        let children = &self.expr(self.group(group).exprs[0]).children;
        let left = self.as_column(children[0])?;
        let right = self.as_column(children[1])?;
        Some((left.id, right.id))
    }

    fn make_key(&self, op: Operator, children: Vec<GroupId>) -> ExprKey {
        for &child in &children {
            assert!(
                (child as usize) < self.groups.len(),
                "child group {} of {} does not exist",
                child,
                op
            );
        }
        ExprKey {
            op: Arc::new(op),
            children,
        }
    }

    fn new_group(&mut self, scalar: bool) -> GroupId {
        let id = self.groups.len() as GroupId;
        self.groups.push(Group {
            id,
            scalar,
            exprs: Vec::new(),
            state: GroupState::Open,
            relational_props: (!scalar).then(|| Arc::new(DerivedRelationalProps::default())),
            stats: OnceLock::new(),
        });
        id
    }

    fn push_expr(&mut self, group_id: GroupId, key: ExprKey) -> ExprId {
        let id = self.exprs.len() as ExprId;
        let group = &mut self.groups[group_id as usize];
        let scalar_props = if key.op.is_scalar() {
            // Members of a scalar group are interchangeable and share properties.
            Some(match group.exprs.first() {
                Some(&first) => match self.exprs[first as usize].scalar_props {
                    Some(ref props) => Arc::clone(props),
                    None => Arc::new(DerivedScalarProps::default()),
                },
                None => Arc::new(DerivedScalarProps::default()),
            })
        } else {
            None
        };
        let pos = group.exprs.len();
        group.exprs.push(id);
        trace!("memo: expr {} = {} {:?} -> group {}", id, key.op, key.children, group_id);
        self.exprs.push(GroupExpr {
            id,
            op: Arc::clone(&key.op),
            children: key.children.clone(),
            group: group_id,
            pos,
            scalar_props,
        });
        self.index.insert(key, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ColumnRef, JoinType, ScalarValue, TableRef};

    fn get(memo: &mut Memo, name: &str, col: u32) -> GroupId {
        memo.insert(
            Operator::get(
                TableRef::new("s", name),
                vec![ColumnRef::new(col, Some(name), "id")],
            ),
            vec![],
        )
        .0
    }

    #[test]
    fn test_dedup_returns_same_expression() {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        let b = get(&mut memo, "b", 2);
        let (t, _) = memo.insert(Operator::constant(ScalarValue::Bool(true)), vec![]);

        let first = memo.insert(Operator::join(JoinType::Inner), vec![a, b, t]);
        let second = memo.insert(Operator::join(JoinType::Inner), vec![a, b, t]);
        assert_eq!(first, second);
        assert_eq!(memo.num_exprs(), 4);

        let swapped = memo.insert(Operator::join(JoinType::Inner), vec![b, a, t]);
        assert_ne!(swapped.1, first.1);
        assert_ne!(swapped.0, first.0);
    }

    #[test]
    fn test_insert_into_existing_group() {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        let b = get(&mut memo, "b", 2);
        let (t, _) = memo.insert(Operator::constant(ScalarValue::Bool(true)), vec![]);
        let (g, e1) = memo.insert(Operator::join(JoinType::Inner), vec![a, b, t]);
        let e2 = memo.insert_into(g, Operator::join(JoinType::Inner), vec![b, a, t]);

        let group = memo.group(g);
        assert_eq!(group.exprs(), &[e1, e2]);
        assert_eq!(memo.expr(e2).pos, 1);
        assert_eq!(memo.expr(e2).group, g);
        assert_eq!(memo.lookup(&Operator::join(JoinType::Inner), &[b, a, t]), Some(e2));
    }

    #[test]
    fn test_scalar_group_members_share_props() {
        let mut memo = Memo::new();
        let (g, e1) = memo.insert(Operator::constant(ScalarValue::Int64(1)), vec![]);
        let e2 = memo.insert_into(g, Operator::constant(ScalarValue::Float64(1.0.into())), vec![]);
        assert!(memo.group(g).is_scalar());
        assert!(Arc::ptr_eq(
            memo.expr(e1).scalar_props(),
            memo.expr(e2).scalar_props()
        ));
    }

    #[test]
    #[should_panic(expected = "closed group")]
    fn test_insert_into_closed_group_panics() {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        memo.close();
        memo.insert_into(
            a,
            Operator::get(TableRef::new("s", "a2"), vec![]),
            vec![],
        );
    }

    #[test]
    fn test_insert_after_close_returns_existing_shape() {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        memo.close();
        assert!(memo.is_closed());
        assert_eq!(get(&mut memo, "a", 1), a);
        assert_eq!(memo.num_groups(), 1);
    }

    #[test]
    #[should_panic(expected = "closed memo")]
    fn test_new_group_after_close_panics() {
        let mut memo = Memo::new();
        get(&mut memo, "a", 1);
        memo.close();
        get(&mut memo, "b", 2);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_unknown_child_group_panics() {
        let mut memo = Memo::new();
        memo.insert(Operator::join(JoinType::Inner), vec![7, 8, 9]);
    }
}
