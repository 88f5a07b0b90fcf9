//! Binding extraction against hand-built memos of known shape.
//!
//! Each test builds the memo directly, runs the cursor to exhaustion by feeding
//! back the previous result, and checks exactly which trees came out and in which
//! order.

use std::collections::HashSet;
use std::sync::Arc;
use xopt_core::binding::Binding;
use xopt_core::error::OptError;
use xopt_core::expr::*;
use xopt_core::guard::ExecGuard;
use xopt_core::memo::{ExprId, GroupId, Memo};
use xopt_core::pattern::Pattern;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get(name: &str, col: ColId) -> Operator {
    Operator::get(
        TableRef::new("s", name),
        vec![ColumnRef::new(col, Some(name), "id")],
    )
}

fn scan(name: &str) -> Operator {
    Operator::Physical(PhysicalOp::TableScan {
        table: TableRef::new("s", name),
        columns: vec![],
    })
}

fn ident(memo: &mut Memo, table: &str, col: ColId) -> GroupId {
    memo.insert(Operator::ident(ColumnRef::new(col, Some(table), "id")), vec![])
        .0
}

fn truth(memo: &mut Memo) -> GroupId {
    memo.insert(Operator::constant(ScalarValue::Bool(true)), vec![]).0
}

fn join_leaves() -> Pattern {
    Pattern::with_leaves(LogicalOpKind::Join, 3)
}

/// Drain the cursor over `group`.
fn drain(memo: &Memo, group: GroupId, pattern: &Pattern) -> Vec<Arc<Expression>> {
    let guard = ExecGuard::default();
    let binding = Binding::new(memo, &guard);
    let mut out = Vec::new();
    let mut prev: Option<Arc<Expression>> = None;
    while let Some(next) = binding.extract_group(group, pattern, prev.as_ref()).unwrap() {
        out.push(Arc::clone(&next));
        prev = Some(next);
    }
    out
}

/// Group expression chosen at the root and at each child.
fn shape(expr: &Expression) -> (ExprId, Vec<ExprId>) {
    (expr.expr_id, expr.children.iter().map(|c| c.expr_id).collect())
}

// ---------------------------------------------------------------------------
// End-to-end: Join(Get A, Get B)
// ---------------------------------------------------------------------------

#[test]
fn test_single_join_binds_once() {
    let mut memo = Memo::new();
    let (g1, _) = memo.insert(get("a", 1), vec![]);
    let (g2, _) = memo.insert(get("b", 2), vec![]);
    let pred = truth(&mut memo);
    let (g3, _) = memo.insert(Operator::join(JoinType::Inner), vec![g1, g2, pred]);

    let guard = ExecGuard::default();
    let binding = Binding::new(&memo, &guard);
    let first = binding
        .extract_group(g3, &join_leaves(), None)
        .unwrap()
        .expect("one binding");
    assert_eq!(first.display(), "Join(Inner)(Get(s.a), Get(s.b), true)");
    assert_eq!(first.group_id, g3);
    assert!(first.children.iter().all(|c| c.children.is_empty()));

    let second = binding
        .extract_group(g3, &join_leaves(), Some(&first))
        .unwrap();
    assert!(second.is_none());
}

// ---------------------------------------------------------------------------
// Totality
// ---------------------------------------------------------------------------

#[test]
fn test_every_shape_exactly_once() {
    let mut memo = Memo::new();
    let (a, a1) = memo.insert(get("a", 1), vec![]);
    let a2 = memo.insert_into(a, get("a_copy", 1), vec![]);
    // Physical members never bind in a relational group.
    memo.insert_into(a, scan("a"), vec![]);
    let (b, b1) = memo.insert(get("b", 2), vec![]);
    let pred = truth(&mut memo);
    let (j, j1) = memo.insert(Operator::join(JoinType::Inner), vec![a, b, pred]);
    let j2 = memo.insert_into(j, Operator::join(JoinType::Inner), vec![b, a, pred]);
    let p = memo.group(pred).exprs()[0];

    let shapes: Vec<_> = drain(&memo, j, &join_leaves())
        .iter()
        .map(|e| shape(e))
        .collect();
    assert_eq!(
        shapes,
        vec![
            (j1, vec![a1, b1, p]),
            (j1, vec![a2, b1, p]),
            (j2, vec![b1, a1, p]),
            (j2, vec![b1, a2, p]),
        ]
    );
    let unique: HashSet<_> = shapes.iter().cloned().collect();
    assert_eq!(unique.len(), shapes.len());
}

#[test]
fn test_operator_mismatch_yields_nothing() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    assert!(drain(&memo, a, &join_leaves()).is_empty());
}

// ---------------------------------------------------------------------------
// Leaf patterns
// ---------------------------------------------------------------------------

#[test]
fn test_leaf_binds_once_per_group_expression() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    let (b, _) = memo.insert(get("b", 2), vec![]);
    let pred = truth(&mut memo);
    let (j, _) = memo.insert(Operator::join(JoinType::Inner), vec![a, b, pred]);
    memo.insert_into(j, Operator::join(JoinType::Inner), vec![b, a, pred]);

    let bound = drain(&memo, j, &Pattern::Leaf);
    assert_eq!(bound.len(), 2);
    assert!(bound.iter().all(|e| e.children.is_empty()));
}

// ---------------------------------------------------------------------------
// Scalar groups
// ---------------------------------------------------------------------------

#[test]
fn test_scalar_group_binds_once() {
    let mut memo = Memo::new();
    let (g, first) = memo.insert(Operator::constant(ScalarValue::Int64(1)), vec![]);
    memo.insert_into(g, Operator::constant(ScalarValue::Float64(1.0.into())), vec![]);
    memo.insert_into(g, Operator::constant(ScalarValue::Utf8("1".into())), vec![]);
    assert_eq!(memo.group(g).len(), 3);

    for pattern in [Pattern::Leaf, Pattern::Tree] {
        let bound = drain(&memo, g, &pattern);
        assert_eq!(bound.len(), 1, "pattern {:?}", pattern);
        assert_eq!(bound[0].expr_id, first);
    }
}

#[test]
fn test_tree_binds_whole_predicate() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    let (b, _) = memo.insert(get("b", 2), vec![]);
    let c1 = ident(&mut memo, "a", 1);
    let c2 = ident(&mut memo, "b", 2);
    let (eq, _) = memo.insert(Operator::binary(BinaryOp::Eq), vec![c1, c2]);
    let t = truth(&mut memo);
    let (and, _) = memo.insert(Operator::Scalar(ScalarOp::And), vec![eq, t]);
    let (j, _) = memo.insert(Operator::join(JoinType::Inner), vec![a, b, and]);

    let bound = drain(&memo, j, &Pattern::join());
    assert_eq!(bound.len(), 1);
    assert_eq!(
        bound[0].display(),
        "Join(Inner)(Get(s.a), Get(s.b), And(Eq(a.id#1, b.id#2), true))"
    );
}

#[test]
fn test_nary_join_multi_leaf() {
    let mut memo = Memo::new();
    let inputs: Vec<GroupId> = ["a", "b", "c"]
        .iter()
        .enumerate()
        .map(|(i, name)| memo.insert(get(name, i as ColId + 1), vec![]).0)
        .collect();
    let pred = truth(&mut memo);
    let mut children = inputs.clone();
    children.push(pred);
    let (n, _) = memo.insert(Operator::Logical(LogicalOp::NAryJoin), children);

    let bound = drain(&memo, n, &Pattern::nary_join());
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].arity(), 4);
    let groups: Vec<_> = (0..3).map(|i| bound[0].child_group(i)).collect();
    assert_eq!(groups, inputs);
}

// ---------------------------------------------------------------------------
// Odometer
// ---------------------------------------------------------------------------

#[test]
fn test_odometer_advances_rightmost_child_first() {
    let mut memo = Memo::new();
    let (x, x0) = memo.insert(get("x0", 1), vec![]);
    let x1 = memo.insert_into(x, get("x1", 1), vec![]);
    let (y, y0) = memo.insert(get("y0", 2), vec![]);
    let y1 = memo.insert_into(y, get("y1", 2), vec![]);
    let y2 = memo.insert_into(y, get("y2", 2), vec![]);
    let pred = truth(&mut memo);
    let (j, j0) = memo.insert(Operator::join(JoinType::Inner), vec![x, y, pred]);
    let p = memo.group(pred).exprs()[0];

    let shapes: Vec<_> = drain(&memo, j, &join_leaves())
        .iter()
        .map(|e| shape(e))
        .collect();
    assert_eq!(shapes.len(), 6);
    let expected: Vec<_> = [(x0, y0), (x0, y1), (x0, y2), (x1, y0), (x1, y1), (x1, y2)]
        .into_iter()
        .map(|(l, r)| (j0, vec![l, r, p]))
        .collect();
    assert_eq!(shapes, expected);
}

#[test]
fn test_nested_pattern_enumerates_inner_alternatives() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    let (b, _) = memo.insert(get("b", 2), vec![]);
    let (c, _) = memo.insert(get("c", 3), vec![]);
    let pred = truth(&mut memo);
    let (ab, _) = memo.insert(Operator::join(JoinType::Inner), vec![a, b, pred]);
    memo.insert_into(ab, Operator::join(JoinType::Inner), vec![b, a, pred]);
    let (top, _) = memo.insert(Operator::join(JoinType::Inner), vec![ab, c, pred]);

    let bound = drain(&memo, top, &Pattern::join_join_left());
    let rendered: Vec<_> = bound.iter().map(|e| e.display()).collect();
    assert_eq!(
        rendered,
        vec![
            "Join(Inner)(Join(Inner)(Get(s.a), Get(s.b), true), Get(s.c), true)",
            "Join(Inner)(Join(Inner)(Get(s.b), Get(s.a), true), Get(s.c), true)",
        ]
    );
}

// ---------------------------------------------------------------------------
// Resumption and guards
// ---------------------------------------------------------------------------

#[test]
fn test_members_added_mid_enumeration_are_visited() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    let guard = ExecGuard::default();

    let first = {
        let binding = Binding::new(&memo, &guard);
        binding.extract_group(a, &Pattern::Leaf, None).unwrap().unwrap()
    };
    let added = memo.insert_into(a, get("a_copy", 1), vec![]);

    let binding = Binding::new(&memo, &guard);
    let next = binding
        .extract_group(a, &Pattern::Leaf, Some(&first))
        .unwrap()
        .expect("appended member");
    assert_eq!(next.expr_id, added);
}

#[test]
fn test_cancelled_binding_aborts() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    let guard = ExecGuard::default();
    guard.cancel_handle().cancel();
    let binding = Binding::new(&memo, &guard);
    assert_eq!(
        binding.extract_group(a, &Pattern::Leaf, None),
        Err(OptError::Cancelled)
    );
}

#[test]
fn test_depth_limit_aborts() {
    let mut memo = Memo::new();
    let (a, _) = memo.insert(get("a", 1), vec![]);
    let (b, _) = memo.insert(get("b", 2), vec![]);
    let pred = truth(&mut memo);
    let (j, _) = memo.insert(Operator::join(JoinType::Inner), vec![a, b, pred]);

    let guard = ExecGuard::new(1);
    let binding = Binding::new(&memo, &guard);
    assert_eq!(
        binding.extract_group(j, &join_leaves(), None),
        Err(OptError::DepthExceeded { limit: 1 })
    );
}
