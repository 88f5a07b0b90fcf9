//! # Patterns
//!
//! Each xform declares a `Pattern`: the shape a bound expression must have before
//! the xform sees it. Binding (see [`crate::binding`]) walks the pattern and the
//! memo together and materializes every matching expression.
//!
//! ## Pattern Language
//!
//! - `Pattern::Operator(matcher, children)`: a concrete node. The group expression's
//!   operator must satisfy `matcher`, and its children are matched against the
//!   child patterns.
//! - `Pattern::Leaf`: any single operator. Binding stops here and returns the
//!   operator without children.
//! - `Pattern::MultiLeaf`: like `Leaf`, but as the *first* child of a concrete node
//!   it absorbs zero or more child positions.
//! - `Pattern::Tree`: any subtree, bound in full. Every child below it is matched
//!   against `Tree` again.
//! - `Pattern::MultiTree`: like `Tree`, absorbing zero or more positions.
//!
//! ## Expansion
//!
//! For a concrete node whose first child is a multi wildcard, every child position
//! except the last uses that first child pattern and the last position uses the
//! pattern's last child. So `NAryJoin(MultiLeaf, Tree)` binds all inputs of an n-ary
//! join as leaves and its trailing predicate as a full tree.

use crate::expr::{LogicalOpKind, Operator, PhysicalOpKind, ScalarOpKind};

/// Pattern for matching expressions in the memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Match an operator with child patterns.
    Operator(OpMatcher, Vec<Pattern>),
    /// Match any operator; do not expand children.
    Leaf,
    /// Zero or more leaves.
    MultiLeaf,
    /// Match any fully bound subtree.
    Tree,
    /// Zero or more fully bound subtrees.
    MultiTree,
}

/// Matcher for operator types (without data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMatcher {
    LogicalOp(LogicalOpKind),
    PhysicalOp(PhysicalOpKind),
    ScalarOp(ScalarOpKind),
    AnyLogical,
    AnyPhysical,
    AnyScalar,
}

impl OpMatcher {
    pub fn matches(&self, op: &Operator) -> bool {
        match (op, self) {
            (Operator::Logical(l), OpMatcher::LogicalOp(kind)) => l.kind() == *kind,
            (Operator::Physical(p), OpMatcher::PhysicalOp(kind)) => p.kind() == *kind,
            (Operator::Scalar(s), OpMatcher::ScalarOp(kind)) => s.kind() == *kind,
            (Operator::Logical(_), OpMatcher::AnyLogical) => true,
            (Operator::Physical(_), OpMatcher::AnyPhysical) => true,
            (Operator::Scalar(_), OpMatcher::AnyScalar) => true,
            _ => false,
        }
    }
}

impl Pattern {
    pub fn logical(kind: LogicalOpKind, children: Vec<Pattern>) -> Self {
        Pattern::Operator(OpMatcher::LogicalOp(kind), children)
    }

    pub fn scalar(kind: ScalarOpKind, children: Vec<Pattern>) -> Self {
        Pattern::Operator(OpMatcher::ScalarOp(kind), children)
    }

    /// `Join(Leaf, Leaf, Tree)`: a binary join with its predicate fully bound.
    pub fn join() -> Self {
        Self::logical(
            LogicalOpKind::Join,
            vec![Pattern::Leaf, Pattern::Leaf, Pattern::Tree],
        )
    }

    /// `Join(Join(Leaf, Leaf, Tree), Leaf, Tree)`.
    pub fn join_join_left() -> Self {
        Self::logical(
            LogicalOpKind::Join,
            vec![Self::join(), Pattern::Leaf, Pattern::Tree],
        )
    }

    /// `NAryJoin(MultiLeaf, Tree)`.
    pub fn nary_join() -> Self {
        Self::logical(
            LogicalOpKind::NAryJoin,
            vec![Pattern::MultiLeaf, Pattern::Tree],
        )
    }

    /// Match `kind` with all children as leaves. Only valid for fixed arity.
    pub fn with_leaves(kind: LogicalOpKind, arity: usize) -> Self {
        Self::logical(kind, vec![Pattern::Leaf; arity])
    }

    /// `Leaf` or `MultiLeaf`.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Pattern::Leaf | Pattern::MultiLeaf)
    }

    /// `Tree` or `MultiTree`.
    pub fn is_tree(&self) -> bool {
        matches!(self, Pattern::Tree | Pattern::MultiTree)
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Pattern::MultiLeaf | Pattern::MultiTree)
    }

    /// O(1) check of the root operator and the arity against this pattern node.
    pub fn matches_shallow(&self, op: &Operator, arity: usize) -> bool {
        match self {
            Pattern::Leaf | Pattern::MultiLeaf | Pattern::Tree | Pattern::MultiTree => true,
            Pattern::Operator(matcher, children) => {
                if !matcher.matches(op) {
                    return false;
                }
                match children.first() {
                    Some(first) if first.is_multi() => arity + 1 >= children.len(),
                    _ => arity == children.len(),
                }
            }
        }
    }

    /// The pattern to match against child position `pos` of a group expression
    /// with `arity` children.
    pub fn expand(&self, pos: usize, arity: usize) -> &Pattern {
        debug_assert!(pos < arity, "child position {} out of range for arity {}", pos, arity);
        match self {
            Pattern::Tree | Pattern::MultiTree => self,
            Pattern::Operator(_, children) => match children.first() {
                Some(first) if first.is_multi() => {
                    if pos + 1 == arity {
                        &children[children.len() - 1]
                    } else {
                        first
                    }
                }
                _ => &children[pos],
            },
            Pattern::Leaf | Pattern::MultiLeaf => {
                panic!("leaf pattern {:?} has no children to expand", self)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{JoinType, LogicalOp};

    #[test]
    fn test_shallow_match_checks_kind_and_arity() {
        let join = Operator::join(JoinType::Inner);
        assert!(Pattern::join().matches_shallow(&join, 3));
        assert!(!Pattern::join().matches_shallow(&join, 2));
        assert!(!Pattern::join().matches_shallow(&Operator::Logical(LogicalOp::Select), 3));
        assert!(Pattern::Leaf.matches_shallow(&join, 3));
    }

    #[test]
    fn test_multi_first_child_absorbs_positions() {
        let nary = Operator::Logical(LogicalOp::NAryJoin);
        let p = Pattern::nary_join();
        assert!(p.matches_shallow(&nary, 1));
        assert!(p.matches_shallow(&nary, 5));
        assert!(!p.matches_shallow(&nary, 0));

        assert_eq!(p.expand(0, 5), &Pattern::MultiLeaf);
        assert_eq!(p.expand(3, 5), &Pattern::MultiLeaf);
        assert_eq!(p.expand(4, 5), &Pattern::Tree);
    }

    #[test]
    fn test_tree_expands_to_itself() {
        assert_eq!(Pattern::Tree.expand(1, 3), &Pattern::Tree);
        assert_eq!(Pattern::MultiTree.expand(0, 1), &Pattern::MultiTree);
        assert_eq!(Pattern::join().expand(2, 3), &Pattern::Tree);
    }
}
