//! # Unary Implementations
//!
//! Operators with a single relational input map one-to-one onto physical
//! operators with the same children:
//!
//! | Logical   | Physical        |
//! |-----------|-----------------|
//! | `Select`  | `Filter`        |
//! | `Project` | `ComputeScalar` |
//! | `Limit`   | `Limit`         |

use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, LogicalOp, LogicalOpKind, Operator, PhysicalOp};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Xform, XformKind};

/// Same children, new operator.
fn substitute(op: PhysicalOp, expr: &Expression) -> Vec<AltExpr> {
    let children: Vec<_> = (0..expr.arity()).map(|i| expr.child_group(i)).collect();
    vec![AltExpr::over_groups(Operator::Physical(op), &children)]
}

/// `Select(input, pred) -> Filter(input, pred)`.
pub struct Select2Filter {
    pattern: Pattern,
}

impl Select2Filter {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Select, 2),
        }
    }
}

impl Default for Select2Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for Select2Filter {
    fn name(&self) -> &'static str {
        "Select2Filter"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        match &*expr.op {
            Operator::Logical(LogicalOp::Select) => Ok(substitute(PhysicalOp::Filter, expr)),
            _ => Ok(vec![]),
        }
    }
}

/// `Project(input, list) -> ComputeScalar(input, list)`.
pub struct Project2ComputeScalar {
    pattern: Pattern,
}

impl Project2ComputeScalar {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Project, 2),
        }
    }
}

impl Default for Project2ComputeScalar {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for Project2ComputeScalar {
    fn name(&self) -> &'static str {
        "Project2ComputeScalar"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        match &*expr.op {
            Operator::Logical(LogicalOp::Project) => {
                Ok(substitute(PhysicalOp::ComputeScalar, expr))
            }
            _ => Ok(vec![]),
        }
    }
}

/// `Limit(input) -> Limit(input)` with the same offset and count.
pub struct Limit2Limit {
    pattern: Pattern,
}

impl Limit2Limit {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Limit, 1),
        }
    }
}

impl Default for Limit2Limit {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for Limit2Limit {
    fn name(&self) -> &'static str {
        "Limit2Limit"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        match &*expr.op {
            Operator::Logical(LogicalOp::Limit { offset, count }) => Ok(substitute(
                PhysicalOp::Limit {
                    offset: *offset,
                    count: *count,
                },
                expr,
            )),
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use xopt_core::catalog::InMemoryCatalog;
    use xopt_core::guard::ExecGuard;
    use xopt_core::memo::Memo;
    use xopt_core::xform::apply_xform;

    #[test]
    fn test_select_and_limit_keep_children() {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        let pred = lt_const(&mut memo, ("a", 1), 5);
        let (s, select) = memo.insert(Operator::Logical(LogicalOp::Select), vec![a, pred]);
        let (l, limit) = memo.insert(
            Operator::Logical(LogicalOp::Limit {
                offset: 0,
                count: 10,
            }),
            vec![s],
        );
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();

        assert_eq!(
            apply_xform(&mut memo, &catalog, &guard, &Select2Filter::new(), select).unwrap(),
            1
        );
        assert_eq!(
            apply_xform(&mut memo, &catalog, &guard, &Limit2Limit::new(), limit).unwrap(),
            1
        );

        let filter = memo.group(s).physical_exprs(&memo).next().unwrap();
        assert_eq!(&*memo.expr(filter).op, &Operator::Physical(PhysicalOp::Filter));
        assert_eq!(memo.expr(filter).children, vec![a, pred]);

        let phys_limit = memo.group(l).physical_exprs(&memo).next().unwrap();
        assert_eq!(
            &*memo.expr(phys_limit).op,
            &Operator::Physical(PhysicalOp::Limit {
                offset: 0,
                count: 10
            })
        );
        assert_eq!(memo.expr(phys_limit).children, vec![s]);
    }

    #[test]
    fn test_wrong_operator_produces_nothing() {
        let mut memo = Memo::new();
        let a = get(&mut memo, "a", 1);
        let first = memo.group(a).exprs()[0];
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();
        // The pattern does not match, so binding yields no tree.
        assert_eq!(
            apply_xform(&mut memo, &catalog, &guard, &Project2ComputeScalar::new(), first)
                .unwrap(),
            0
        );
    }
}
