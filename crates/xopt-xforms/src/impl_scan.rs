//! # Scan Implementation
//!
//! `Get` has exactly one physical form: a full scan of the table producing the
//! same columns. Partitioned tables still scan as one operator; the partition
//! information is a derived property consumers can inspect separately.

use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, LogicalOp, LogicalOpKind, Operator, PhysicalOp};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Xform, XformKind};

/// `Get(t) -> TableScan(t)`.
pub struct Get2TableScan {
    pattern: Pattern,
}

impl Get2TableScan {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::Get, 0),
        }
    }
}

impl Default for Get2TableScan {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for Get2TableScan {
    fn name(&self) -> &'static str {
        "Get2TableScan"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let Operator::Logical(LogicalOp::Get { table, columns }) = &*expr.op else {
            return Ok(vec![]);
        };
        Ok(vec![AltExpr::node(
            Operator::Physical(PhysicalOp::TableScan {
                table: table.clone(),
                columns: columns.clone(),
            }),
            vec![],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::get;
    use xopt_core::catalog::InMemoryCatalog;
    use xopt_core::expr::TableRef;
    use xopt_core::guard::ExecGuard;
    use xopt_core::memo::Memo;
    use xopt_core::xform::apply_xform;

    #[test]
    fn test_get_becomes_table_scan() {
        let mut memo = Memo::new();
        let g = get(&mut memo, "orders", 1);
        let first = memo.group(g).exprs()[0];
        let catalog = InMemoryCatalog::new();
        let guard = ExecGuard::default();

        let added = apply_xform(&mut memo, &catalog, &guard, &Get2TableScan::new(), first).unwrap();
        assert_eq!(added, 1);

        let scans: Vec<_> = memo.group(g).physical_exprs(&memo).collect();
        assert_eq!(scans.len(), 1);
        match &*memo.expr(scans[0]).op {
            Operator::Physical(PhysicalOp::TableScan { table, columns }) => {
                assert_eq!(table, &TableRef::new("s", "orders"));
                assert_eq!(columns.len(), 1);
            }
            other => panic!("expected a table scan, got {}", other),
        }
    }
}
