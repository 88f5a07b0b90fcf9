//! # Aggregate Implementation
//!
//! `GbAgg` maps onto a hash aggregate keyed by the grouping columns. Each input
//! row is hashed and routed to its bucket, where the aggregate accumulators are
//! updated. Works with any input ordering.
//!
//! **Cost trade-off**: O(n) CPU + O(groups) memory. An empty grouping list is a
//! scalar aggregate with a single bucket.

use xopt_core::context::OptContext;
use xopt_core::error::Result;
use xopt_core::expr::{Expression, LogicalOp, LogicalOpKind, Operator, PhysicalOp};
use xopt_core::pattern::Pattern;
use xopt_core::xform::{AltExpr, Xform, XformKind};

/// `GbAgg(input, aggs) -> HashAgg(input, aggs)`.
pub struct GbAgg2HashAgg {
    pattern: Pattern,
}

impl GbAgg2HashAgg {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_leaves(LogicalOpKind::GbAgg, 2),
        }
    }
}

impl Default for GbAgg2HashAgg {
    fn default() -> Self {
        Self::new()
    }
}

impl Xform for GbAgg2HashAgg {
    fn name(&self) -> &'static str {
        "GbAgg2HashAgg"
    }

    fn kind(&self) -> XformKind {
        XformKind::Implementation
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn transform(&self, _ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>> {
        let Operator::Logical(LogicalOp::GbAgg { group_by }) = &*expr.op else {
            return Ok(vec![]);
        };
        Ok(vec![AltExpr::over_groups(
            Operator::Physical(PhysicalOp::HashAgg {
                group_by: group_by.clone(),
            }),
            &[expr.child_group(0), expr.child_group(1)],
        )])
    }
}
