//! # Cardinality Cost Model
//!
//! Weighted sum of CPU (rows touched) and memory (bytes held in hash tables):
//!
//! ```text
//! total_cost = cpu_weight * cpu_cost + memory_weight * memory_cost
//! ```
//!
//! Costs are additive: the local cost of the operator plus the accumulated costs
//! of its inputs.

use xopt_core::cost::{Cost, CostModel};
use xopt_core::expr::PhysicalOp;
use xopt_core::stats::Statistics;

#[derive(Debug, Clone)]
pub struct CardinalityCostModel {
    /// Weight for row processing.
    pub cpu_weight: f64,
    /// Weight for bytes buffered in hash tables.
    pub memory_weight: f64,
}

impl Default for CardinalityCostModel {
    fn default() -> Self {
        Self {
            cpu_weight: 1.0,
            memory_weight: 1.0,
        }
    }
}

impl CostModel for CardinalityCostModel {
    fn compute_cost(
        &self,
        op: &PhysicalOp,
        output: &Statistics,
        inputs: &[&Statistics],
        children_costs: &[Cost],
    ) -> Cost {
        let children_total: f64 = children_costs.iter().map(|c| c.total).sum();
        let rows = |i: usize| inputs.get(i).map_or(0.0, |s| s.row_count);

        let local_cost = match op {
            PhysicalOp::TableScan { .. } => self.cpu_weight * output.row_count,
            // Build on the right, probe with the left.
            PhysicalOp::HashJoin { .. } => {
                let build_bytes = inputs.get(1).map_or(0.0, |s| s.total_size_bytes);
                self.cpu_weight * (rows(0) + rows(1) + output.row_count)
                    + self.memory_weight * build_bytes
            }
            PhysicalOp::NLJoin { .. } => {
                self.cpu_weight * (rows(0) * rows(1) + output.row_count)
            }
            PhysicalOp::HashAgg { .. } => {
                self.cpu_weight * rows(0) + self.memory_weight * output.total_size_bytes
            }
            PhysicalOp::Filter | PhysicalOp::ComputeScalar => self.cpu_weight * rows(0),
            PhysicalOp::Limit { .. } => self.cpu_weight * output.row_count,
        };

        Cost::new(children_total + local_cost)
    }
}
