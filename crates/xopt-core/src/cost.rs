//! # Cost Interface
//!
//! The core does not ship cost formulas. A driver plugs in a [`CostModel`] and the
//! search asks it for the cost of each physical group expression once the costs of
//! its relational inputs are known.
//!
//! Costs are additive: a model returns the local cost of the operator plus the
//! accumulated cost of its children. The cheapest physical expression of a group
//! wins.

use crate::expr::PhysicalOp;
use crate::stats::Statistics;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single comparable cost value. Lower is better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    /// `f64::MAX` marks an infeasible or not-yet-costed plan.
    pub total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self { total: 0.0 }
    }

    pub fn new(total: f64) -> Self {
        Self { total }
    }

    pub fn infinite() -> Self {
        Self { total: f64::MAX }
    }

    pub fn is_infinite(&self) -> bool {
        self.total == f64::MAX
    }
}

/// Epsilon-based equality to absorb floating-point noise.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.total.partial_cmp(&other.total)
    }
}

/// Pluggable cost model.
pub trait CostModel: Send + Sync {
    /// Cost of `op` producing `output`, given the statistics and accumulated
    /// costs of its relational inputs (in child order).
    fn compute_cost(
        &self,
        op: &PhysicalOp,
        output: &Statistics,
        inputs: &[&Statistics],
        children_costs: &[Cost],
    ) -> Cost;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_ordering() {
        assert!(Cost::new(1.0) < Cost::new(2.0));
        assert_eq!(Cost::new(3.0), Cost::new(3.0));
        assert!(Cost::infinite().is_infinite());
        assert!(Cost::zero() < Cost::infinite());
    }
}
