//! # Cascades Search Driver
//!
//! Drives the memo through two phases, each run to a fixpoint:
//!
//! 1. **Explore**: apply exploration xforms (logical to logical) until no xform
//!    produces a new group expression. Alternatives land in the group of the
//!    expression they were derived from; new child groups they create are picked up
//!    in the next round.
//! 2. **Implement**: same loop with implementation xforms (logical to physical).
//!
//! A round derives properties for every group that lacks them, collects the
//! `(expression, xform)` pairs not applied yet (best promise first), computes the
//! alternatives read-only, optionally on the rayon pool, and then inserts them one
//! task at a time. The memo is only ever mutated from the driver thread.
//!
//! Plan extraction costs the physical members of each reachable group bottom-up
//! with a caller-supplied [`CostModel`] and keeps the cheapest one per group.
//!
//! ## Termination
//!
//! A phase ends at its fixpoint, or when `max_iterations` or `max_memo_groups` is
//! hit; budgets stop the loop quietly and leave the memo as it is. The group budget
//! is checked after each application's inserts, so the memo can end up larger by
//! the groups of one application. Cancellation and recursion limits surface as
//! [`OptError`](crate::error::OptError).

use crate::catalog::Catalog;
use crate::config::SearchConfig;
use crate::context::OptContext;
use crate::cost::{Cost, CostModel};
use crate::error::Result;
use crate::expr::{Operator, PhysicalOp};
use crate::guard::{CancelHandle, ExecGuard};
use crate::memo::{ExprId, GroupId, Memo};
use crate::stats::{self, Statistics};
use crate::xform::{self, AltExpr, Xform, XformKind, XformRegistry};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// One node of the chosen physical plan.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub op: PhysicalOp,
    pub group: GroupId,
    pub expr: ExprId,
    /// Relational inputs in child order.
    pub children: Vec<PlanNode>,
    pub cost: Cost,
    /// Estimated output rows.
    pub rows: f64,
}

impl PlanNode {
    /// Indented one-operator-per-line rendering.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, indent: usize) {
        out.push_str(&format!(
            "{:indent$}{} (rows={:.0}, cost={:.1})\n",
            "",
            Operator::Physical(self.op.clone()),
            self.rows,
            self.cost.total,
            indent = indent * 2
        ));
        for child in &self.children {
            child.explain_into(out, indent + 1);
        }
    }
}

/// The Cascades search engine.
pub struct CascadesSearch {
    pub memo: Memo,
    registry: Arc<XformRegistry>,
    catalog: Arc<dyn Catalog>,
    pub config: SearchConfig,
    guard: ExecGuard,
    /// Xform applications so far, across both phases.
    iterations: usize,
}

impl CascadesSearch {
    pub fn new(
        memo: Memo,
        registry: Arc<XformRegistry>,
        catalog: Arc<dyn Catalog>,
        config: SearchConfig,
    ) -> Self {
        let guard = ExecGuard::new(config.max_recursion_depth);
        Self {
            memo,
            registry,
            catalog,
            config,
            guard,
            iterations: 0,
        }
    }

    /// Handle that aborts the search from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.guard.cancel_handle()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn context(&self) -> OptContext<'_> {
        OptContext::new(&self.memo, self.catalog.as_ref(), &self.guard)
    }

    /// Derive scalar and relational properties of every group that is not
    /// complete yet. Group id order is bottom-up: a group's first member only
    /// references groups created before it.
    pub fn derive_properties(&self) -> Result<()> {
        let ctx = self.context();
        for group in self.memo.groups() {
            self.guard.check(0)?;
            if group.is_scalar() {
                let first = group.exprs()[0];
                self.memo.expr(first).scalar_props().derive(&ctx, first)?;
            } else if group.logical_exprs(&self.memo).next().is_some() {
                group.relational_props().derive(&ctx, group.id)?;
            }
        }
        Ok(())
    }

    /// Run exploration xforms over everything reachable from `root`.
    pub fn explore(&mut self, root: GroupId) -> Result<()> {
        self.run_phase(root, XformKind::Exploration)
    }

    /// Run implementation xforms over everything reachable from `root`.
    pub fn implement(&mut self, root: GroupId) -> Result<()> {
        self.run_phase(root, XformKind::Implementation)
    }

    /// Explore, implement, extract the cheapest plan and close the memo.
    pub fn optimize(&mut self, root: GroupId, cost_model: &dyn CostModel) -> Result<Option<PlanNode>> {
        debug!(
            "starting search: root group {}, {} groups, {} exprs",
            root,
            self.memo.num_groups(),
            self.memo.num_exprs()
        );
        self.explore(root)?;
        self.implement(root)?;
        let plan = self.best_plan(root, cost_model)?;
        self.memo.close();
        match plan {
            Some(ref p) => debug!(
                "search complete: cost {:.1}, {} iterations, {} groups",
                p.cost.total,
                self.iterations,
                self.memo.num_groups()
            ),
            None => debug!("search complete: no physical plan for group {}", root),
        }
        Ok(plan)
    }

    fn run_phase(&mut self, root: GroupId, kind: XformKind) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let mut round = 0;
        loop {
            self.guard.check(0)?;
            self.derive_properties()?;

            let mut tasks = self.collect_tasks(&registry, root, kind);
            if tasks.is_empty() {
                debug!("{:?} reached fixpoint after {} rounds", kind, round);
                return Ok(());
            }
            let budget = self.config.max_iterations.saturating_sub(self.iterations);
            let exhausted = tasks.len() >= budget;
            tasks.truncate(budget);

            let results = self.compute_alternatives(&tasks);

            let mut added = 0;
            for ((expr, x), alternatives) in tasks.into_iter().zip(results) {
                let alternatives = alternatives?;
                self.memo.mark_xform_applied(expr, x.xform_hash());
                let group = self.memo.expr(expr).group;
                let n = xform::insert_alternatives(&mut self.memo, group, alternatives);
                trace!("{} on expr {} in group {}: {} new exprs", x.name(), expr, group, n);
                added += n;
                self.iterations += 1;
                if self.memo.num_groups() >= self.config.max_memo_groups {
                    debug!("hit memo group limit ({})", self.config.max_memo_groups);
                    return Ok(());
                }
            }
            round += 1;
            if exhausted {
                debug!("hit iteration limit ({})", self.config.max_iterations);
                return Ok(());
            }
            if added == 0 {
                debug!("{:?} reached fixpoint after {} rounds", kind, round);
                return Ok(());
            }
        }
    }

    fn collect_tasks<'r>(
        &self,
        registry: &'r XformRegistry,
        root: GroupId,
        kind: XformKind,
    ) -> Vec<(ExprId, &'r dyn Xform)> {
        let ctx = self.context();
        let mut tasks = Vec::new();
        for group in self.reachable(root) {
            let members: Vec<ExprId> = self.memo.group(group).logical_exprs(&self.memo).collect();
            for expr in members {
                for (x, _) in registry.candidates(&ctx, expr, kind, &self.config) {
                    tasks.push((expr, x));
                }
            }
        }
        tasks
    }

    fn compute_alternatives(&self, tasks: &[(ExprId, &dyn Xform)]) -> Vec<Result<Vec<AltExpr>>> {
        let ctx = self.context();
        if self.config.parallel {
            tasks
                .par_iter()
                .map(|&(expr, x)| xform::collect_alternatives(&ctx, x, expr))
                .collect()
        } else {
            tasks
                .iter()
                .map(|&(expr, x)| xform::collect_alternatives(&ctx, x, expr))
                .collect()
        }
    }

    /// Relational groups reachable from `root`, ascending.
    fn reachable(&self, root: GroupId) -> BTreeSet<GroupId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(g) = stack.pop() {
            if self.memo.group(g).is_scalar() || !seen.insert(g) {
                continue;
            }
            for &expr in self.memo.group(g).exprs() {
                stack.extend(self.memo.expr(expr).children.iter().copied());
            }
        }
        seen
    }

    /// Cheapest physical plan for `root` under `cost_model`.
    pub fn best_plan(&self, root: GroupId, cost_model: &dyn CostModel) -> Result<Option<PlanNode>> {
        let mut cache = HashMap::new();
        let mut visiting = HashSet::new();
        self.best_for_group(root, cost_model, &mut cache, &mut visiting, 0)
    }

    fn best_for_group(
        &self,
        group: GroupId,
        cost_model: &dyn CostModel,
        cache: &mut HashMap<GroupId, Option<PlanNode>>,
        visiting: &mut HashSet<GroupId>,
        depth: usize,
    ) -> Result<Option<PlanNode>> {
        self.guard.check(depth)?;
        if let Some(done) = cache.get(&group) {
            return Ok(done.clone());
        }
        // A group reached again below itself cannot contribute a finite plan.
        if !visiting.insert(group) {
            return Ok(None);
        }

        let memo = &self.memo;
        let catalog = self.catalog.as_ref();
        let output = stats::group_stats(memo, catalog, group);
        let mut best: Option<PlanNode> = None;

        'members: for expr in memo.group(group).physical_exprs(memo) {
            let gexpr = memo.expr(expr);
            let Operator::Physical(op) = &*gexpr.op else {
                continue;
            };
            let mut children = Vec::new();
            for &child in &gexpr.children {
                if memo.group(child).is_scalar() {
                    continue;
                }
                match self.best_for_group(child, cost_model, cache, visiting, depth + 1)? {
                    Some(plan) => children.push(plan),
                    None => continue 'members,
                }
            }
            let inputs: Vec<&Statistics> = children
                .iter()
                .map(|c| stats::group_stats(memo, catalog, c.group))
                .collect();
            let child_costs: Vec<Cost> = children.iter().map(|c| c.cost).collect();
            let cost = cost_model.compute_cost(op, output, &inputs, &child_costs);
            trace!("group {} expr {} ({}): cost {:.1}", group, expr, gexpr.op, cost.total);

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(PlanNode {
                    op: op.clone(),
                    group,
                    expr,
                    children,
                    cost,
                    rows: output.row_count,
                });
            }
        }

        visiting.remove(&group);
        cache.insert(group, best.clone());
        Ok(best)
    }
}
