//! # Xforms
//!
//! An xform is a named, pattern-guarded rewrite:
//!
//! - **Exploration** xforms produce logically equivalent logical expressions
//!   (join commutativity, reassociation, n-ary join expansion).
//! - **Implementation** xforms produce physical operators for a logical one.
//!
//! ## Applying an Xform
//!
//! 1. The driver asks each candidate for its [`Promise`] on a group expression.
//!    `Skip` drops it; the rest run `High` first, then by static priority.
//! 2. The xform's pattern is bound at the group expression through
//!    [`Binding`](crate::binding::Binding) and `transform` runs once per binding.
//!    This half only reads the memo and may run on worker threads.
//! 3. The alternatives are inserted into the originating group. Nested
//!    [`AltExpr::Node`]s become (or dedup into) their own groups, which later
//!    become exploration targets themselves.
//!
//! The memo remembers which xform fired on which expression so that no xform is
//! applied twice to the same expression (commutativity would otherwise loop).

use crate::binding::Binding;
use crate::catalog::Catalog;
use crate::config::SearchConfig;
use crate::context::OptContext;
use crate::error::Result;
use crate::expr::{Expression, Operator};
use crate::guard::ExecGuard;
use crate::memo::{ExprId, GroupId, Memo};
use crate::pattern::Pattern;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XformKind {
    /// Logical to logical.
    Exploration,
    /// Logical to physical.
    Implementation,
}

/// How worthwhile an xform is for a given expression. Totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Promise {
    Skip,
    Low,
    High,
}

/// An alternative produced by an xform: either an existing group or a new
/// operator over further alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltExpr {
    Group(GroupId),
    Node(Operator, Vec<AltExpr>),
}

impl AltExpr {
    pub fn node(op: Operator, children: Vec<AltExpr>) -> Self {
        AltExpr::Node(op, children)
    }

    /// New operator whose children are all existing groups.
    pub fn over_groups(op: Operator, children: &[GroupId]) -> Self {
        AltExpr::Node(op, children.iter().map(|&g| AltExpr::Group(g)).collect())
    }
}

/// A transformation rule.
pub trait Xform: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> XformKind;

    /// Shape an expression must have for `transform` to see it.
    fn pattern(&self) -> &Pattern;

    /// Tie-breaker between xforms of equal promise. Higher runs first.
    fn priority(&self) -> u32 {
        0
    }

    /// Cheap check evaluated on the group expression before any binding.
    fn promise(&self, _ctx: &OptContext, _expr: ExprId) -> Promise {
        Promise::Low
    }

    /// Produce alternatives for one bound expression.
    fn transform(&self, ctx: &OptContext, expr: &Expression) -> Result<Vec<AltExpr>>;

    fn xform_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name().hash(&mut hasher);
        hasher.finish()
    }
}

/// The set of xforms a search runs with.
#[derive(Default)]
pub struct XformRegistry {
    xforms: Vec<Box<dyn Xform>>,
}

impl XformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, xform: Box<dyn Xform>) {
        self.xforms.push(xform);
    }

    pub fn len(&self) -> usize {
        self.xforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Xform> {
        self.xforms.iter().map(|x| x.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Xform> {
        self.iter().find(|x| x.name() == name)
    }

    pub fn of_kind(&self, kind: XformKind) -> impl Iterator<Item = &dyn Xform> {
        self.iter().filter(move |x| x.kind() == kind)
    }

    /// Xforms of `kind` worth running on `expr`, best first: not disabled, not
    /// applied yet, root operator matches, promise above `Skip`.
    pub fn candidates<'r>(
        &'r self,
        ctx: &OptContext,
        expr: ExprId,
        kind: XformKind,
        config: &SearchConfig,
    ) -> Vec<(&'r dyn Xform, Promise)> {
        let gexpr = ctx.memo.expr(expr);
        let mut out: Vec<(&dyn Xform, Promise)> = self
            .of_kind(kind)
            .filter(|x| !config.is_disabled(x.name()))
            .filter(|x| !ctx.memo.xform_applied(expr, x.xform_hash()))
            .filter(|x| x.pattern().matches_shallow(&gexpr.op, gexpr.arity()))
            .map(|x| (x, x.promise(ctx, expr)))
            .filter(|(_, promise)| *promise != Promise::Skip)
            .collect();
        out.sort_by(|(a, pa), (b, pb)| pb.cmp(pa).then_with(|| b.priority().cmp(&a.priority())));
        out
    }
}

/// Bind `xform` at `expr` and collect every alternative. Read-only.
pub fn collect_alternatives(
    ctx: &OptContext,
    xform: &dyn Xform,
    expr: ExprId,
) -> Result<Vec<AltExpr>> {
    let binding = Binding::new(ctx.memo, ctx.guard);
    let mut out = Vec::new();
    let mut prev = None;
    while let Some(bound) = binding.extract(expr, xform.pattern(), prev.as_ref())? {
        ctx.guard.check(0)?;
        out.extend(xform.transform(ctx, &bound)?);
        prev = Some(bound);
    }
    Ok(out)
}

/// Insert alternatives into `group`. Returns the number of new group expressions
/// (including any created for nested nodes).
pub fn insert_alternatives(memo: &mut Memo, group: GroupId, alternatives: Vec<AltExpr>) -> usize {
    let before = memo.num_exprs();
    for alt in alternatives {
        match alt {
            AltExpr::Node(op, children) => {
                let children = children
                    .into_iter()
                    .map(|child| materialize(memo, child))
                    .collect();
                let expr = memo.insert_into(group, op, children);
                trace!("alternative expr {} in group {}", expr, group);
            }
            AltExpr::Group(g) => {
                trace!("alternative for group {} is group {}, nothing to insert", group, g);
            }
        }
    }
    memo.num_exprs() - before
}

fn materialize(memo: &mut Memo, alt: AltExpr) -> GroupId {
    match alt {
        AltExpr::Group(g) => g,
        AltExpr::Node(op, children) => {
            let children = children
                .into_iter()
                .map(|child| materialize(memo, child))
                .collect();
            memo.insert(op, children).0
        }
    }
}

/// Apply one xform to one group expression: bind, transform, record the
/// application and insert the results. Returns the number of new expressions.
pub fn apply_xform(
    memo: &mut Memo,
    catalog: &dyn Catalog,
    guard: &ExecGuard,
    xform: &dyn Xform,
    expr: ExprId,
) -> Result<usize> {
    let alternatives = {
        let ctx = OptContext::new(memo, catalog, guard);
        collect_alternatives(&ctx, xform, expr)?
    };
    memo.mark_xform_applied(expr, xform.xform_hash());
    let group = memo.expr(expr).group;
    let added = insert_alternatives(memo, group, alternatives);
    trace!("xform {} on expr {}: {} new expressions", xform.name(), expr, added);
    Ok(added)
}
