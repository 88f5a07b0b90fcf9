//! # Binding Extraction
//!
//! Binding turns the compact memo representation back into concrete trees: given a
//! group (or one group expression) and a [`Pattern`], it produces, one at a time,
//! every [`Expression`] that matches.
//!
//! The cursor is restartable and keeps no state between calls. The caller passes the
//! previously returned expression back in, and that expression already carries
//! everything needed to resume: the group expression chosen at each node (and so its
//! position in the group) plus the child expressions chosen below it.
//!
//! ```text
//! let mut prev = None;
//! while let Some(expr) = binding.extract_group(group, &pattern, prev.as_ref())? {
//!     // use expr
//!     prev = Some(expr);
//! }
//! ```
//!
//! ## Enumeration Order
//!
//! Within a group, members are visited in insertion order. Relational groups only
//! bind logical members. For one group expression the child cursors form an
//! odometer: the rightmost child advances fastest, children to its left are reused
//! as-is, and a child that runs out is reset to its first match while its left
//! neighbour advances.
//!
//! ## Scalar Groups
//!
//! A scalar group produces at most one binding per pattern instance: once a binding
//! was returned from a scalar group the next call ends. This assumes all members of
//! a scalar group are equivalent, which holds as long as xforms only add scalar
//! expressions that are semantically equal to the ones already there.

use crate::error::Result;
use crate::expr::Expression;
use crate::guard::ExecGuard;
use crate::memo::{ExprId, GroupId, Memo};
use crate::pattern::Pattern;
use std::sync::Arc;

/// Read-only extraction cursor over a memo.
pub struct Binding<'a> {
    memo: &'a Memo,
    guard: &'a ExecGuard,
}

impl<'a> Binding<'a> {
    pub fn new(memo: &'a Memo, guard: &'a ExecGuard) -> Self {
        Self { memo, guard }
    }

    /// Next binding of `pattern` in `group` after `prev`, or `None` when exhausted.
    pub fn extract_group(
        &self,
        group: GroupId,
        pattern: &Pattern,
        prev: Option<&Arc<Expression>>,
    ) -> Result<Option<Arc<Expression>>> {
        self.next_in_group(group, pattern, prev, 0)
    }

    /// Next binding of `pattern` rooted at the group expression `expr`.
    pub fn extract(
        &self,
        expr: ExprId,
        pattern: &Pattern,
        prev: Option<&Arc<Expression>>,
    ) -> Result<Option<Arc<Expression>>> {
        self.next_in_expr(expr, pattern, prev, 0)
    }

    /// Every binding of `pattern` rooted at `expr`, in cursor order.
    pub fn all(&self, expr: ExprId, pattern: &Pattern) -> Result<Vec<Arc<Expression>>> {
        let mut out = Vec::new();
        let mut prev: Option<Arc<Expression>> = None;
        while let Some(next) = self.extract(expr, pattern, prev.as_ref())? {
            out.push(Arc::clone(&next));
            prev = Some(next);
        }
        Ok(out)
    }

    fn next_in_group(
        &self,
        group_id: GroupId,
        pattern: &Pattern,
        prev: Option<&Arc<Expression>>,
        depth: usize,
    ) -> Result<Option<Arc<Expression>>> {
        self.guard.check(depth)?;
        let group = self.memo.group(group_id);

        let (start, mut resume) = match prev {
            None => (0, None),
            Some(_) if group.is_scalar() => return Ok(None),
            Some(p) => {
                assert_eq!(
                    p.group_id, group_id,
                    "binding of expression {} resumed in group {}",
                    p.expr_id, group_id
                );
                (self.memo.expr(p.expr_id).pos, Some(p))
            }
        };

        // Members appended after this point are picked up by a later call.
        let members = group.exprs();
        for &expr_id in &members[start..] {
            let resume_here = resume.take();
            if !group.is_scalar() && !self.memo.expr(expr_id).op.is_logical() {
                continue;
            }
            if let Some(found) = self.next_in_expr(expr_id, pattern, resume_here, depth + 1)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn next_in_expr(
        &self,
        expr_id: ExprId,
        pattern: &Pattern,
        prev: Option<&Arc<Expression>>,
        depth: usize,
    ) -> Result<Option<Arc<Expression>>> {
        self.guard.check(depth)?;
        let gexpr = self.memo.expr(expr_id);
        let arity = gexpr.arity();

        if !pattern.matches_shallow(&gexpr.op, arity) {
            return Ok(None);
        }

        let node = |children: Vec<Arc<Expression>>| {
            Arc::new(Expression {
                op: Arc::clone(&gexpr.op),
                expr_id,
                group_id: gexpr.group,
                children,
            })
        };

        if pattern.is_leaf() {
            return Ok(match prev {
                None => Some(node(Vec::new())),
                Some(_) => None,
            });
        }

        let Some(prev) = prev else {
            let mut children = Vec::with_capacity(arity);
            for (pos, &child) in gexpr.children.iter().enumerate() {
                let child_pattern = pattern.expand(pos, arity);
                match self.next_in_group(child, child_pattern, None, depth + 1)? {
                    Some(bound) => children.push(bound),
                    None => return Ok(None),
                }
            }
            return Ok(Some(node(children)));
        };

        assert_eq!(
            prev.expr_id, expr_id,
            "binding of expression {} resumed at expression {}",
            prev.expr_id, expr_id
        );
        assert_eq!(
            prev.children.len(),
            arity,
            "previous binding of expression {} has wrong arity",
            expr_id
        );

        let mut children = prev.children.clone();
        for pos in (0..arity).rev() {
            let child = gexpr.children[pos];
            let child_pattern = pattern.expand(pos, arity);
            if let Some(next) =
                self.next_in_group(child, child_pattern, Some(&children[pos]), depth + 1)?
            {
                children[pos] = next;
                return Ok(Some(node(children)));
            }
            // Wrap this digit around and carry into the left neighbour.
            match self.next_in_group(child, child_pattern, None, depth + 1)? {
                Some(first) => children[pos] = first,
                None => return Ok(None),
            }
        }
        Ok(None)
    }
}
