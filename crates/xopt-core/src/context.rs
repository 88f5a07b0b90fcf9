//! Read-only view handed to property derivation, promise evaluation and xforms.

use crate::catalog::Catalog;
use crate::guard::ExecGuard;
use crate::memo::{GroupId, Memo};
use crate::properties::DerivedScalarProps;
use crate::relational::DerivedRelationalProps;

/// Everything a derivation routine or xform may look at.
///
/// The memo is borrowed immutably, so a context can be shared by rayon workers.
#[derive(Clone, Copy)]
pub struct OptContext<'a> {
    pub memo: &'a Memo,
    pub catalog: &'a dyn Catalog,
    pub guard: &'a ExecGuard,
}

impl<'a> OptContext<'a> {
    pub fn new(memo: &'a Memo, catalog: &'a dyn Catalog, guard: &'a ExecGuard) -> Self {
        Self {
            memo,
            catalog,
            guard,
        }
    }

    /// Scalar properties of a scalar group. Panics unless fully derived.
    pub fn derived_scalar(&self, group: GroupId) -> &'a DerivedScalarProps {
        let g = self.memo.group(group);
        assert!(g.is_scalar(), "group {} is not a scalar group", group);
        let props = self.memo.expr(g.exprs()[0]).scalar_props();
        assert!(
            props.is_complete(),
            "scalar properties of group {} used before derivation",
            group
        );
        props
    }

    /// Relational properties of a relational group. Panics unless fully derived.
    pub fn derived_relational(&self, group: GroupId) -> &'a DerivedRelationalProps {
        let props = self.memo.group(group).relational_props();
        assert!(
            props.is_complete(),
            "relational properties of group {} used before derivation",
            group
        );
        props
    }
}
