//! # Search Configuration
//!
//! Knobs that bound the search. `max_iterations` and `max_memo_groups` are soft
//! budgets: hitting them stops the current phase and the driver keeps whatever the
//! memo holds. `max_recursion_depth` is a hard limit enforced by the
//! [`ExecGuard`](crate::guard::ExecGuard) and surfaces as an error.

use crate::guard::DEFAULT_MAX_DEPTH;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper bound on the number of groups the memo may contain.
    pub max_memo_groups: usize,
    /// Upper bound on the total number of xform applications.
    pub max_iterations: usize,
    /// Deepest recursion allowed in binding and derivation.
    pub max_recursion_depth: usize,
    /// Compute xform alternatives on the rayon pool; inserts stay serial.
    pub parallel: bool,
    /// Xforms (by name) that must never fire.
    pub disabled_xforms: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_memo_groups: 100_000,
            max_iterations: 1_000_000,
            max_recursion_depth: DEFAULT_MAX_DEPTH,
            parallel: false,
            disabled_xforms: Vec::new(),
        }
    }
}

impl SearchConfig {
    pub fn is_disabled(&self, xform: &str) -> bool {
        self.disabled_xforms.iter().any(|name| name == xform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.max_memo_groups, 100_000);
        assert_eq!(config.max_iterations, 1_000_000);
        assert_eq!(config.max_recursion_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.parallel);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"parallel": true, "disabled_xforms": ["Join2NLJoin"]}"#)
                .unwrap();
        assert!(config.parallel);
        assert!(config.is_disabled("Join2NLJoin"));
        assert_eq!(config.max_iterations, 1_000_000);
    }
}
