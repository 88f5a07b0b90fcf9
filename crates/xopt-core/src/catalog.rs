//! # Catalog Interface
//!
//! The catalog is the optimizer's metadata accessor. Property derivation asks it
//! about functions (volatility, data access, whether they return sets) and tables
//! (partitioning); statistics derivation asks it for table statistics.
//!
//! The `Catalog` trait is used behind `dyn Catalog` so that any metadata backend can
//! be plugged in. `InMemoryCatalog` is a HashMap-backed implementation populated
//! programmatically, used by tests and the CLI.

use crate::expr::{ColumnRef, TableRef};
use crate::properties::FunctionProps;
use crate::stats::Statistics;
use std::collections::{HashMap, HashSet};

/// Metadata lookups used during optimization.
pub trait Catalog: Send + Sync {
    fn get_table_stats(&self, table: &TableRef) -> Option<Statistics>;
    fn get_table_columns(&self, table: &TableRef) -> Option<Vec<ColumnRef>>;
    /// Attributes of a scalar function. `None` if the function is unknown, in
    /// which case callers assume the worst (volatile).
    fn function_props(&self, name: &str) -> Option<FunctionProps>;
    fn is_partitioned(&self, table: &TableRef) -> bool;
}

/// In-memory catalog for tests and the CLI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    /// Table statistics keyed by "schema.table".
    pub table_stats: HashMap<String, Statistics>,
    /// Column definitions keyed by "schema.table".
    pub table_columns: HashMap<String, Vec<ColumnRef>>,
    pub functions: HashMap<String, FunctionProps>,
    pub partitioned: HashSet<String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: &TableRef, columns: Vec<ColumnRef>, stats: Statistics) {
        let key = table.to_string();
        self.table_columns.insert(key.clone(), columns);
        self.table_stats.insert(key, stats);
    }

    pub fn add_function(&mut self, name: impl Into<String>, props: FunctionProps) {
        self.functions.insert(name.into(), props);
    }

    pub fn mark_partitioned(&mut self, table: &TableRef) {
        self.partitioned.insert(table.to_string());
    }
}

impl Catalog for InMemoryCatalog {
    fn get_table_stats(&self, table: &TableRef) -> Option<Statistics> {
        self.table_stats.get(&table.to_string()).cloned()
    }

    fn get_table_columns(&self, table: &TableRef) -> Option<Vec<ColumnRef>> {
        self.table_columns.get(&table.to_string()).cloned()
    }

    fn function_props(&self, name: &str) -> Option<FunctionProps> {
        self.functions.get(name).copied()
    }

    fn is_partitioned(&self, table: &TableRef) -> bool {
        self.partitioned.contains(&table.to_string())
    }
}
