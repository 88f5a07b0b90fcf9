//! # Join-Graph Protocol
//!
//! A compact description of a join-reordering problem:
//!
//! - **Tables**: id, name, row count, size, and per-column NDV statistics
//! - **Joins**: equi-join conditions between pairs of tables
//!
//! All tables become inputs of one `NAryJoin` whose predicate is the conjunction of
//! the join edges. The search expands it greedily, explores around that order with
//! commutativity and associativity, and costs the result. The cheapest physical
//! plan is returned as a binary join tree over the table ids.
//!
//! Tables that no edge connects are joined with cross joins. Only inner joins can
//! be reordered; any other join type is rejected.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use xopt_core::catalog::{Catalog, InMemoryCatalog};
use xopt_core::config::SearchConfig;
use xopt_core::expr::*;
use xopt_core::memo::{GroupId, Memo};
use xopt_core::search::{CascadesSearch, PlanNode};
use xopt_core::stats::{ColumnStatistics, Statistics};
use xopt_xforms::default_xform_registry;

use crate::cost::CardinalityCostModel;
use crate::error::CliError;

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

/// A join graph: tables with statistics and the equi-join edges between them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGraphRequest {
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub joins: Vec<JoinEdge>,
}

/// A table in the join graph with its statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Unique identifier within the request (e.g. "t0").
    pub id: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub row_count: f64,
    /// Estimated total size in bytes; defaults to 100 bytes per row.
    #[serde(default)]
    pub size_bytes: Option<f64>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// Per-column statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    /// Number of distinct values.
    pub ndv: f64,
    #[serde(default)]
    pub null_fraction: f64,
    #[serde(default = "default_avg_size")]
    pub avg_size: f64,
}

fn default_schema() -> String {
    "default".to_string()
}

fn default_avg_size() -> f64 {
    8.0
}

/// An equi-join condition `left_table.left_column = right_table.right_column`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEdge {
    pub left_table_id: String,
    pub right_table_id: String,
    #[serde(default = "default_join_type")]
    pub join_type: String,
    pub left_column: String,
    pub right_column: String,
}

fn default_join_type() -> String {
    "INNER".to_string()
}

/// The optimized join tree and search statistics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGraphResponse {
    pub tree: JoinTreeNode,
    /// Total estimated cost of the chosen plan.
    pub cost: f64,
    /// Estimated output rows.
    pub rows: f64,
    pub memo_groups: usize,
    pub iterations: usize,
}

/// A node in the optimized join tree.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum JoinTreeNode {
    Leaf {
        #[serde(rename = "tableId")]
        table_id: String,
    },
    Join {
        /// `HASH` or `NESTED_LOOP`.
        algorithm: String,
        /// Equi-join conditions applied here, oriented left side first. Empty for
        /// a cross join.
        conditions: Vec<JoinCondition>,
        left: Box<JoinTreeNode>,
        right: Box<JoinTreeNode>,
    },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinCondition {
    pub left_column: String,
    pub right_column: String,
}

// ---------------------------------------------------------------------------
// Memo construction
// ---------------------------------------------------------------------------

/// A join graph loaded into a memo.
pub struct JoinGraphQuery {
    pub memo: Memo,
    pub catalog: InMemoryCatalog,
    pub root: GroupId,
    /// `Get` group of each table, keyed by table id.
    table_groups: HashMap<GroupId, String>,
    /// Owning table id and name of each column.
    columns: HashMap<ColId, (String, String)>,
}

impl JoinGraphQuery {
    /// Validate `req` and build the catalog plus `NAryJoin(tables.., edges)`.
    pub fn build(req: &JoinGraphRequest) -> Result<Self, CliError> {
        if req.tables.is_empty() {
            return Err(CliError::InvalidGraph("no tables".into()));
        }

        let mut memo = Memo::new();
        let mut catalog = InMemoryCatalog::new();
        let mut table_groups = HashMap::new();
        let mut by_id: HashMap<&str, (GroupId, HashMap<&str, ColumnRef>)> = HashMap::new();
        let mut columns = HashMap::new();
        let mut next_col: ColId = 1;

        for info in &req.tables {
            if by_id.contains_key(info.id.as_str()) {
                return Err(CliError::InvalidGraph(format!("duplicate table id {}", info.id)));
            }
            let table = TableRef::new(info.schema.clone(), info.name.clone());
            let size = info.size_bytes.unwrap_or(info.row_count * 100.0);
            let mut stats = Statistics::new(info.row_count, size);
            let mut refs = Vec::with_capacity(info.columns.len());
            let mut named = HashMap::new();
            for col in &info.columns {
                let column = ColumnRef::new(next_col, Some(info.name.as_str()), col.name.clone());
                next_col += 1;
                stats = stats.with_column(
                    column.id,
                    ColumnStatistics {
                        distinct_count: col.ndv,
                        null_fraction: col.null_fraction,
                        avg_size: col.avg_size,
                    },
                );
                columns.insert(column.id, (info.id.clone(), col.name.clone()));
                named.insert(col.name.as_str(), column.clone());
                refs.push(column);
            }
            catalog.add_table(&table, refs.clone(), stats);
            let (group, _) = memo.insert(Operator::get(table, refs), vec![]);
            table_groups.insert(group, info.id.clone());
            by_id.insert(info.id.as_str(), (group, named));
        }

        let mut conjuncts = Vec::with_capacity(req.joins.len());
        for edge in &req.joins {
            if !edge.join_type.eq_ignore_ascii_case("INNER") {
                return Err(CliError::InvalidGraph(format!(
                    "join {} - {} is {}; only INNER joins can be reordered",
                    edge.left_table_id, edge.right_table_id, edge.join_type
                )));
            }
            let left = lookup_column(&by_id, &edge.left_table_id, &edge.left_column)?;
            let right = lookup_column(&by_id, &edge.right_table_id, &edge.right_column)?;
            let (l, _) = memo.insert(Operator::ident(left), vec![]);
            let (r, _) = memo.insert(Operator::ident(right), vec![]);
            let (eq, _) = memo.insert(Operator::binary(BinaryOp::Eq), vec![l, r]);
            conjuncts.push(eq);
        }
        let predicate = match conjuncts.len() {
            0 => memo.insert(Operator::constant(ScalarValue::Bool(true)), vec![]).0,
            1 => conjuncts[0],
            _ => memo.insert(Operator::Scalar(ScalarOp::And), conjuncts).0,
        };

        let mut children: Vec<GroupId> = req
            .tables
            .iter()
            .map(|t| by_id[t.id.as_str()].0)
            .collect();
        children.push(predicate);
        let (root, _) = memo.insert(Operator::Logical(LogicalOp::NAryJoin), children);
        debug!(
            "join graph: {} tables, {} edges, root group {}",
            req.tables.len(),
            req.joins.len(),
            root
        );

        Ok(Self {
            memo,
            catalog,
            root,
            table_groups,
            columns,
        })
    }
}

fn lookup_column(
    by_id: &HashMap<&str, (GroupId, HashMap<&str, ColumnRef>)>,
    table_id: &str,
    column: &str,
) -> Result<ColumnRef, CliError> {
    let (_, columns) = by_id
        .get(table_id)
        .ok_or_else(|| CliError::InvalidGraph(format!("unknown table id {}", table_id)))?;
    columns
        .get(column)
        .cloned()
        .ok_or_else(|| CliError::InvalidGraph(format!("table {} has no column {}", table_id, column)))
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

/// Optimize the join order of `req`. With a `timeout`, a timer thread cancels the
/// search once it elapses.
pub fn optimize_join_graph(
    req: &JoinGraphRequest,
    config: SearchConfig,
    timeout: Option<Duration>,
) -> Result<JoinGraphResponse, CliError> {
    let JoinGraphQuery {
        memo,
        catalog,
        root,
        table_groups,
        columns,
    } = JoinGraphQuery::build(req)?;

    let catalog: Arc<dyn Catalog> = Arc::new(catalog);
    let mut search = CascadesSearch::new(memo, Arc::new(default_xform_registry()), catalog, config);

    if let Some(timeout) = timeout {
        let handle = search.cancel_handle();
        thread::spawn(move || {
            thread::sleep(timeout);
            handle.cancel();
        });
    }

    let plan = search
        .optimize(root, &CardinalityCostModel::default())?
        .ok_or(CliError::NoPlan)?;
    info!(
        "optimized {} tables: cost {:.1}, {} groups, {} iterations",
        req.tables.len(),
        plan.cost.total,
        search.memo.num_groups(),
        search.iterations()
    );
    debug!("physical plan:\n{}", plan.explain());

    let converter = PlanConverter {
        memo: &search.memo,
        table_groups: &table_groups,
        columns: &columns,
    };
    let (tree, _) = converter.convert(&plan)?;

    Ok(JoinGraphResponse {
        tree,
        cost: plan.cost.total,
        rows: plan.rows,
        memo_groups: search.memo.num_groups(),
        iterations: search.iterations(),
    })
}

// ---------------------------------------------------------------------------
// Plan → response conversion
// ---------------------------------------------------------------------------

struct PlanConverter<'a> {
    memo: &'a Memo,
    table_groups: &'a HashMap<GroupId, String>,
    columns: &'a HashMap<ColId, (String, String)>,
}

impl PlanConverter<'_> {
    /// The join tree under `plan` and the table ids it covers.
    fn convert(&self, plan: &PlanNode) -> Result<(JoinTreeNode, BTreeSet<String>), CliError> {
        match &plan.op {
            PhysicalOp::TableScan { table, .. } => {
                let table_id = self
                    .table_groups
                    .get(&plan.group)
                    .cloned()
                    .unwrap_or_else(|| table.name.clone());
                let covered = BTreeSet::from([table_id.clone()]);
                Ok((JoinTreeNode::Leaf { table_id }, covered))
            }
            PhysicalOp::HashJoin { .. } | PhysicalOp::NLJoin { .. } => {
                let [left_plan, right_plan] = plan.children.as_slice() else {
                    return Err(CliError::UnexpectedOperator(format!(
                        "join with {} inputs",
                        plan.children.len()
                    )));
                };
                let (left, left_tables) = self.convert(left_plan)?;
                let (right, right_tables) = self.convert(right_plan)?;
                let predicate = self.memo.expr(plan.expr).children[2];
                let conditions = self.conditions(predicate, &left_tables);

                let algorithm = match plan.op {
                    PhysicalOp::HashJoin { .. } => "HASH",
                    _ => "NESTED_LOOP",
                };
                let covered = left_tables.union(&right_tables).cloned().collect();
                Ok((
                    JoinTreeNode::Join {
                        algorithm: algorithm.to_string(),
                        conditions,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    covered,
                ))
            }
            // A single table comes back as a filter on `TRUE` over its scan.
            PhysicalOp::Filter if plan.children.len() == 1 => self.convert(&plan.children[0]),
            other => Err(CliError::UnexpectedOperator(
                Operator::Physical(other.clone()).to_string(),
            )),
        }
    }

    /// Equi conditions of `predicate`, with the column from `left_tables` first.
    fn conditions(&self, predicate: GroupId, left_tables: &BTreeSet<String>) -> Vec<JoinCondition> {
        self.memo
            .conjuncts(predicate)
            .into_iter()
            .filter_map(|c| self.memo.equi_join_columns(c))
            .filter_map(|(a, b)| {
                let (a_table, a_name) = self.columns.get(&a)?;
                let (b_table, b_name) = self.columns.get(&b)?;
                let a_column = format!("{}.{}", a_table, a_name);
                let b_column = format!("{}.{}", b_table, b_name);
                let (left_column, right_column) = if left_tables.contains(a_table) {
                    (a_column, b_column)
                } else {
                    (b_column, a_column)
                };
                Some(JoinCondition {
                    left_column,
                    right_column,
                })
            })
            .collect()
    }
}
