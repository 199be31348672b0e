// src/query/mod.rs
//! Column selection model and the select-query builder.
//!
//! Clause order is positional in the target dialect and is always
//! `select → from → where → group by → order by → limit`.

pub mod escape;
pub mod layer;
pub mod statements;

use escape::quote_literal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregation functions understood by the table service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn sql_name(self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
            Aggregate::Avg => "AVERAGE",
            Aggregate::Min => "MINIMUM",
            Aggregate::Max => "MAXIMUM",
        }
    }

    /// `FUNC('column')`
    pub fn call(self, column: &str) -> String {
        format!("{}({})", self.sql_name(), quote_literal(column))
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregate::Sum),
            "count" => Ok(Aggregate::Count),
            "avg" | "average" => Ok(Aggregate::Avg),
            "min" | "minimum" => Ok(Aggregate::Min),
            "max" | "maximum" => Ok(Aggregate::Max),
            other => Err(format!("unknown aggregate function '{}'", other)),
        }
    }
}

/// One selected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Client-side display pattern. Never part of the wire query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aggregate: None,
            rename: None,
            format: None,
        }
    }

    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn with_rename(mut self, rename: impl Into<String>) -> Self {
        self.rename = Some(rename.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    fn select_expr(&self) -> String {
        let mut expr = match self.aggregate {
            Some(agg) => agg.call(&self.name),
            None => quote_literal(&self.name),
        };
        if let Some(rename) = &self.rename {
            expr.push_str(" as ");
            expr.push_str(&quote_literal(rename));
        }
        expr
    }
}

/// Ordered set of selected columns, keyed by name. Insertion order is the
/// select order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnModel {
    columns: Vec<ColumnSpec>,
}

impl ColumnModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ColumnSpec>) -> Self {
        let mut model = Self::new();
        for spec in specs {
            model.insert(spec);
        }
        model
    }

    /// Insert or replace a column, keeping the original position on replace.
    pub fn insert(&mut self, spec: ColumnSpec) {
        match self.columns.iter_mut().find(|c| c.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.columns.push(spec),
        }
    }

    /// Add the column if absent, remove it if present. Returns whether the
    /// column is selected afterwards.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(pos) = self.position(name) {
            self.columns.remove(pos);
            false
        } else {
            self.columns.push(ColumnSpec::new(name));
            true
        }
    }

    /// Set or clear the display format. Returns false for unknown columns.
    pub fn set_format(&mut self, name: &str, format: Option<&str>) -> bool {
        match self.get_mut(name) {
            Some(col) => {
                col.format = format.filter(|f| !f.is_empty()).map(str::to_string);
                true
            }
            None => false,
        }
    }

    /// Set or clear the alias. Returns false for unknown columns.
    pub fn set_rename(&mut self, name: &str, rename: Option<&str>) -> bool {
        match self.get_mut(name) {
            Some(col) => {
                col.rename = rename.filter(|r| !r.is_empty()).map(str::to_string);
                true
            }
            None => false,
        }
    }

    /// Apply an aggregate; applying the one already set clears it.
    pub fn toggle_aggregate(&mut self, name: &str, aggregate: Aggregate) -> bool {
        match self.get_mut(name) {
            Some(col) => {
                col.aggregate = if col.aggregate == Some(aggregate) {
                    None
                } else {
                    Some(aggregate)
                };
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ColumnSpec> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The free-selection list, e.g. `'name', SUM('age') as 'total'`.
    pub fn select_clause(&self) -> String {
        self.columns
            .iter()
            .map(ColumnSpec::select_expr)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `{"col": {"format": "pattern"}, ...}` for columns carrying a format,
    /// keyed in selection order.
    pub fn format_options(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for col in &self.columns {
            if let Some(format) = &col.format {
                map.insert(
                    col.name.clone(),
                    serde_json::json!({ "format": format }),
                );
            }
        }
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

/// Everything needed to render one select query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Opaque table identifier, emitted unquoted.
    pub table: String,
    #[serde(default)]
    pub columns: ColumnModel,
    /// Raw WHERE fragment; passed through untouched.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub sum_by: Option<String>,
    #[serde(default)]
    pub sum_function: Aggregate,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>, columns: ColumnModel) -> Self {
        Self {
            table: table.into(),
            columns,
            ..Default::default()
        }
    }

    pub fn build(&self) -> String {
        build_select_query(self)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Render a request into a single query string.
///
/// A grouped query (both `group_by` and `sum_by` set) replaces the free
/// selection with `'<group>', FUNC('<sum>')`. Missing required fields are
/// not validated here.
pub fn build_select_query(request: &QueryRequest) -> String {
    let group_by = non_empty(&request.group_by);
    let sum_by = non_empty(&request.sum_by);

    let select = match (group_by, sum_by) {
        (Some(group), Some(sum)) => format!(
            "{}, {}",
            quote_literal(group),
            request.sum_function.call(sum)
        ),
        _ => request.columns.select_clause(),
    };

    let mut query = format!("select {} from {}", select, request.table);

    if let Some(filter) = non_empty(&request.filter) {
        query.push_str(" where ");
        query.push_str(filter);
    }

    if let Some(group) = group_by {
        query.push_str(" group by ");
        query.push_str(&quote_literal(group));
    }

    if let Some(order) = request.order_by.as_ref().filter(|o| !o.column.is_empty()) {
        let target = match request.columns.get(&order.column).and_then(|c| c.aggregate) {
            Some(agg) => agg.call(&order.column),
            None => quote_literal(&order.column),
        };
        query.push_str(" order by ");
        query.push_str(&target);
        if order.descending {
            query.push_str(" DESC");
        }
    }

    if let Some(limit) = request.limit.filter(|l| *l > 0) {
        query.push_str(&format!(" limit {}", limit));
    }

    query
}
