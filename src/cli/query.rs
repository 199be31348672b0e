// src/cli/query.rs

use crate::error::SyncResult;
use crate::query::layer::{combine_filters, contains_ignoring_case, distinct_values_query};
use crate::query::{Aggregate, ColumnModel, ColumnSpec, OrderBy, QueryRequest};
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Table identifier
    #[arg(long)]
    pub table: String,
    /// `name[:aggregate][=alias]`, repeatable
    #[arg(long = "column", value_parser = parse_column)]
    pub columns: Vec<ColumnSpec>,
    /// Raw WHERE fragment
    #[arg(long)]
    pub filter: Option<String>,
    /// `COLUMN=TEXT`, case-insensitive substring match
    #[arg(long, value_parser = parse_search)]
    pub search: Option<(String, String)>,
    #[arg(long)]
    pub group_by: Option<String>,
    #[arg(long)]
    pub sum_by: Option<String>,
    #[arg(long, default_value = "sum")]
    pub sum_fn: Aggregate,
    #[arg(long)]
    pub order_by: Option<String>,
    #[arg(long)]
    pub desc: bool,
    #[arg(long)]
    pub limit: Option<u32>,
    /// List the distinct values of COLUMN with their counts instead
    #[arg(long, value_name = "COLUMN")]
    pub distinct: Option<String>,
}

/// Parse `name[:aggregate][=alias]`.
pub fn parse_column(arg: &str) -> Result<ColumnSpec, String> {
    let (head, alias) = match arg.split_once('=') {
        Some((head, alias)) => (head, Some(alias)),
        None => (arg, None),
    };
    let (name, aggregate) = match head.rsplit_once(':') {
        Some((name, agg)) => (name, Some(agg.parse::<Aggregate>()?)),
        None => (head, None),
    };
    if name.trim().is_empty() {
        return Err(format!("column argument '{}' has no name", arg));
    }
    let mut spec = ColumnSpec::new(name.trim());
    spec.aggregate = aggregate;
    spec.rename = alias.map(str::trim).filter(|a| !a.is_empty()).map(str::to_string);
    Ok(spec)
}

fn parse_search(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(c, t)| (c.to_string(), t.to_string()))
        .ok_or_else(|| format!("expected COLUMN=TEXT, got '{}'", arg))
}

impl QueryArgs {
    fn filter(&self) -> Option<String> {
        let search = self
            .search
            .as_ref()
            .map(|(column, text)| contains_ignoring_case(column, text));
        combine_filters(self.filter.as_deref(), search.as_deref())
    }

    pub fn to_request(&self) -> QueryRequest {
        let mut request = QueryRequest::new(
            self.table.clone(),
            ColumnModel::from_specs(self.columns.iter().cloned()),
        );
        request.filter = self.filter();
        request.group_by = self.group_by.clone();
        request.sum_by = self.sum_by.clone();
        request.sum_function = self.sum_fn;
        request.order_by = self.order_by.clone().map(|column| OrderBy {
            column,
            descending: self.desc,
        });
        request.limit = self.limit;
        request
    }

    /// The query to print: the distinct-values listing when `--distinct`
    /// is given, the select query otherwise.
    pub fn to_sql(&self) -> String {
        match self.distinct.as_deref() {
            Some(column) => distinct_values_query(&self.table, column, self.filter().as_deref()),
            None => self.to_request().build(),
        }
    }
}

pub fn run(args: QueryArgs) -> SyncResult<()> {
    println!("{}", args.to_sql());
    if args.distinct.is_some() {
        return Ok(());
    }
    let request = args.to_request();
    if request.columns.iter().any(|c| c.format.is_some()) {
        println!("{}", serde_json::to_string_pretty(&request.columns.format_options())?);
    }
    Ok(())
}
