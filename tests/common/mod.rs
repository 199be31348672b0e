// tests/common/mod.rs
// In-memory stand-in for the remote table service. Understands exactly the
// statements the synchronizer emits.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tablesync::gateway::{GatewayError, SqlGateway, TableResponse};
use tablesync::geocode::{Geocoder, UNKNOWN_LOCATION};
use tablesync::sheet::MemorySheet;
use tablesync::{Scalar, SyncSettings};

/// Quoted literals of a statement in order, with `\` escapes undone.
pub fn literals(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = sql.chars();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut lit = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        lit.push(escaped);
                    }
                }
                '\'' => break,
                other => lit.push(other),
            }
        }
        out.push(lit);
    }
    out
}

#[derive(Default)]
struct State {
    columns: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
    next_id: u64,
    statements: Vec<String>,
    select_errors: VecDeque<GatewayError>,
    mutation_errors: VecDeque<GatewayError>,
}

pub struct FakeTableService {
    state: Mutex<State>,
}

impl FakeTableService {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            state: Mutex::new(State {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Seed a row with an explicit rowid.
    pub fn with_row(self, row_id: &str, values: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .rows
                .push((row_id.to_string(), values.iter().map(|v| v.to_string()).collect()));
            if let Ok(n) = row_id.parse::<u64>() {
                state.next_id = state.next_id.max(n + 1);
            }
        }
        self
    }

    /// The next select fails with `error`.
    pub fn fail_select(&self, error: GatewayError) {
        self.state.lock().unwrap().select_errors.push_back(error);
    }

    /// The next mutations fail with these errors, in order.
    pub fn fail_mutations(&self, errors: Vec<GatewayError>) {
        self.state.lock().unwrap().mutation_errors.extend(errors);
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| !s.starts_with("select"))
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().statements.clear();
    }

    /// Remote rows as `(rowid, values)`, in storage order.
    pub fn rows(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn value(&self, row_id: &str, column: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let idx = state.columns.iter().position(|c| c == column)?;
        state
            .rows
            .iter()
            .find(|(id, _)| id == row_id)
            .and_then(|(_, values)| values.get(idx).cloned())
    }

    fn column_index(state: &State, sql: &str, column: &str) -> Result<usize, GatewayError> {
        state.columns.iter().position(|c| c == column).ok_or_else(|| {
            GatewayError::MalformedQuery {
                sql: sql.to_string(),
                message: format!("Column {} does not exist", column),
            }
        })
    }

    fn run(state: &mut State, sql: &str) -> Result<TableResponse, GatewayError> {
        let lits = literals(sql);
        if sql.starts_with("select") {
            let mut indexes = Vec::new();
            for column in &lits {
                indexes.push(if column == "rowid" {
                    None
                } else {
                    Some(Self::column_index(state, sql, column)?)
                });
            }
            let rows = state
                .rows
                .iter()
                .map(|(id, values)| {
                    indexes
                        .iter()
                        .map(|i| match i {
                            None => Scalar::from(id.as_str()),
                            Some(i) => Scalar::from(values.get(*i).cloned().unwrap_or_default()),
                        })
                        .collect()
                })
                .collect();
            return Ok(TableResponse { columns: lits, rows });
        }
        if sql.starts_with("INSERT INTO") {
            let (columns, values) = lits.split_at(lits.len() / 2);
            let mut row = vec![String::new(); state.columns.len()];
            for (column, value) in columns.iter().zip(values) {
                let idx = Self::column_index(state, sql, column)?;
                row[idx] = value.clone();
            }
            let id = state.next_id.to_string();
            state.next_id += 1;
            state.rows.push((id.clone(), row));
            return Ok(TableResponse {
                columns: vec!["rowid".to_string()],
                rows: vec![vec![Scalar::from(id)]],
            });
        }
        if sql.starts_with("UPDATE") {
            let (row_id, pairs) = lits.split_last().ok_or_else(|| other(sql))?;
            let mut updates = Vec::new();
            for pair in pairs.chunks(2) {
                updates.push((Self::column_index(state, sql, &pair[0])?, pair[1].clone()));
            }
            let (_, row) = state
                .rows
                .iter_mut()
                .find(|(id, _)| id == row_id)
                .ok_or_else(|| other(sql))?;
            for (idx, value) in updates {
                row[idx] = value;
            }
            return Ok(TableResponse::default());
        }
        if sql.starts_with("DELETE FROM") {
            let row_id = lits.first().ok_or_else(|| other(sql))?;
            state.rows.retain(|(id, _)| id != row_id);
            return Ok(TableResponse::default());
        }
        Err(other(sql))
    }
}

fn other(sql: &str) -> GatewayError {
    GatewayError::Other {
        sql: sql.to_string(),
        message: "unsupported statement".to_string(),
    }
}

#[async_trait]
impl SqlGateway for FakeTableService {
    async fn execute(&self, sql: &str) -> Result<TableResponse, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        let scripted = if sql.starts_with("select") {
            state.select_errors.pop_front()
        } else {
            state.mutation_errors.pop_front()
        };
        if let Some(err) = scripted {
            return Err(err);
        }
        Self::run(&mut state, sql)
    }
}

pub fn sheet(rows: &[&[&str]]) -> MemorySheet {
    MemorySheet::from_strings(rows)
}

/// Settings for table `T` with no pause between calls.
pub fn settings() -> SyncSettings {
    let mut settings = SyncSettings::for_table("T");
    settings.call_interval_ms = 0;
    settings.timestamp_column = None;
    settings
}

/// Geocoder backed by a fixed address table. The first `failures` lookups
/// fall back to `0,0` as an unreachable service would.
pub struct TableGeocoder {
    places: HashMap<String, String>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl TableGeocoder {
    pub fn new(places: &[(&str, &str)]) -> Self {
        Self {
            places: places
                .iter()
                .map(|(a, l)| (a.to_string(), l.to_string()))
                .collect(),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn geocode(&self, address: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return UNKNOWN_LOCATION.to_string();
        }
        self.places
            .get(address)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }
}

/// Settings for table `T` with the address and timestamp rules switched on.
pub fn settings_with_rules(address: &str, timestamp: &str) -> SyncSettings {
    let mut settings = settings();
    settings.address_column = Some(address.to_string());
    settings.timestamp_column = Some(timestamp.to_string());
    settings
}
