// src/lib.rs
//! Query building for a remote table service and two-way synchronization of
//! a local sheet with a remote table.

pub mod cli;
pub mod error;
pub mod gateway;
pub mod geocode;
pub mod query;
pub mod settings;
pub mod sheet;
pub mod sync;
pub mod value;

pub use error::{SyncError, SyncResult};
pub use query::{build_select_query, Aggregate, ColumnModel, ColumnSpec, OrderBy, QueryRequest};
pub use settings::SyncSettings;
pub use sync::{SyncReport, TableSynchronizer};
pub use value::Scalar;
