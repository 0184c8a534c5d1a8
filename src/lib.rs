pub mod config;
pub mod driver;
pub mod marker;
pub mod store;

pub use config::{TargetTable, builtin_table, load_table_file};
pub use driver::{RunOptions, RunSummary, run_table};
