pub mod api;
pub mod chunker;
pub mod config;
pub mod merge;
pub mod record;
pub mod report;
pub mod runtime;
pub mod statistic;
pub mod stats;
pub mod table;
pub mod utils;
pub mod worker;

pub use api::Aggregate;
pub use chunker::Chunker;
pub use config::{MalformedPolicy, PipelineConfig};
pub use record::MalformedRecord;
pub use report::{render, write_report};
pub use runtime::{run_single_pass, Pipeline, RunOutcome};
pub use statistic::Statistic;
pub use stats::RunStats;
pub use table::{KeyTable, StatTable};
