//! Report generation — orchestration, tables, progress and export.
//!
//! - `generator`: selects trades, runs the simulation per scope and builds sections
//! - `sections`: one function per statistic family, each producing named tables
//! - `table`: the `ReportTable`/`Cell` output contract
//! - `export`: JSON, CSV and Markdown artifacts

pub mod export;
pub mod generator;
pub mod input;
pub mod progress;
pub mod sections;
pub mod table;

pub use export::{export_json, generate_markdown, import_json, load_report, save_report, table_to_csv};
pub use generator::{Report, ReportError, ReportGenerator, SectionError, SummaryLine, SCHEMA_VERSION};
pub use input::{InputError, ReportInput};
pub use progress::{LogProgress, ProgressSink};
pub use sections::{day_histogram, histogram, SectionFailure};
pub use table::{Cell, ReportTable};
