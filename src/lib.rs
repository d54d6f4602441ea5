pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod loaders;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod schema;
pub mod source;
pub mod ui;
pub mod validate;
pub mod writer;

pub use cli::{Cli, Commands};
pub use config::{PipelineConfig, SourceConfig};
pub use error::{RecordError, StoreError};
pub use loaders::Loader;
pub use report::{RunStatus, RunSummary};
pub use source::{FetchError, SourceDoc, SourceProvider};
pub use ui::{Phase, ProgressUi, SilentUi, Ui};
pub use writer::Store;
