pub mod cpue;
pub mod effort;
pub mod error;
pub mod filters;
pub mod loader;
pub mod pipeline;
pub mod protocol;
pub mod report;
pub mod schema;

#[cfg(feature = "python")]
mod python;

pub use cpue::{CatchPivot, CpueRow, CpueTable};
pub use effort::EffortRecord;
pub use error::CpueError;
pub use loader::SurveyTables;
pub use pipeline::{write_table, CpuePipeline, PipelineAudit, PipelineOutput};
pub use protocol::{ProtocolConfig, ZeroEffortPolicy};
