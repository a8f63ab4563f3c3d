mod ids;
pub use ids::{ExecutionId, TaskId};

mod execution_status;
pub use execution_status::ExecutionStatus;

mod execution;
pub use execution::{ExecutionDetail, ExecutionSummary, TaskRef, UserRef};

mod output;
pub use output::{OutputEvent, OutputKind};

mod wire_time;
pub use wire_time::parse_datetime;

/// Topic prefix under which the bus publishes the output of one execution.
pub const EXECUTION_TOPIC_PREFIX: &str = "/topic/execution/";

/// Duration value in milliseconds.
pub type DurationMs = u64;
