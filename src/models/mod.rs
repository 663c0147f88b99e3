pub mod job;
pub mod loaders;
pub mod report;

pub use job::{Identifier, JobHandle, JobStatus, PollOutcome, ResultPayload};
pub use loaders::{dedupe_identifiers, load_identifiers, write_json};
pub use report::BatchReport;
