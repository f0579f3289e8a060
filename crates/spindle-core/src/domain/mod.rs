//! Domain model (IDs, jobs, outcomes).

pub mod ids;
pub mod job;
pub mod outcome;

pub use ids::{JobId, ResourceId, SubscriberId};
pub use job::{Job, Priority};
pub use outcome::{JobOutcome, JobResult};
