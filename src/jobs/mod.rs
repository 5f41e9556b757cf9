//! Jobs: what gets scheduled, how it is queued and how each kind is handled.
//!
//! Pipeline: FetchWorkers → FetchChart (one per discovered worker);
//! FetchBalance stands alone.

pub mod context;
pub mod handlers;
pub mod queue;
pub mod types;

pub use context::JobContext;
pub use queue::{JobQueue, JobReceiver, Stage};
pub use types::{Job, JobKind, JobOutcome, JobReport, OutcomeStatus};
