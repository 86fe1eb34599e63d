/*!
 * Document pipeline: discovery, completion state, scheduling and reports.
 *
 * - `discovery`: input scan, output paths and the per-document state machine
 * - `scheduler`: the `BatchScheduler` that runs, plans and verifies
 * - `report`: summaries for the CLI
 * - `progress`: progress bar helpers
 */

pub mod discovery;
pub mod progress;
pub mod report;
pub mod scheduler;

pub use self::discovery::{Document, DocumentState, PendingReason, ProgressRecord};
pub use self::report::{PlanReport, PlannedDocument, RunSummary, VerifyReport};
pub use self::scheduler::{BatchScheduler, SchedulerSettings};
