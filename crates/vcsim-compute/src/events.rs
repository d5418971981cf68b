//! Events produced and consumed by the CPU scheduler.

use serde::Serialize;

use crate::process::ProcessId;

/// Self-event requesting a scheduling recompute.
///
/// A CPU holds at most one pending event of this type; triggers arriving
/// while one is pending are coalesced into it.
#[derive(Clone, Serialize)]
pub struct ScheduleRecompute {}

/// Self-event fired when the next constraint (work or quota exhaustion)
/// binds, so the scheduler can recompute even absent admit/remove calls.
#[derive(Clone, Serialize)]
pub struct ProgressBoundary {}

/// Notifies the process owner that the process has consumed all its work.
#[derive(Clone, Serialize)]
pub struct ProcessCompleted {
    /// Id of the completed process.
    pub id: ProcessId,
}
