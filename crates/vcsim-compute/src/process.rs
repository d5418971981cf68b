//! Schedulable units of simulated work.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use vcsim_core::component::Id;

use crate::container::Container;

/// Identifier of a process, unique within a simulation run.
///
/// Assigned by the admitting [`Cpu`](crate::cpu::Cpu): the upper 32 bits
/// carry the CPU component id, the lower 32 bits its admission counter, so
/// ids are reproducible across runs with identical inputs.
pub type ProcessId = u64;

/// Process scheduling state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProcessState {
    /// In the pool, currently holds no capacity.
    Pending,
    /// Holds capacity on one or more cores.
    Running,
    /// Denied capacity because its container quota is exhausted.
    Throttled,
    /// All work consumed; about to leave the pool.
    Completed,
}

/// A schedulable unit of simulated work.
///
/// A process may be split across several cores at once; the split is kept as
/// an explicit list of `(core index, rate)` pairs owned by the process, so
/// consumed work has a single source of truth. "Parallel execution" is an
/// accounting fiction of the simulation, not real concurrency.
pub struct Process {
    pub(crate) id: ProcessId,
    priority: i64,
    total_work: f64,
    done_work: f64,
    span_limit: u32,
    container: Rc<RefCell<Container>>,
    requester: Id,
    pub(crate) assignments: Vec<(usize, f64)>,
    pub(crate) state: ProcessState,
    pub(crate) seq: u64,
}

impl Process {
    /// Creates a process that may span any number of cores.
    ///
    /// `requester` is the component notified with
    /// [`ProcessCompleted`](crate::events::ProcessCompleted) once all work is
    /// consumed.
    pub fn new(priority: i64, total_work: f64, container: Rc<RefCell<Container>>, requester: Id) -> Self {
        Self::with_span_limit(priority, total_work, u32::MAX, container, requester)
    }

    /// Creates a process that may span at most `span_limit` cores at once.
    pub fn with_span_limit(
        priority: i64,
        total_work: f64,
        span_limit: u32,
        container: Rc<RefCell<Container>>,
        requester: Id,
    ) -> Self {
        Self {
            id: 0,
            priority,
            total_work,
            done_work: 0.,
            span_limit,
            container,
            requester,
            assignments: Vec::new(),
            state: ProcessState::Pending,
            seq: 0,
        }
    }

    /// Returns the process id, assigned at admission.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Returns the process priority (higher wins).
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns the total amount of work.
    pub fn total_work(&self) -> f64 {
        self.total_work
    }

    /// Returns the amount of work consumed so far.
    pub fn done_work(&self) -> f64 {
        self.done_work
    }

    /// Returns the amount of work left.
    pub fn remaining_work(&self) -> f64 {
        (self.total_work - self.done_work).max(0.)
    }

    /// Returns the maximum number of cores the process may span.
    pub fn span_limit(&self) -> u32 {
        self.span_limit
    }

    /// Returns the owning container.
    pub fn container(&self) -> &Rc<RefCell<Container>> {
        &self.container
    }

    /// Returns the component notified on completion.
    pub fn requester(&self) -> Id {
        self.requester
    }

    /// Returns the current `(core index, rate)` assignments.
    pub fn assignments(&self) -> &[(usize, f64)] {
        &self.assignments
    }

    /// Returns the total rate currently allocated across all assigned cores.
    pub fn total_rate(&self) -> f64 {
        self.assignments.iter().map(|&(_, rate)| rate).sum()
    }

    /// Returns the current scheduling state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub(crate) fn advance(&mut self, work: f64) {
        self.done_work = (self.done_work + work).min(self.total_work);
    }
}
