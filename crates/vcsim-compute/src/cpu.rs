//! Model of a simulated CPU with priority-based capacity assignment.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use vcsim_core::cast;
use vcsim_core::component::Id;
use vcsim_core::context::SimulationContext;
use vcsim_core::event::{Event, EventId};
use vcsim_core::handler::EventHandler;
use vcsim_core::{log_debug, log_info, log_warn, EPSILON};

use crate::container::Container;
use crate::events::{ProcessCompleted, ProgressBoundary, ScheduleRecompute};
use crate::process::{Process, ProcessId, ProcessState};

/// A unit of simulated computational capacity.
///
/// Capacity is a rate (work per simulated time unit). The committed rate is
/// the sum of active assignments and never exceeds the capacity.
pub struct CpuCore {
    capacity: f64,
    committed: f64,
}

impl CpuCore {
    fn new(capacity: f64) -> Self {
        Self { capacity, committed: 0. }
    }

    /// Returns the core capacity.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Returns the currently committed rate.
    pub fn committed(&self) -> f64 {
        self.committed
    }

    /// Returns the spare (uncommitted) rate.
    pub fn spare(&self) -> f64 {
        (self.capacity - self.committed).max(0.)
    }
}

/// Read-only view of a core at some simulated instant.
#[derive(Clone, Debug, Serialize)]
pub struct CoreSnapshot {
    /// Core capacity.
    pub capacity: f64,
    /// Committed rate.
    pub committed: f64,
}

/// Read-only view of a CPU at some simulated instant.
#[derive(Clone, Debug, Serialize)]
pub struct CpuSnapshot {
    /// Per-core state, in core index order.
    pub cores: Vec<CoreSnapshot>,
    /// Number of processes in the pool.
    pub pool_size: usize,
    /// Number of scheduling anomalies recorded so far.
    pub anomalies: u64,
}

/// A simulated CPU owning an ordered set of cores and a pool of contending
/// processes.
///
/// Any pool or quota change enqueues exactly one recompute event at the
/// current simulated time; triggers arriving while one is pending are
/// coalesced. The recompute assigns rates to processes in priority order
/// (ties broken by admission order), filling cores in ascending index order
/// and splitting a process across cores when its demand exceeds one core's
/// spare capacity. It then arms a single boundary event for the moment the
/// leading constraint (work or quota exhaustion) will next bind.
pub struct Cpu {
    cores: Vec<CpuCore>,
    pool: Vec<Rc<RefCell<Process>>>,
    admission_count: u64,
    recompute_event: Option<EventId>,
    boundary_event: Option<EventId>,
    last_update: f64,
    anomalies: u64,
    ctx: SimulationContext,
}

impl Cpu {
    /// Creates a CPU with one core per entry of `core_capacities`.
    ///
    /// Panics if no cores or a non-positive capacity are given (configuration
    /// errors). The core set is fixed for the lifetime of the CPU.
    pub fn new(core_capacities: &[f64], ctx: SimulationContext) -> Self {
        if core_capacities.is_empty() {
            panic!("Configuration error: CPU '{}' must have at least one core", ctx.name());
        }
        for &capacity in core_capacities {
            if capacity <= 0. {
                panic!(
                    "Configuration error: CPU '{}' has core with non-positive capacity {}",
                    ctx.name(),
                    capacity
                );
            }
        }
        Self {
            cores: core_capacities.iter().map(|&c| CpuCore::new(c)).collect(),
            pool: Vec::new(),
            admission_count: 0,
            recompute_event: None,
            boundary_event: None,
            last_update: 0.,
            anomalies: 0,
            ctx,
        }
    }

    /// Returns the CPU component id.
    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    /// Returns the cores of this CPU.
    pub fn cores(&self) -> &[CpuCore] {
        &self.cores
    }

    /// Returns the total capacity across all cores.
    pub fn total_capacity(&self) -> f64 {
        self.cores.iter().map(|c| c.capacity()).sum()
    }

    /// Returns the total spare capacity across all cores.
    pub fn available_capacity(&self) -> f64 {
        self.cores.iter().map(|c| c.spare()).sum()
    }

    /// Returns the fraction of total capacity currently committed.
    pub fn utilization(&self) -> f64 {
        (self.total_capacity() - self.available_capacity()) / self.total_capacity()
    }

    /// Returns the number of scheduling anomalies recorded so far.
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies
    }

    /// Returns a read-only snapshot of the CPU state without mutating it.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            cores: self
                .cores
                .iter()
                .map(|c| CoreSnapshot {
                    capacity: c.capacity(),
                    committed: c.committed(),
                })
                .collect(),
            pool_size: self.pool.len(),
            anomalies: self.anomalies,
        }
    }

    /// Admits a process into the pool, assigns its id and requests a
    /// recompute. Returns the assigned id.
    ///
    /// Ids carry the CPU component id in their upper half, so they stay
    /// unique across CPUs and reproducible across runs. Admitting a process
    /// that is already in the pool is a scheduling anomaly: recorded, logged
    /// and otherwise a no-op returning the existing id.
    pub fn admit(&mut self, process: Rc<RefCell<Process>>) -> ProcessId {
        if self.pool.iter().any(|p| Rc::ptr_eq(p, &process)) {
            self.anomalies += 1;
            let id = process.borrow().id();
            log_warn!(self.ctx, "duplicate admission of process {} ignored", id);
            return id;
        }
        let id = ((self.ctx.id() as ProcessId) << 32) | self.admission_count;
        {
            let mut p = process.borrow_mut();
            p.id = id;
            p.seq = self.admission_count;
            p.state = ProcessState::Pending;
            p.container().borrow_mut().register_process();
        }
        self.admission_count += 1;
        self.pool.push(process);
        log_debug!(self.ctx, "admitted process {}", id);
        self.request_recompute();
        id
    }

    /// Removes a process from the pool and requests a recompute.
    ///
    /// Removing a process that is not in the pool is a scheduling anomaly:
    /// recorded, logged and otherwise a no-op.
    pub fn remove(&mut self, id: ProcessId) {
        if !self.pool.iter().any(|p| p.borrow().id() == id) {
            self.anomalies += 1;
            log_warn!(self.ctx, "removal of unknown process {} ignored", id);
            return;
        }
        // account the work done up to this instant before the process
        // leaves; completions settled here shrink the pool, so the position
        // is looked up only afterwards
        self.sync_progress();
        let pos = match self.pool.iter().position(|p| p.borrow().id() == id) {
            Some(pos) => pos,
            // the process completed at this very instant
            None => return,
        };
        let process = self.pool.remove(pos);
        let mut p = process.borrow_mut();
        for &(core, rate) in p.assignments.iter() {
            self.cores[core].committed = (self.cores[core].committed - rate).max(0.);
        }
        p.assignments.clear();
        p.container().borrow_mut().unregister_process();
        log_debug!(self.ctx, "removed process {}", id);
        drop(p);
        self.request_recompute();
    }

    /// Notifies the scheduler that a container quota changed (reset, raised
    /// or lowered) and requests a recompute.
    pub fn on_quota_change(&mut self, container: &Rc<RefCell<Container>>) {
        log_debug!(self.ctx, "quota change for container '{}'", container.borrow().name());
        self.request_recompute();
    }

    fn request_recompute(&mut self) {
        if self.recompute_event.is_none() {
            self.recompute_event = Some(self.ctx.emit_self_now(ScheduleRecompute {}));
        }
    }

    /// Accrues work and quota consumption since the last update and handles
    /// completions. Safe to call multiple times at the same instant.
    fn sync_progress(&mut self) {
        let now = self.ctx.time();
        let dt = now - self.last_update;
        self.last_update = now;
        if dt > EPSILON {
            for process in self.pool.iter() {
                let mut p = process.borrow_mut();
                if p.state != ProcessState::Running {
                    continue;
                }
                let mut rate = 0.;
                let mut cpu_time_rate = 0.;
                for &(core, r) in p.assignments.iter() {
                    rate += r;
                    cpu_time_rate += r / self.cores[core].capacity;
                }
                p.advance(rate * dt);
                p.container().borrow_mut().consume(cpu_time_rate * dt);
            }
        }
        // completions, in admission order
        let mut completed = Vec::new();
        self.pool.retain(|process| {
            let mut p = process.borrow_mut();
            if p.remaining_work() > EPSILON {
                return true;
            }
            p.state = ProcessState::Completed;
            for &(core, rate) in p.assignments.iter() {
                self.cores[core].committed = (self.cores[core].committed - rate).max(0.);
            }
            p.assignments.clear();
            p.container().borrow_mut().unregister_process();
            completed.push((p.id(), p.requester()));
            false
        });
        for (id, requester) in completed {
            log_info!(self.ctx, "process {} completed", id);
            self.ctx.emit_now(ProcessCompleted { id }, requester);
        }
    }

    /// Recomputes the capacity assignment over the current pool snapshot.
    fn recompute(&mut self) {
        self.sync_progress();
        if let Some(event) = self.boundary_event.take() {
            self.ctx.cancel_event(event);
        }
        for core in self.cores.iter_mut() {
            core.committed = 0.;
        }

        let mut order = self.pool.clone();
        order.sort_by(|a, b| {
            let (a, b) = (a.borrow(), b.borrow());
            b.priority().cmp(&a.priority()).then(a.seq.cmp(&b.seq))
        });

        for process in order.iter() {
            let mut p = process.borrow_mut();
            p.assignments.clear();
            let mut work_budget = p.remaining_work();
            if work_budget <= EPSILON {
                continue;
            }
            // remaining quota per notional unit time, split evenly across
            // the container's live processes
            let mut quota_budget = {
                let c = p.container().borrow();
                match c.remaining_quota() {
                    None => f64::INFINITY,
                    Some(q) => q / c.live_processes().max(1) as f64,
                }
            };
            if quota_budget <= EPSILON {
                p.state = ProcessState::Throttled;
                log_debug!(self.ctx, "process {} throttled: container quota exhausted", p.id());
                continue;
            }
            let mut spanned = 0;
            for (index, core) in self.cores.iter_mut().enumerate() {
                if spanned == p.span_limit() {
                    break;
                }
                let spare = core.capacity - core.committed;
                if spare <= EPSILON {
                    continue;
                }
                let rate = spare.min(work_budget).min(quota_budget * core.capacity);
                if rate <= EPSILON {
                    continue;
                }
                core.committed += rate;
                work_budget -= rate;
                quota_budget -= rate / core.capacity;
                p.assignments.push((index, rate));
                spanned += 1;
                if work_budget <= EPSILON || quota_budget <= EPSILON {
                    break;
                }
            }
            p.state = if p.assignments.is_empty() {
                ProcessState::Pending
            } else {
                ProcessState::Running
            };
        }

        self.arm_boundary();
        log_debug!(
            self.ctx,
            "recomputed assignment: {} processes, {:.3}/{:.3} capacity committed",
            self.pool.len(),
            self.total_capacity() - self.available_capacity(),
            self.total_capacity()
        );
    }

    /// Schedules the boundary event at the time the leading constraint
    /// (work exhaustion or quota exhaustion) will next bind.
    fn arm_boundary(&mut self) {
        let mut horizon = f64::INFINITY;
        // per-container CPU-time rates, keyed by container identity
        let mut container_rates: HashMap<usize, (Rc<RefCell<Container>>, f64)> = HashMap::new();
        for process in self.pool.iter() {
            let p = process.borrow();
            if p.state != ProcessState::Running {
                continue;
            }
            let mut rate = 0.;
            let mut cpu_time_rate = 0.;
            for &(core, r) in p.assignments.iter() {
                rate += r;
                cpu_time_rate += r / self.cores[core].capacity;
            }
            if rate > EPSILON {
                horizon = horizon.min(p.remaining_work() / rate);
            }
            let key = Rc::as_ptr(p.container()) as usize;
            container_rates
                .entry(key)
                .or_insert_with(|| (p.container().clone(), 0.))
                .1 += cpu_time_rate;
        }
        for (container, cpu_time_rate) in container_rates.values() {
            if *cpu_time_rate <= EPSILON {
                continue;
            }
            if let Some(remaining) = container.borrow().remaining_quota() {
                horizon = horizon.min(remaining / cpu_time_rate);
            }
        }
        if horizon.is_finite() {
            self.boundary_event = Some(self.ctx.emit_self(ProgressBoundary {}, horizon.max(0.)));
        }
    }
}

impl EventHandler for Cpu {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ScheduleRecompute {} => {
                self.recompute_event = None;
                self.recompute();
            }
            ProgressBoundary {} => {
                self.boundary_event = None;
                self.recompute();
            }
        })
    }
}
