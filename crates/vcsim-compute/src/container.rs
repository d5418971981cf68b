//! Container CPU-time quotas.

use serde::Serialize;

use vcsim_core::EPSILON;

/// A quota boundary limiting the cumulative CPU time consumed by the
/// processes it owns.
///
/// CPU time accrues at `allocated rate / core capacity` per simulated time
/// unit, i.e. one fully busy core consumes one time unit of quota per time
/// unit. Accounting is monotonic: consumption never decreases except on an
/// explicit [`reset_quota`](Container::reset_quota).
pub struct Container {
    name: String,
    quota: Option<f64>,
    consumed: f64,
    live_processes: u32,
}

/// Read-only view of a container state at some simulated instant.
#[derive(Clone, Debug, Serialize)]
pub struct ContainerSnapshot {
    /// Allowed CPU time, `None` if unbounded.
    pub quota: Option<f64>,
    /// CPU time consumed so far.
    pub consumed: f64,
    /// Number of processes currently owned by the container.
    pub live_processes: u32,
}

impl Container {
    /// Creates a container with the given CPU-time quota (`None` = unbounded).
    ///
    /// Panics on a negative quota, which is a configuration error.
    pub fn new<S: AsRef<str>>(name: S, quota: Option<f64>) -> Self {
        if let Some(q) = quota {
            if q < 0. {
                panic!("Configuration error: container '{}' has negative quota {}", name.as_ref(), q);
            }
        }
        Self {
            name: name.as_ref().to_owned(),
            quota,
            consumed: 0.,
            live_processes: 0,
        }
    }

    /// Returns the container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the allowed CPU time, `None` if unbounded.
    pub fn quota(&self) -> Option<f64> {
        self.quota
    }

    /// Returns the CPU time consumed so far.
    pub fn consumed(&self) -> f64 {
        self.consumed
    }

    /// Returns the remaining CPU time, `None` if unbounded.
    pub fn remaining_quota(&self) -> Option<f64> {
        self.quota.map(|q| (q - self.consumed).max(0.))
    }

    /// Returns whether the quota is exhausted.
    ///
    /// An exhausted container throttles its processes: they receive zero
    /// allocation until the quota is reset or raised.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.remaining_quota(), Some(r) if r <= EPSILON)
    }

    /// Resets the consumed CPU time to zero (quota window reset).
    pub fn reset_quota(&mut self) {
        self.consumed = 0.;
    }

    /// Replaces the allowed CPU time.
    ///
    /// Panics on a negative quota. Consumed time is kept, so lowering the
    /// quota below the consumed amount leaves the container exhausted.
    pub fn set_quota(&mut self, quota: Option<f64>) {
        if let Some(q) = quota {
            if q < 0. {
                panic!("Configuration error: container '{}' has negative quota {}", self.name, q);
            }
        }
        self.quota = quota;
    }

    /// Returns the number of processes currently owned by the container.
    pub fn live_processes(&self) -> u32 {
        self.live_processes
    }

    /// Returns a read-only snapshot of the container state.
    pub fn snapshot(&self) -> ContainerSnapshot {
        ContainerSnapshot {
            quota: self.quota,
            consumed: self.consumed,
            live_processes: self.live_processes,
        }
    }

    pub(crate) fn consume(&mut self, cpu_time: f64) {
        self.consumed += cpu_time;
        // guard against floating-point overshoot at the quota boundary
        if let Some(q) = self.quota {
            self.consumed = self.consumed.min(q);
        }
    }

    pub(crate) fn register_process(&mut self) {
        self.live_processes += 1;
    }

    pub(crate) fn unregister_process(&mut self) {
        self.live_processes = self.live_processes.saturating_sub(1);
    }
}
