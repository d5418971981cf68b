//! Service topology nodes.

use serde::Serialize;

use vcsim_compute::process::ProcessId;

use crate::topology::ChainId;

/// Whether microservice readiness may regress after being reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReadinessPolicy {
    /// Once a microservice has been ready it stays ready, even if resource
    /// fulfillment later regresses. This is the default.
    Latched,
    /// Readiness always follows the current inputs; a resource shortfall
    /// un-readies the microservice and its containing chains.
    Dynamic,
}

/// A node in a service topology.
///
/// Readiness is never stored: it is always derived from initialization
/// completion and resource fulfillment (plus the latch under
/// [`ReadinessPolicy::Latched`]).
pub struct Microservice {
    pub(crate) name: String,
    pub(crate) init_done: bool,
    pub(crate) resources_fulfilled: bool,
    pub(crate) latched: bool,
    pub(crate) startup_process: Option<ProcessId>,
    // index-based back-references to containing chains (observer handles)
    pub(crate) chains: Vec<ChainId>,
}

impl Microservice {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            init_done: false,
            resources_fulfilled: false,
            latched: false,
            startup_process: None,
            chains: Vec::new(),
        }
    }

    /// Returns the microservice name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether initialization has completed.
    pub fn init_done(&self) -> bool {
        self.init_done
    }

    /// Returns whether the resource-fulfillment predicate currently holds.
    pub fn resources_fulfilled(&self) -> bool {
        self.resources_fulfilled
    }

    pub(crate) fn derive_ready(&self, policy: ReadinessPolicy) -> bool {
        if policy == ReadinessPolicy::Latched && self.latched {
            return true;
        }
        self.init_done && self.resources_fulfilled
    }
}
