//! Service topology: chains, network services and engagement gating.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use vcsim_core::cast;
use vcsim_core::component::Id;
use vcsim_core::context::SimulationContext;
use vcsim_core::event::Event;
use vcsim_core::handler::EventHandler;
use vcsim_core::{log_debug, log_info};

use vcsim_compute::events::ProcessCompleted;
use vcsim_compute::process::ProcessId;

use crate::events::{EngagementRequest, EngagementReleased};
use crate::microservice::{Microservice, ReadinessPolicy};

/// Index of a microservice within its topology.
pub type MicroserviceId = usize;
/// Index of a service chain within its topology.
pub type ChainId = usize;
/// Index of a network service within its topology.
pub type NetworkServiceId = usize;

/// Outcome of an engagement attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngagementStatus {
    /// The chain was ready; the engagement proceeds in the current step.
    Active(u64),
    /// The chain was not ready; the engagement is queued and will be
    /// released exactly once when the chain becomes ready.
    Pending(u64),
}

/// A directed chain of microservices defining call order.
///
/// Ready iff every member is ready. Holds the FIFO queue of engagements
/// issued while not ready.
pub struct ServiceChain {
    name: String,
    members: Vec<MicroserviceId>,
    edges: Vec<(MicroserviceId, MicroserviceId)>,
    network_services: Vec<NetworkServiceId>,
    waiting: VecDeque<(u64, Id)>,
    last_ready: bool,
}

impl ServiceChain {
    /// Returns the chain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the member microservices in call order.
    pub fn members(&self) -> &[MicroserviceId] {
        &self.members
    }

    /// Returns the directed edges encoding call order.
    pub fn edges(&self) -> &[(MicroserviceId, MicroserviceId)] {
        &self.edges
    }
}

/// A collection of service chains, possibly sharing member microservices.
/// Ready iff all its chains are ready.
pub struct NetworkService {
    name: String,
    chains: Vec<ChainId>,
    last_ready: bool,
}

impl NetworkService {
    /// Returns the network service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the chains owned by this network service.
    pub fn chains(&self) -> &[ChainId] {
        &self.chains
    }
}

/// Readiness state of one microservice in a snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct MicroserviceState {
    /// Microservice name.
    pub name: String,
    /// Derived readiness.
    pub ready: bool,
    /// Initialization completed.
    pub init_done: bool,
    /// Resource-fulfillment predicate holds.
    pub resources_fulfilled: bool,
}

/// Readiness state of one chain in a snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct ChainState {
    /// Chain name.
    pub name: String,
    /// Derived readiness.
    pub ready: bool,
    /// Number of engagements queued on the chain.
    pub pending_engagements: usize,
}

/// Read-only view of topology readiness at some simulated instant.
#[derive(Clone, Debug, Serialize)]
pub struct TopologySnapshot {
    /// Per-microservice readiness.
    pub microservices: Vec<MicroserviceState>,
    /// Per-chain readiness.
    pub chains: Vec<ChainState>,
    /// Per-network-service `(name, ready)` pairs.
    pub network_services: Vec<(String, bool)>,
}

/// Simulation component owning a service topology and gating engagements on
/// its readiness.
///
/// Readiness changes are propagated by push: a microservice change notifies
/// exactly the chains referencing it, which re-derive their readiness and,
/// on a not-ready to ready transition, release queued engagements in FIFO
/// order within the same simulated step.
pub struct ServiceTopology {
    microservices: Vec<Microservice>,
    chains: Vec<ServiceChain>,
    network_services: Vec<NetworkService>,
    startup_processes: HashMap<ProcessId, MicroserviceId>,
    policy: ReadinessPolicy,
    engagement_count: u64,
    ctx: SimulationContext,
}

impl ServiceTopology {
    /// Creates an empty topology with the default [`ReadinessPolicy::Latched`].
    pub fn new(ctx: SimulationContext) -> Self {
        Self::with_policy(ReadinessPolicy::Latched, ctx)
    }

    /// Creates an empty topology with the given readiness policy.
    pub fn with_policy(policy: ReadinessPolicy, ctx: SimulationContext) -> Self {
        Self {
            microservices: Vec::new(),
            chains: Vec::new(),
            network_services: Vec::new(),
            startup_processes: HashMap::new(),
            policy,
            engagement_count: 0,
            ctx,
        }
    }

    /// Returns the topology component id.
    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    /// Adds a microservice node.
    pub fn add_microservice<S: AsRef<str>>(&mut self, name: S) -> MicroserviceId {
        self.microservices.push(Microservice::new(name.as_ref().to_owned()));
        self.microservices.len() - 1
    }

    /// Associates a startup process with a microservice: the microservice
    /// completes initialization when this process completes on its CPU.
    /// The process must be created with this topology as the requester.
    pub fn set_startup_process(&mut self, ms: MicroserviceId, process: ProcessId) {
        self.microservices[ms].startup_process = Some(process);
        self.startup_processes.insert(process, ms);
    }

    /// Adds a service chain over the given call path.
    ///
    /// Panics if the path is empty (configuration error). Microservices may
    /// belong to multiple chains.
    pub fn add_chain<S: AsRef<str>>(&mut self, name: S, path: &[MicroserviceId]) -> ChainId {
        if path.is_empty() {
            panic!("Configuration error: chain '{}' references no microservices", name.as_ref());
        }
        let chain_id = self.chains.len();
        let mut members = Vec::new();
        for &ms in path {
            if !members.contains(&ms) {
                members.push(ms);
                self.microservices[ms].chains.push(chain_id);
            }
        }
        let edges = path.windows(2).map(|w| (w[0], w[1])).collect();
        self.chains.push(ServiceChain {
            name: name.as_ref().to_owned(),
            members,
            edges,
            network_services: Vec::new(),
            waiting: VecDeque::new(),
            last_ready: false,
        });
        // an empty-path chain is rejected above; a single-node chain may
        // already be ready at creation
        self.reevaluate_chain(chain_id);
        chain_id
    }

    /// Adds a network service over the given chains (chains may share
    /// member microservices).
    pub fn add_network_service<S: AsRef<str>>(&mut self, name: S, chains: &[ChainId]) -> NetworkServiceId {
        let ns_id = self.network_services.len();
        for &chain in chains {
            self.chains[chain].network_services.push(ns_id);
        }
        let last_ready = chains.iter().all(|&c| self.chains[c].last_ready);
        self.network_services.push(NetworkService {
            name: name.as_ref().to_owned(),
            chains: chains.to_vec(),
            last_ready,
        });
        ns_id
    }

    /// Returns the derived readiness of a microservice.
    pub fn microservice_ready(&self, ms: MicroserviceId) -> bool {
        self.microservices[ms].derive_ready(self.policy)
    }

    /// Returns the derived readiness of a chain.
    pub fn chain_ready(&self, chain: ChainId) -> bool {
        self.chains[chain].members.iter().all(|&ms| self.microservice_ready(ms))
    }

    /// Returns the derived readiness of a network service.
    pub fn network_service_ready(&self, ns: NetworkServiceId) -> bool {
        self.network_services[ns].chains.iter().all(|&c| self.chain_ready(c))
    }

    /// Returns the call path members of a chain.
    pub fn chain(&self, chain: ChainId) -> &ServiceChain {
        &self.chains[chain]
    }

    /// Marks a microservice's initialization as complete.
    pub fn mark_initialized(&mut self, ms: MicroserviceId) {
        self.update_microservice(ms, |m| m.init_done = true);
    }

    /// Updates the externally supplied resource-fulfillment state of a
    /// microservice.
    pub fn set_resources_fulfilled(&mut self, ms: MicroserviceId, fulfilled: bool) {
        self.update_microservice(ms, |m| m.resources_fulfilled = fulfilled);
    }

    /// Attempts to engage a chain on behalf of a user.
    ///
    /// If the chain is ready, an [`EngagementReleased`] event is emitted to
    /// the user in the current step. Otherwise the engagement is queued and
    /// released exactly once when the chain becomes ready, in FIFO order.
    pub fn engage(&mut self, user: Id, chain: ChainId) -> EngagementStatus {
        let engagement = self.engagement_count;
        self.engagement_count += 1;
        if self.chain_ready(chain) {
            log_debug!(self.ctx, "engagement {} on ready chain '{}'", engagement, self.chains[chain].name);
            self.ctx.emit_now(EngagementReleased { engagement, chain }, user);
            EngagementStatus::Active(engagement)
        } else {
            log_debug!(self.ctx, "engagement {} queued: chain '{}' not ready", engagement, self.chains[chain].name);
            self.chains[chain].waiting.push_back((engagement, user));
            EngagementStatus::Pending(engagement)
        }
    }

    /// Returns a read-only snapshot of the topology readiness state.
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            microservices: self
                .microservices
                .iter()
                .enumerate()
                .map(|(id, m)| MicroserviceState {
                    name: m.name.clone(),
                    ready: self.microservice_ready(id),
                    init_done: m.init_done,
                    resources_fulfilled: m.resources_fulfilled,
                })
                .collect(),
            chains: self
                .chains
                .iter()
                .enumerate()
                .map(|(id, c)| ChainState {
                    name: c.name.clone(),
                    ready: self.chain_ready(id),
                    pending_engagements: c.waiting.len(),
                })
                .collect(),
            network_services: self
                .network_services
                .iter()
                .enumerate()
                .map(|(id, ns)| (ns.name.clone(), self.network_service_ready(id)))
                .collect(),
        }
    }

    fn update_microservice<F>(&mut self, ms: MicroserviceId, update: F)
    where
        F: FnOnce(&mut Microservice),
    {
        let before = self.microservice_ready(ms);
        let m = &mut self.microservices[ms];
        update(m);
        if m.init_done && m.resources_fulfilled {
            m.latched = true;
        }
        let after = self.microservice_ready(ms);
        if before == after {
            return;
        }
        log_info!(
            self.ctx,
            "microservice '{}' is {}",
            self.microservices[ms].name,
            if after { "ready" } else { "no longer ready" }
        );
        for chain in self.microservices[ms].chains.clone() {
            self.reevaluate_chain(chain);
        }
    }

    fn reevaluate_chain(&mut self, chain: ChainId) {
        let ready = self.chain_ready(chain);
        if ready == self.chains[chain].last_ready {
            return;
        }
        self.chains[chain].last_ready = ready;
        if ready {
            log_info!(self.ctx, "chain '{}' is ready", self.chains[chain].name);
            let waiting = std::mem::take(&mut self.chains[chain].waiting);
            for (engagement, user) in waiting {
                self.ctx.emit_now(EngagementReleased { engagement, chain }, user);
            }
        } else {
            log_info!(self.ctx, "chain '{}' is no longer ready", self.chains[chain].name);
        }
        for ns in self.chains[chain].network_services.clone() {
            let ns_ready = self.network_service_ready(ns);
            if ns_ready != self.network_services[ns].last_ready {
                self.network_services[ns].last_ready = ns_ready;
                log_info!(
                    self.ctx,
                    "network service '{}' is {}",
                    self.network_services[ns].name,
                    if ns_ready { "ready" } else { "no longer ready" }
                );
            }
        }
    }
}

impl EventHandler for ServiceTopology {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ProcessCompleted { id } => {
                if let Some(ms) = self.startup_processes.remove(&id) {
                    log_debug!(self.ctx, "startup process {} of '{}' completed", id, self.microservices[ms].name);
                    self.mark_initialized(ms);
                }
            }
            EngagementRequest { user, chain } => {
                self.engage(user, chain);
            }
        })
    }
}
