//! Simulated clients issuing engagements against service chains.

use std::cell::RefCell;
use std::rc::Rc;

use vcsim_core::cast;
use vcsim_core::component::Id;
use vcsim_core::context::SimulationContext;
use vcsim_core::event::Event;
use vcsim_core::handler::EventHandler;
use vcsim_core::{log_debug, log_info};

use vcsim_compute::container::Container;
use vcsim_compute::cpu::Cpu;
use vcsim_compute::events::ProcessCompleted;
use vcsim_compute::process::{Process, ProcessId};

use crate::events::{EngagementRequest, EngagementReleased};
use crate::topology::ChainId;

/// One step of a user workflow: the work spawned on the CPU backing a hop
/// of the call sequence.
pub struct HopSpec {
    /// CPU hosting the hop's microservice.
    pub cpu: Rc<RefCell<Cpu>>,
    /// Container the hop's process runs in.
    pub container: Rc<RefCell<Container>>,
    /// Amount of work for this hop.
    pub work: f64,
    /// Priority of the hop's process.
    pub priority: i64,
}

/// Record of one finished engagement, for monitoring.
#[derive(Clone, Copy, Debug)]
pub struct CompletedEngagement {
    /// Engagement handle assigned by the topology.
    pub engagement: u64,
    /// Time the engagement was released (chain became available).
    pub released_at: f64,
    /// Time the last hop of the call sequence completed.
    pub completed_at: f64,
}

/// A simulated client of one service chain.
///
/// The user issues an engagement request against the chain; once released
/// it executes the call sequence hop by hop, spawning one process per hop
/// and waiting for its completion before moving on.
pub struct User {
    topology: Id,
    chain: ChainId,
    workflow: Vec<HopSpec>,
    next_hop: usize,
    current_engagement: Option<(u64, f64)>,
    current_process: Option<ProcessId>,
    completed: Vec<CompletedEngagement>,
    ctx: SimulationContext,
}

impl User {
    /// Creates a user that engages `chain` on `topology` and, once released,
    /// runs `workflow` along the chain's call order.
    pub fn new(topology: Id, chain: ChainId, workflow: Vec<HopSpec>, ctx: SimulationContext) -> Self {
        Self {
            topology,
            chain,
            workflow,
            next_hop: 0,
            current_engagement: None,
            current_process: None,
            completed: Vec::new(),
            ctx,
        }
    }

    /// Returns the user component id.
    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    /// Issues an engagement request against the chain.
    pub fn engage(&mut self) {
        let user = self.ctx.id();
        let chain = self.chain;
        self.ctx.emit_now(EngagementRequest { user, chain }, self.topology);
        log_debug!(self.ctx, "requested engagement of chain {}", chain);
    }

    /// Returns finished engagements, oldest first.
    pub fn completed(&self) -> &[CompletedEngagement] {
        &self.completed
    }

    /// Returns the release time of the current engagement, if one is active.
    pub fn active_since(&self) -> Option<f64> {
        self.current_engagement.map(|(_, released_at)| released_at)
    }

    fn start_next_hop(&mut self) {
        if self.next_hop >= self.workflow.len() {
            let (engagement, released_at) = self.current_engagement.take().unwrap();
            self.completed.push(CompletedEngagement {
                engagement,
                released_at,
                completed_at: self.ctx.time(),
            });
            log_info!(self.ctx, "engagement {} completed", engagement);
            return;
        }
        let hop = &self.workflow[self.next_hop];
        let process = Rc::new(RefCell::new(Process::new(
            hop.priority,
            hop.work,
            hop.container.clone(),
            self.ctx.id(),
        )));
        log_debug!(self.ctx, "starting hop {} of {}", self.next_hop, self.workflow.len());
        self.current_process = Some(hop.cpu.borrow_mut().admit(process));
    }
}

impl EventHandler for User {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            EngagementReleased { engagement, chain } => {
                debug_assert_eq!(chain, self.chain);
                log_info!(self.ctx, "engagement {} released", engagement);
                self.current_engagement = Some((engagement, self.ctx.time()));
                self.next_hop = 0;
                self.start_next_hop();
            }
            ProcessCompleted { id } => {
                if self.current_process == Some(id) {
                    self.current_process = None;
                    self.next_hop += 1;
                    self.start_next_hop();
                }
            }
        })
    }
}
