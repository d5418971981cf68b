//! Simulation setup and the event loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::Level::Trace;
use log::{log_enabled, trace};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::event::Event;
use crate::handler::EventHandler;
use crate::log::log_undelivered_event;
use crate::state::SimulationState;

/// Owner of the simulated world: registers components, drives the event
/// loop and advances the clock.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    name_to_id: HashMap<String, Id>,
    names: Vec<String>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
}

impl Simulation {
    /// Creates a simulation whose random generator is seeded with `seed`.
    /// Runs with the same seed and inputs replay identically.
    pub fn new(seed: u64) -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed))),
            name_to_id: HashMap::new(),
            names: Vec::new(),
            handlers: Vec::new(),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.name_to_id.len() as Id;
        self.name_to_id.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        self.handlers.push(None);
        id
    }

    /// Returns the name under which the component with `id` was registered.
    ///
    /// Panics if no such component exists.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names[id as usize].clone()
    }

    /// Creates the context for a component with the given name, registering
    /// the name if it is new. Ids are handed out sequentially from 0.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        SimulationContext::new(id, name.as_ref(), self.sim_state.clone())
    }

    /// Registers `handler` as the event consumer for the named component and
    /// returns its id. A context created earlier under the same name keeps
    /// its id.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.handlers[id as usize] = Some(handler);
        id
    }

    /// Returns the current simulated time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Pops the earliest pending event, advances the clock to its time and
    /// delivers it to the destination's handler. An event whose destination
    /// has no registered handler is logged and dropped.
    ///
    /// Returns whether a pending event was found.
    pub fn step(&mut self) -> bool {
        let next = self.sim_state.borrow_mut().next_event();
        match next {
            Some(event) => {
                self.trace_event(&event);
                match self.handlers.get(event.dst as usize).and_then(|h| h.as_ref()) {
                    Some(handler) => handler.borrow_mut().on(event),
                    None => log_undelivered_event(event),
                }
                true
            }
            None => false,
        }
    }

    /// Runs the event loop until the queue drains.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Runs the event loop until the next event lies beyond
    /// `current time + duration` or the queue drains.
    ///
    /// Returns whether pending events remain.
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let end = self.sim_state.borrow().time() + duration;
        loop {
            match self.sim_state.borrow_mut().peek_event() {
                Some(event) if event.time > end => return true,
                Some(_) => {}
                None => return false,
            }
            self.step();
        }
    }

    /// Returns the number of events created so far, cancelled ones included.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Cancels every pending event matching the predicate. Already delivered
    /// events are unaffected.
    pub fn cancel_events<F>(&mut self, pred: F)
    where
        F: Fn(&Event) -> bool,
    {
        self.sim_state.borrow_mut().cancel_events(pred);
    }

    fn trace_event(&self, event: &Event) {
        if log_enabled!(Trace) {
            let src = self.lookup_name(event.src);
            let dst = self.lookup_name(event.dst);
            trace!(
                target: &dst,
                "[{:.3} {} {}] {}",
                event.time,
                crate::log::get_colored("EVENT", colored::Color::BrightBlack),
                dst,
                json!({"type": type_name(&event.data).unwrap(), "data": event.data, "src": src})
            );
        }
    }
}
