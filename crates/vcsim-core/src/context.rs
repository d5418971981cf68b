//! Component-side access to the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// Handle given to each component for reading the clock, emitting events and
/// drawing deterministic random numbers.
///
/// The context is bound to the component it was created for: events emitted
/// through it carry that component as their source.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
        }
    }

    /// Returns the id of the owning component.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of the owning component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulated time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Draws a float in `[0, 1)` from the simulation-wide seeded generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Draws a value from the given range using the simulation-wide seeded
    /// generator.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Schedules an event for `dst`, `delay` time units from now.
    ///
    /// Panics on a negative delay: the past cannot be scheduled into.
    pub fn emit<T>(&mut self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, delay)
    }

    /// Schedules an event for `dst` at the current simulated time.
    pub fn emit_now<T>(&mut self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, 0.)
    }

    /// Schedules an event for the owning component itself, `delay` time
    /// units from now.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, self.id, delay)
    }

    /// Schedules an event for the owning component itself at the current
    /// simulated time.
    pub fn emit_self_now<T>(&mut self, data: T) -> EventId
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, self.id, 0.)
    }

    /// Cancels a pending event. Always effective before the event fires.
    pub fn cancel_event(&mut self, id: EventId) {
        self.sim_state.borrow_mut().cancel_event(id);
    }
}
