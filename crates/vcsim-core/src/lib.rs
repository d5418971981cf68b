//! Discrete-event simulation kernel for vcsim.
//!
//! The kernel is single-threaded and cooperative: all work happens
//! synchronously inside event callbacks at a single simulated instant.
//! Events scheduled for the same simulated time fire in insertion order,
//! which makes runs with identical inputs and seeds fully reproducible.

#![warn(missing_docs)]

pub mod component;
pub mod context;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use event::{Event, EventData, EventId};
pub use handler::EventHandler;
pub use simulation::Simulation;
pub use state::EPSILON;
