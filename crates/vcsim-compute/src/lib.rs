//! Simulated CPU resource scheduling.
//!
//! A [`cpu::Cpu`] owns a fixed set of rate-based cores and a pool of
//! contending [`process::Process`]es. Capacity is reassigned by a single
//! coalesced recompute event whenever the pool or a container quota changes,
//! and the scheduler keeps exactly one boundary event armed for the next
//! moment a constraint (work exhaustion or quota exhaustion) will bind.

pub mod container;
pub mod cpu;
pub mod events;
pub mod process;
