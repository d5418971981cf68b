//! Event consumption.

use crate::event::Event;

/// Implemented by simulation components that receive events.
pub trait EventHandler {
    /// Processes an event destined for this component.
    fn on(&mut self, event: Event);
}

/// Dispatches on the concrete payload type of an event, downcasting from
/// [`EventData`](crate::event::EventData) behind match-like syntax.
///
/// Arms need not be exhaustive: a payload matching none of them is logged
/// as unhandled at the `ERROR` level and dropped.
///
/// # Examples
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde::Serialize;
/// use vcsim_core::{cast, Event, EventHandler, Simulation};
///
/// #[derive(Clone, Serialize)]
/// struct WorkArrived {
///     amount: f64,
/// }
///
/// #[derive(Default)]
/// struct Worker {
///     backlog: f64,
/// }
///
/// impl EventHandler for Worker {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             WorkArrived { amount } => {
///                 self.backlog += amount;
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new(7);
/// let worker = Rc::new(RefCell::new(Worker::default()));
/// let worker_id = sim.add_handler("worker", worker.clone());
/// let mut ctx = sim.create_context("generator");
/// ctx.emit(WorkArrived { amount: 2.5 }, worker_id, 0.5);
/// sim.step();
/// assert_eq!(worker.borrow().backlog, 2.5);
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
