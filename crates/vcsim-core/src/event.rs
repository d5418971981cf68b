//! Events and their payloads.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

use crate::component::Id;

/// Monotonically increasing event identifier. Doubles as the tie-break for
/// events scheduled at the same simulated time.
pub type EventId = u64;

/// Marker trait for event payloads.
///
/// Implemented automatically for every `'static` serializable type, so a
/// payload is an ordinary `#[derive(Serialize)]` struct. The queue stores
/// payloads as trait objects; handlers downcast them back on delivery and
/// the kernel can render any payload as JSON for tracing.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// An occurrence delivered to a component at a simulated time.
pub struct Event {
    /// Unique identifier, also encodes insertion order.
    pub id: EventId,
    /// Simulated time at which the event fires.
    pub time: f64,
    /// Component that produced the event.
    pub src: Id,
    /// Component the event is delivered to.
    pub dst: Id,
    /// Payload.
    pub data: Box<dyn EventData>,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// BinaryHeap is a max-heap, so the ordering is inverted: the earliest time
// wins, equal times fall back to insertion order.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
