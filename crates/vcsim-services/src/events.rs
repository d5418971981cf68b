//! Events of the engagement protocol.

use serde::Serialize;

use vcsim_core::component::Id;

use crate::topology::ChainId;

/// A user's intent to invoke a service chain, sent to the topology.
#[derive(Clone, Serialize)]
pub struct EngagementRequest {
    /// Requesting user component.
    pub user: Id,
    /// Target service chain.
    pub chain: ChainId,
}

/// Sent to the user exactly once when its engagement may proceed:
/// immediately if the chain was ready, otherwise at the instant the chain
/// becomes ready.
#[derive(Clone, Serialize)]
pub struct EngagementReleased {
    /// Engagement handle assigned by the topology.
    pub engagement: u64,
    /// The chain the engagement targets.
    pub chain: ChainId,
}
