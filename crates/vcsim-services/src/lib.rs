//! Service topology readiness propagation and engagement gating.
//!
//! A [`topology::ServiceTopology`] owns microservices, service chains and
//! network services. Microservice readiness is derived from initialization
//! completion (driven by the compute layer) and resource fulfillment
//! (externally supplied); changes are pushed to containing chains, and a
//! chain becoming ready releases its pending engagements in FIFO order
//! within the same simulated step.

pub mod events;
pub mod microservice;
pub mod topology;
pub mod user;
