//! Acquisition and publish pipeline.

pub mod collectors;
pub mod discovery;
pub mod drivers;
pub mod handoff;
pub mod pipeline;
pub mod publisher;
pub mod shutdown;
pub mod snapshot;
