//! Live-announcement reconciliation: content model, engine, and the
//! fixed-delay poller that drives it.

pub mod engine;
pub mod message;
pub mod poller;

pub use engine::{AnnounceEngine, TickSummary};
pub use poller::Poller;
