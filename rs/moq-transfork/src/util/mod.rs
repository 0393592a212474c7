//! Concurrency primitives shared by the model and the session.
mod queue;
mod watch;

pub use queue::*;
pub use watch::*;
