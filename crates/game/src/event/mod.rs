mod queue;
mod types;

pub use queue::{ReconciliationQueue, RemoteEventSink};
pub use types::{GameplayEvent, JoinFailure, RemoteEvent};
