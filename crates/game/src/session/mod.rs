mod client;
mod config;
mod driver;
mod error;
mod host;
mod tick;

use std::time::Duration;

pub use client::{ClientSession, ClientState};
pub use config::{DEFAULT_MAX_PEERS, SessionConfig};
pub use driver::{LocalStateSlot, NetworkThread};
pub use error::SessionError;
pub use host::{HostSession, HostState};
pub use tick::FixedTimestep;

use crate::event::{GameplayEvent, ReconciliationQueue};
use crate::player::{PlayerId, PlayerState, SharedRoster};

/// Where a session gets the local player's state each tick.
pub trait LocalStateSource {
    fn produce_local_state(&mut self) -> Option<PlayerState>;
}

impl<F> LocalStateSource for F
where
    F: FnMut() -> Option<PlayerState>,
{
    fn produce_local_state(&mut self) -> Option<PlayerState> {
        self()
    }
}

/// Common surface of host and client, used by `NetworkThread`.
pub trait Session: Send {
    /// Receive everything pending and run any tick that is due.
    fn update(&mut self, dt: Duration, source: &mut dyn LocalStateSource);

    fn send_gameplay(&mut self, event: GameplayEvent);

    fn events(&self) -> ReconciliationQueue;

    fn roster(&self) -> SharedRoster;

    fn local_id(&self) -> Option<PlayerId>;

    fn is_active(&self) -> bool;

    fn shutdown(&mut self);
}
