mod roster;
mod state;

pub use roster::{Roster, SharedRoster};
pub use state::{ArchivedPlayerState, DEFAULT_HEALTH, HOST_ID, PlayerId, PlayerState};
