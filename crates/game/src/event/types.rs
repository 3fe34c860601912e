use crate::net::{LeaveReason, RejectReason};
use crate::player::{PlayerId, PlayerState};

/// Why a client session ended or never got going. Surfaced to the UI as a
/// "disconnected" / "could not join" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFailure {
    Rejected(RejectReason),
    TimedOut,
    HostLost,
    HostClosed,
}

impl JoinFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinFailure::Rejected(reason) => reason.as_str(),
            JoinFailure::TimedOut => "could not join: no answer from host",
            JoinFailure::HostLost => "disconnected: host stopped responding",
            JoinFailure::HostClosed => "disconnected: host closed the session",
        }
    }
}

/// What the game loop sees of the network, one item per drained event.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// This peer now owns `id`. Emitted exactly once per session.
    Joined { id: PlayerId },
    PeerJoined {
        id: PlayerId,
        initial_state: Option<PlayerState>,
    },
    PeerLeft { id: PlayerId, reason: LeaveReason },
    PeerStateUpdated { id: PlayerId, state: PlayerState },
    PeerRespawned { id: PlayerId, position: [f32; 3] },
    ShotFired {
        owner_id: PlayerId,
        projectile_id: u32,
        origin: [f32; 3],
        direction: [f32; 3],
    },
    PlayerHit {
        target_id: PlayerId,
        attacker_id: PlayerId,
        damage: i32,
    },
    Closed { failure: JoinFailure },
}

impl RemoteEvent {
    /// The peer this event is about, if any.
    pub fn peer(&self) -> Option<PlayerId> {
        match self {
            RemoteEvent::PeerJoined { id, .. }
            | RemoteEvent::PeerLeft { id, .. }
            | RemoteEvent::PeerStateUpdated { id, .. }
            | RemoteEvent::PeerRespawned { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Gameplay happenings the local game asks the session to relay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameplayEvent {
    Shot { origin: [f32; 3], direction: [f32; 3] },
    Respawn { position: [f32; 3] },
    /// Only honoured on the host, which is authoritative for hits.
    Hit {
        target_id: PlayerId,
        attacker_id: PlayerId,
        damage: i32,
    },
}
