pub mod event;
pub mod interpolation;
pub mod net;
pub mod player;
pub mod session;

pub use event::{GameplayEvent, JoinFailure, ReconciliationQueue, RemoteEvent, RemoteEventSink};
pub use interpolation::{InterpolationConfig, InterpolationStats, RemoteStateInterpolator};
pub use net::{
    DEFAULT_PORT, DEFAULT_TICK_RATE, LeaveReason, MAX_PACKET_SIZE, MAX_ROSTER_SIZE, Message, NetworkEndpoint,
    NetworkStats, Packet, PacketError, PacketLossSimulation, RejectReason, local_ip,
};
pub use player::{DEFAULT_HEALTH, HOST_ID, PlayerId, PlayerState, Roster, SharedRoster};
pub use session::{
    ClientSession, ClientState, HostSession, HostState, LocalStateSlot, LocalStateSource,
    NetworkThread, Session, SessionConfig, SessionError,
};
