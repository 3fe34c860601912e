mod connection;
mod endpoint;
mod protocol;
mod stats;

pub use connection::{Admission, ConnectionManager, PeerConnection};
pub use endpoint::{NetworkEndpoint, local_ip};
pub use protocol::{
    ArchivedMessage, ArchivedPacket, DEFAULT_PORT, DEFAULT_TICK_RATE, LeaveReason,
    MAX_PACKET_SIZE, MAX_ROSTER_SIZE, Message, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet, PacketError,
    PacketHeader, RejectReason, decode, encode, sequence_greater_than,
};
pub use stats::{NetworkStats, PacketLossSimulation, unix_time_ms};
