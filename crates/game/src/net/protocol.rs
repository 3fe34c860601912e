use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::player::{PlayerId, PlayerState};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x444F_4746;
pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_TICK_RATE: u32 = 30;
/// Most player states a `Snapshot` carries while staying under
/// `MAX_PACKET_SIZE`, with room to spare. Hosts never admit more peers.
pub const MAX_ROSTER_SIZE: usize = 24;

const MIN_PACKET_SIZE: usize = 8;
const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
}

impl PacketHeader {
    pub fn new() -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap-safe "newer than" for per-identity publication sequences.
#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum RejectReason {
    CapacityExceeded,
    ShuttingDown,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::CapacityExceeded => "server full",
            RejectReason::ShuttingDown => "server shutting down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum LeaveReason {
    Graceful,
    Timeout,
}

impl LeaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Graceful => "left",
            LeaveReason::Timeout => "timed out",
        }
    }
}

/// Every datagram carries exactly one of these. The archived discriminant is
/// the kind tag, validated on decode.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Message {
    JoinRequest,
    /// Sent only to the requesting client. Carries the identity it owns.
    JoinAssigned {
        assigned_id: PlayerId,
        existing_players: Vec<PlayerState>,
    },
    JoinRejected {
        reason: RejectReason,
    },
    /// Announcement about some other peer. Never an assignment.
    PlayerJoin {
        player_id: PlayerId,
    },
    PlayerLeave {
        player_id: PlayerId,
        reason: LeaveReason,
    },
    StateUpdate(PlayerState),
    Snapshot {
        tick: u32,
        states: Vec<PlayerState>,
    },
    Leave,
    Ping {
        timestamp_ms: u64,
    },
    Pong {
        timestamp_ms: u64,
    },
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
    PlayerRespawn {
        player_id: PlayerId,
        position: [f32; 3],
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::JoinRequest => "JOIN_REQUEST",
            Message::JoinAssigned { .. } => "JOIN_ASSIGNED",
            Message::JoinRejected { .. } => "JOIN_REJECTED",
            Message::PlayerJoin { .. } => "PLAYER_JOIN",
            Message::PlayerLeave { .. } => "PLAYER_LEAVE",
            Message::StateUpdate(_) => "STATE_UPDATE",
            Message::Snapshot { .. } => "SNAPSHOT",
            Message::Leave => "LEAVE",
            Message::Ping { .. } => "PING",
            Message::Pong { .. } => "PONG",
            Message::ShotFired { .. } => "SHOT_FIRED",
            Message::PlayerHit { .. } => "PLAYER_HIT",
            Message::PlayerRespawn { .. } => "PLAYER_RESPAWN",
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Message,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("malformed datagram: {0}")]
    Malformed(rancor::Error),
    #[error("datagram truncated ({len} bytes)")]
    Truncated { len: usize },
    #[error("foreign or outdated datagram (magic {magic:#x}, version {version})")]
    BadHeader { magic: u32, version: u32 },
    #[error("encoded packet is {len} bytes, limit is {MAX_PACKET_SIZE}")]
    TooLarge { len: usize },
}

impl Packet {
    pub fn new(payload: Message) -> Self {
        Self {
            header: PacketHeader::new(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)?;

        if bytes.len() > MAX_PACKET_SIZE {
            return Err(PacketError::TooLarge { len: bytes.len() });
        }

        Ok(bytes)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < MIN_PACKET_SIZE {
            return Err(PacketError::Truncated { len: data.len() });
        }

        // Receive buffers carry no alignment guarantee.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let packet = rkyv::from_bytes::<Self, rancor::Error>(&aligned)
            .map_err(PacketError::Malformed)?;

        if !packet.header.is_valid() {
            return Err(PacketError::BadHeader {
                magic: packet.header.magic,
                version: packet.header.version,
            });
        }

        Ok(packet)
    }
}

/// Encodes a single message into one datagram.
pub fn encode(message: Message) -> Result<Vec<u8>, PacketError> {
    Packet::new(message).encode()
}

/// Decodes one datagram into its message.
pub fn decode(data: &[u8]) -> Result<Message, PacketError> {
    Packet::decode(data).map(|packet| packet.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::HOST_ID;

    fn state(id: PlayerId, sequence: u32) -> PlayerState {
        let mut state = PlayerState::placeholder(id);
        state.sequence = sequence;
        state.position = [1.5, -2.0, 30.25];
        state.rotation = [0.0, 90.0, 180.0];
        state.health = 75;
        state
    }

    #[test]
    fn test_sequence_comparison() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(5, 5));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn test_join_assigned_survives_the_wire() {
        let message = Message::JoinAssigned {
            assigned_id: 3,
            existing_players: vec![state(HOST_ID, 0), state(1, 12), state(2, 40)],
        };

        let bytes = encode(message.clone()).unwrap();
        assert!(bytes.len() <= MAX_PACKET_SIZE);
        assert_eq!(decode(&bytes).unwrap(), message);
    }

    #[test]
    fn test_assignment_and_announcement_are_distinct_kinds() {
        let assigned = decode(&encode(Message::JoinAssigned {
            assigned_id: 4,
            existing_players: Vec::new(),
        })
        .unwrap())
        .unwrap();
        let announced = decode(&encode(Message::PlayerJoin { player_id: 4 }).unwrap()).unwrap();

        assert_eq!(assigned.kind(), "JOIN_ASSIGNED");
        assert_eq!(announced.kind(), "PLAYER_JOIN");
        assert_ne!(assigned, announced);
    }

    #[test]
    fn test_largest_roster_fits_one_datagram() {
        let states: Vec<_> = (0..MAX_ROSTER_SIZE as u32).map(|id| state(id, id * 100)).collect();

        let assignment = encode(Message::JoinAssigned {
            assigned_id: MAX_ROSTER_SIZE as u32 - 1,
            existing_players: states[..MAX_ROSTER_SIZE - 1].to_vec(),
        })
        .unwrap();
        let snapshot = encode(Message::Snapshot { tick: 900, states }).unwrap();

        assert!(assignment.len() <= MAX_PACKET_SIZE);
        assert!(snapshot.len() <= MAX_PACKET_SIZE);
    }

    #[test]
    fn test_oversized_roster_is_refused() {
        let states = (0..64).map(|id| state(id, 1)).collect();
        assert!(matches!(
            encode(Message::Snapshot { tick: 1, states }),
            Err(PacketError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_datagram_is_rejected() {
        let bytes = encode(Message::Snapshot {
            tick: 1,
            states: vec![state(0, 1), state(1, 1)],
        })
        .unwrap();

        assert!(decode(&bytes[..bytes.len() / 2]).is_err());
        assert!(matches!(
            decode(&bytes[..3]),
            Err(PacketError::Truncated { len: 3 })
        ));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let garbage = [0xFFu8; 64];
        assert!(decode(&garbage).is_err());

        let json = br#"{"type": "player_join", "player_id": 1}"#;
        assert!(decode(json).is_err());
    }

    #[test]
    fn test_foreign_header_is_rejected() {
        let mut packet = Packet::new(Message::JoinRequest);
        packet.header.magic = 0x1234_5678;
        let bytes = packet.encode().unwrap();

        assert!(matches!(
            Packet::decode(&bytes),
            Err(PacketError::BadHeader { magic: 0x1234_5678, .. })
        ));
    }
}
