use std::io;
use std::net::SocketAddr;

use crate::net::PacketError;
use crate::player::PlayerId;

/// Failures inside the network layer. None of these reach the game loop;
/// the session logs them and carries on with the next datagram.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] PacketError),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("peer {0} timed out")]
    PeerTimeout(PlayerId),
    #[error("transport failure: {0}")]
    TransportFailure(#[from] io::Error),
    #[error("session full ({max_peers} peers)")]
    CapacityExceeded { max_peers: usize },
    #[error("session is not connected")]
    NotConnected,
    #[error("could not resolve {0}")]
    UnresolvedAddress(String),
}

impl SessionError {
    pub fn violation(message: impl Into<String>) -> Self {
        SessionError::ProtocolViolation(message.into())
    }
}

/// Uniform logging for errors raised while handling one datagram.
pub(crate) fn log_datagram_error(error: &SessionError, from: SocketAddr) {
    match error {
        SessionError::MalformedMessage(_) => {
            log::debug!("Dropping datagram from {}: {}", from, error)
        }
        SessionError::CapacityExceeded { .. } => {
            log::info!("Rejected join from {}: {}", from, error)
        }
        _ => log::warn!("Dropping datagram from {}: {}", from, error),
    }
}
