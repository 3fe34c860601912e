use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::{DEFAULT_PORT, DEFAULT_TICK_RATE, PacketLossSimulation};

pub const DEFAULT_MAX_PEERS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bind_address: IpAddr,
    /// Host listen port. Clients bind an ephemeral port.
    pub port: u16,
    pub tick_rate: u32,
    /// Peers (host included) allowed in one session. Hosts cap this at
    /// `MAX_ROSTER_SIZE`.
    pub max_peers: usize,
    pub peer_timeout_ms: u64,
    pub join_timeout_ms: u64,
    pub join_retry_interval_ms: u64,
    pub ping_interval_ms: u64,
    pub packet_loss: Option<PacketLossSimulation>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            tick_rate: DEFAULT_TICK_RATE,
            max_peers: DEFAULT_MAX_PEERS,
            peer_timeout_ms: 5_000,
            join_timeout_ms: 5_000,
            join_retry_interval_ms: 500,
            ping_interval_ms: 1_000,
            packet_loss: None,
        }
    }
}

impl SessionConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Loopback on an OS-assigned port.
    pub fn loopback() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Default::default()
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn client_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, 0)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn max_clients(&self) -> usize {
        self.max_peers.saturating_sub(1)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn join_retry_interval(&self) -> Duration {
        Duration::from_millis(self.join_retry_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}
