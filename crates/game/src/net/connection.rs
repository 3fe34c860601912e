use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::player::PlayerId;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Host-side record of one admitted client.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    pub addr: SocketAddr,
    pub player_id: PlayerId,
    pub joined_at: Instant,
    pub last_seen: Instant,
}

impl PeerConnection {
    pub fn new(addr: SocketAddr, player_id: PlayerId, now: Instant) -> Self {
        Self {
            addr,
            player_id,
            joined_at: now,
            last_seen: now,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(PlayerId),
    /// The address already holds an identity; its join reply was probably lost.
    AlreadyConnected(PlayerId),
    Full,
}

#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<SocketAddr, PlayerId>,
    clients: BTreeMap<PlayerId, PeerConnection>,
    next_player_id: PlayerId,
    max_clients: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            clients: BTreeMap::new(),
            // 0 belongs to the host.
            next_player_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Identities come from a monotonic counter and are never handed out twice.
    pub fn admit(&mut self, addr: SocketAddr, now: Instant) -> Admission {
        if let Some(&player_id) = self.clients_by_addr.get(&addr) {
            return Admission::AlreadyConnected(player_id);
        }

        if self.clients.len() >= self.max_clients {
            return Admission::Full;
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        self.clients
            .insert(player_id, PeerConnection::new(addr, player_id, now));
        self.clients_by_addr.insert(addr, player_id);

        Admission::Accepted(player_id)
    }

    pub fn id_for(&self, addr: &SocketAddr) -> Option<PlayerId> {
        self.clients_by_addr.get(addr).copied()
    }

    /// Refreshes `last_seen` for the sender, if it is a known client.
    pub fn touch(&mut self, addr: &SocketAddr, now: Instant) -> Option<PlayerId> {
        let player_id = *self.clients_by_addr.get(addr)?;
        let client = self.clients.get_mut(&player_id)?;
        client.touch(now);
        Some(player_id)
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<PeerConnection> {
        let conn = self.clients.remove(&player_id)?;
        self.clients_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<PeerConnection> {
        let player_id = self.clients_by_addr.remove(addr)?;
        self.clients.remove(&player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerConnection> {
        self.clients.values()
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.clients.values().map(|c| c.addr).collect()
    }

    pub fn addrs_except(&self, player_id: PlayerId) -> Vec<SocketAddr> {
        self.clients
            .values()
            .filter(|c| c.player_id != player_id)
            .map(|c| c.addr)
            .collect()
    }

    pub fn cleanup_timed_out(&mut self, now: Instant) -> Vec<PeerConnection> {
        let timed_out: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|c| c.is_timed_out(self.timeout, now))
            .map(|c| c.player_id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.clients_by_addr.clear();
    }
}
