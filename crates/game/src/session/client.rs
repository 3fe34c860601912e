use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::event::{GameplayEvent, JoinFailure, ReconciliationQueue, RemoteEvent};
use crate::net::{
    LeaveReason, Message, NetworkEndpoint, NetworkStats, decode, encode, unix_time_ms,
};
use crate::player::{PlayerId, PlayerState, SharedRoster};

use super::config::SessionConfig;
use super::error::{SessionError, log_datagram_error};
use super::tick::FixedTimestep;
use super::{LocalStateSource, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    AwaitingAssignment,
    Joined,
}

/// Joining side of a session. Learns its identity from the host's
/// assignment and mirrors the host's roster from snapshots.
pub struct ClientSession {
    endpoint: Option<NetworkEndpoint>,
    config: SessionConfig,
    state: ClientState,
    server_addr: Option<SocketAddr>,
    identity: Option<PlayerId>,
    roster: SharedRoster,
    events: ReconciliationQueue,
    /// Peers the game loop has been told about.
    known_peers: HashSet<PlayerId>,
    /// Identities are never reused, so anything in here stays gone.
    departed: HashSet<PlayerId>,
    timestep: FixedTimestep,
    local_sequence: u32,
    last_snapshot_tick: Option<u32>,
    join_started: Instant,
    last_join_request: Instant,
    last_heard: Instant,
    last_ping: Instant,
    last_failure: Option<JoinFailure>,
}

impl ClientSession {
    pub fn new(config: SessionConfig) -> Self {
        let now = Instant::now();
        Self {
            endpoint: None,
            state: ClientState::Disconnected,
            server_addr: None,
            identity: None,
            roster: SharedRoster::new(),
            events: ReconciliationQueue::new(),
            known_peers: HashSet::new(),
            departed: HashSet::new(),
            timestep: FixedTimestep::new(config.tick_rate),
            local_sequence: 0,
            last_snapshot_tick: None,
            join_started: now,
            last_join_request: now,
            last_heard: now,
            last_ping: now,
            last_failure: None,
            config,
        }
    }

    /// Binds a fresh socket and sends the first join request. The outcome
    /// arrives later as `Joined` or `Closed` on the event queue.
    pub fn connect<A: ToSocketAddrs>(&mut self, host: A) -> Result<(), SessionError> {
        if self.state != ClientState::Disconnected {
            return Err(SessionError::violation("connect while a session is active"));
        }

        let server_addr = host
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| SessionError::UnresolvedAddress("host address".to_string()))?;

        let mut endpoint = NetworkEndpoint::bind(self.config.client_bind_addr())?;
        endpoint.set_packet_loss(self.config.packet_loss.clone());

        log::info!("Connecting to {} from {}", server_addr, endpoint.local_addr());

        self.reset_mirror();
        self.endpoint = Some(endpoint);
        self.server_addr = Some(server_addr);
        self.state = ClientState::AwaitingAssignment;
        self.last_failure = None;

        let now = Instant::now();
        self.join_started = now;
        self.last_heard = now;
        self.send_join_request(now);
        Ok(())
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Identity assigned by the host. Fixed for the lifetime of the session.
    pub fn identity(&self) -> Option<PlayerId> {
        self.identity
    }

    pub fn last_failure(&self) -> Option<JoinFailure> {
        self.last_failure
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().map(NetworkEndpoint::local_addr)
    }

    pub fn last_snapshot_tick(&self) -> Option<u32> {
        self.last_snapshot_tick
    }

    pub fn events(&self) -> ReconciliationQueue {
        self.events.clone()
    }

    pub fn roster(&self) -> SharedRoster {
        self.roster.clone()
    }

    pub fn stats(&self) -> Option<&NetworkStats> {
        self.endpoint.as_ref().map(NetworkEndpoint::stats)
    }

    pub fn rtt_ms(&self) -> f32 {
        self.stats().map_or(0.0, |stats| stats.rtt_ms)
    }

    pub fn poll(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        let datagrams = endpoint.poll();
        let now = Instant::now();

        for (data, addr) in datagrams {
            if Some(addr) != self.server_addr {
                log::debug!("Ignoring datagram from stranger {}", addr);
                if let Some(endpoint) = self.endpoint.as_mut() {
                    endpoint.stats_mut().rejected_datagrams += 1;
                }
                continue;
            }

            let result = decode(&data)
                .map_err(SessionError::from)
                .and_then(|message| self.handle_message(message, now));

            if let Err(e) = result {
                log_datagram_error(&e, addr);
            }

            // A message may have torn the session down.
            if self.state == ClientState::Disconnected {
                break;
            }
        }
    }

    /// Receives, retries the join, publishes the local state when a tick is
    /// due, and watches for a silent host.
    pub fn update(&mut self, dt: Duration, source: &mut dyn LocalStateSource) {
        self.poll();

        let now = Instant::now();
        match self.state {
            ClientState::Disconnected => {}
            ClientState::AwaitingAssignment => {
                if now.duration_since(self.join_started) >= self.config.join_timeout() {
                    self.fail(JoinFailure::TimedOut);
                } else if now.duration_since(self.last_join_request)
                    >= self.config.join_retry_interval()
                {
                    log::debug!("No assignment yet, repeating join request");
                    self.send_join_request(now);
                }
            }
            ClientState::Joined => {
                self.timestep.accumulate(dt);
                if self.timestep.drain_ticks() > 0 {
                    if let Some(state) = source.produce_local_state() {
                        if let Err(e) = self.send_local_state(state) {
                            log::warn!("Failed to publish local state: {}", e);
                        }
                    }
                }

                if now.duration_since(self.last_ping) >= self.config.ping_interval() {
                    self.last_ping = now;
                    let ping = Message::Ping {
                        timestamp_ms: unix_time_ms(),
                    };
                    if let Err(e) = self.send(ping) {
                        log::debug!("Ping failed: {}", e);
                    }
                }

                if now.saturating_duration_since(self.last_heard) > self.config.peer_timeout() {
                    self.fail(JoinFailure::HostLost);
                }
            }
        }
    }

    /// Stamps identity and sequence onto `state` and sends it to the host.
    pub fn send_local_state(&mut self, mut state: PlayerState) -> Result<(), SessionError> {
        let id = match (self.state, self.identity) {
            (ClientState::Joined, Some(id)) => id,
            _ => return Err(SessionError::NotConnected),
        };

        self.local_sequence = self.local_sequence.wrapping_add(1);
        state.id = id;
        state.sequence = self.local_sequence;
        self.send(Message::StateUpdate(state))
    }

    pub fn send_gameplay(&mut self, event: GameplayEvent) {
        let Some(id) = self.identity else {
            log::debug!("Dropping {:?}, not joined", event);
            return;
        };

        let message = match event {
            GameplayEvent::Shot { origin, direction } => Message::ShotFired {
                owner_id: id,
                // Assigned by the host.
                projectile_id: 0,
                origin,
                direction,
            },
            GameplayEvent::Respawn { position } => Message::PlayerRespawn {
                player_id: id,
                position,
            },
            GameplayEvent::Hit { target_id, .. } => {
                log::warn!("Ignoring local hit claim on {}, the host decides hits", target_id);
                return;
            }
        };

        if let Err(e) = self.send(message) {
            log::warn!("Failed to relay gameplay event: {}", e);
        }
    }

    /// Leaves on purpose. Pending events are discarded unprocessed.
    pub fn disconnect(&mut self) {
        if self.state == ClientState::Disconnected {
            return;
        }

        if let Err(e) = self.send(Message::Leave) {
            log::debug!("Could not say goodbye: {}", e);
        }

        let discarded = self.events.clear();
        log::info!("Disconnected ({} undelivered events dropped)", discarded);
        self.teardown();
    }

    fn handle_message(&mut self, message: Message, now: Instant) -> Result<(), SessionError> {
        self.last_heard = now;

        match message {
            Message::JoinAssigned {
                assigned_id,
                existing_players,
            } => self.handle_assignment(assigned_id, existing_players),
            Message::JoinRejected { reason } => {
                if self.state != ClientState::AwaitingAssignment {
                    return Err(SessionError::violation("rejection after joining"));
                }
                self.fail(JoinFailure::Rejected(reason));
                Ok(())
            }
            other if self.state != ClientState::Joined => Err(SessionError::violation(format!(
                "{} before assignment",
                other.kind()
            ))),
            Message::PlayerJoin { player_id } => {
                self.handle_player_join(player_id);
                Ok(())
            }
            Message::PlayerLeave { player_id, reason } => self.handle_player_leave(player_id, reason),
            Message::Snapshot { tick, states } => {
                self.last_snapshot_tick = Some(tick);
                for state in states {
                    self.observe_peer(state);
                }
                Ok(())
            }
            Message::Leave => {
                self.fail(JoinFailure::HostClosed);
                Ok(())
            }
            Message::Ping { timestamp_ms } => self.send(Message::Pong { timestamp_ms }),
            Message::Pong { timestamp_ms } => {
                let rtt = unix_time_ms().saturating_sub(timestamp_ms) as f32;
                if let Some(endpoint) = self.endpoint.as_mut() {
                    endpoint.stats_mut().record_rtt(rtt);
                }
                Ok(())
            }
            Message::ShotFired {
                owner_id,
                projectile_id,
                origin,
                direction,
            } => {
                if Some(owner_id) != self.identity {
                    self.events.push(RemoteEvent::ShotFired {
                        owner_id,
                        projectile_id,
                        origin,
                        direction,
                    });
                }
                Ok(())
            }
            Message::PlayerHit {
                target_id,
                attacker_id,
                damage,
            } => {
                self.events.push(RemoteEvent::PlayerHit {
                    target_id,
                    attacker_id,
                    damage,
                });
                Ok(())
            }
            Message::PlayerRespawn {
                player_id,
                position,
            } => {
                if Some(player_id) != self.identity {
                    self.roster.write(|roster| {
                        if let Some(state) = roster.get_mut(player_id) {
                            state.position = position;
                            state.alive = true;
                        }
                    });
                    self.events.push(RemoteEvent::PeerRespawned {
                        id: player_id,
                        position,
                    });
                }
                Ok(())
            }
            host_bound @ (Message::JoinRequest | Message::StateUpdate(_)) => Err(
                SessionError::violation(format!("{} is only sent to the host", host_bound.kind())),
            ),
        }
    }

    fn handle_assignment(
        &mut self,
        assigned_id: PlayerId,
        existing_players: Vec<PlayerState>,
    ) -> Result<(), SessionError> {
        match (self.state, self.identity) {
            (ClientState::AwaitingAssignment, _) => {}
            // Our retry crossed the first reply.
            (ClientState::Joined, Some(id)) if id == assigned_id => return Ok(()),
            (_, held) => {
                return Err(SessionError::violation(format!(
                    "assignment of {} while holding {:?}",
                    assigned_id, held
                )));
            }
        }

        self.identity = Some(assigned_id);
        self.state = ClientState::Joined;
        self.timestep.reset();
        self.events.push(RemoteEvent::Joined { id: assigned_id });
        log::info!(
            "Joined as player {} ({} already present)",
            assigned_id,
            existing_players.len()
        );

        for state in existing_players {
            self.observe_peer(state);
        }
        Ok(())
    }

    fn handle_player_join(&mut self, player_id: PlayerId) {
        if Some(player_id) == self.identity || self.departed.contains(&player_id) {
            log::debug!("Ignoring join announcement for {}", player_id);
            return;
        }

        if self.known_peers.insert(player_id) {
            log::info!("Player {} joined", player_id);
            self.events.push(RemoteEvent::PeerJoined {
                id: player_id,
                initial_state: None,
            });
        }
    }

    fn handle_player_leave(
        &mut self,
        player_id: PlayerId,
        reason: LeaveReason,
    ) -> Result<(), SessionError> {
        if Some(player_id) == self.identity {
            return Err(SessionError::violation("told that we left"));
        }

        self.departed.insert(player_id);
        self.roster.write(|roster| roster.remove(player_id));

        if self.known_peers.remove(&player_id) {
            log::info!("Player {} {}", player_id, reason.as_str());
            self.events.push(RemoteEvent::PeerLeft {
                id: player_id,
                reason,
            });
        }
        Ok(())
    }

    /// Merges one roster entry from the host. Stale and repeated entries
    /// change nothing and raise no event.
    fn observe_peer(&mut self, state: PlayerState) {
        let id = state.id;
        if Some(id) == self.identity || self.departed.contains(&id) {
            return;
        }

        let applied = self.roster.write(|roster| roster.apply(state));

        if self.known_peers.insert(id) {
            self.events.push(RemoteEvent::PeerJoined {
                id,
                initial_state: Some(state),
            });
        } else if applied {
            self.events.push(RemoteEvent::PeerStateUpdated { id, state });
        }
    }

    fn send_join_request(&mut self, now: Instant) {
        self.last_join_request = now;
        if let Err(e) = self.send(Message::JoinRequest) {
            log::warn!("Join request failed: {}", e);
        }
    }

    fn send(&mut self, message: Message) -> Result<(), SessionError> {
        let (Some(endpoint), Some(addr)) = (self.endpoint.as_mut(), self.server_addr) else {
            return Err(SessionError::NotConnected);
        };

        let bytes = encode(message)?;
        endpoint.send_to(&bytes, addr)?;
        Ok(())
    }

    /// Ends the session for a reason other than our own request. The game
    /// loop learns about it through a `Closed` event.
    fn fail(&mut self, failure: JoinFailure) {
        log::warn!("Session closed: {}", failure.as_str());

        if failure == JoinFailure::TimedOut {
            // The host may have admitted us with every reply lost.
            if let Err(e) = self.send(Message::Leave) {
                log::debug!("Could not withdraw join request: {}", e);
            }
        }

        self.last_failure = Some(failure);
        self.events.push(RemoteEvent::Closed { failure });
        self.teardown();
    }

    fn teardown(&mut self) {
        self.endpoint = None;
        self.server_addr = None;
        self.identity = None;
        self.state = ClientState::Disconnected;
        self.reset_mirror();
    }

    fn reset_mirror(&mut self) {
        self.roster.write(|roster| roster.clear());
        self.known_peers.clear();
        self.departed.clear();
        self.local_sequence = 0;
        self.last_snapshot_tick = None;
        self.timestep.reset();
    }
}

impl Session for ClientSession {
    fn update(&mut self, dt: Duration, source: &mut dyn LocalStateSource) {
        ClientSession::update(self, dt, source);
    }

    fn send_gameplay(&mut self, event: GameplayEvent) {
        ClientSession::send_gameplay(self, event);
    }

    fn events(&self) -> ReconciliationQueue {
        ClientSession::events(self)
    }

    fn roster(&self) -> SharedRoster {
        ClientSession::roster(self)
    }

    fn local_id(&self) -> Option<PlayerId> {
        self.identity
    }

    fn is_active(&self) -> bool {
        self.state != ClientState::Disconnected
    }

    fn shutdown(&mut self) {
        self.disconnect();
    }
}
