use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::event::{GameplayEvent, ReconciliationQueue, RemoteEvent};
use crate::net::{
    Admission, ConnectionManager, LeaveReason, MAX_ROSTER_SIZE, Message, NetworkEndpoint,
    NetworkStats, RejectReason, decode, encode,
};
use crate::player::{HOST_ID, PlayerId, PlayerState, SharedRoster};

use super::config::SessionConfig;
use super::error::{SessionError, log_datagram_error};
use super::tick::FixedTimestep;
use super::{LocalStateSource, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Stopped,
    /// Bound and accepting joins; no tick has run yet.
    Listening,
    Running,
}

/// Authoritative side of a session. Owns identity 0, assigns identities to
/// joiners and rebroadcasts the full roster every tick.
pub struct HostSession {
    endpoint: Option<NetworkEndpoint>,
    connections: ConnectionManager,
    roster: SharedRoster,
    events: ReconciliationQueue,
    config: SessionConfig,
    state: HostState,
    timestep: FixedTimestep,
    tick: u32,
    local_sequence: u32,
    next_projectile_id: u32,
}

impl HostSession {
    /// Binds and starts listening. `max_peers` is capped at
    /// `MAX_ROSTER_SIZE` so every snapshot fits one datagram.
    pub fn start(mut config: SessionConfig) -> Result<Self, SessionError> {
        if config.max_peers > MAX_ROSTER_SIZE {
            log::warn!(
                "max_peers {} exceeds what one snapshot can carry, capping at {}",
                config.max_peers,
                MAX_ROSTER_SIZE
            );
            config.max_peers = MAX_ROSTER_SIZE;
        }

        let mut endpoint = NetworkEndpoint::bind(config.bind_addr())?;
        endpoint.set_packet_loss(config.packet_loss.clone());

        let roster = SharedRoster::new();
        roster.write(|roster| roster.insert(PlayerState::placeholder(HOST_ID)));

        log::info!(
            "Hosting on {} ({} Hz, up to {} peers)",
            endpoint.local_addr(),
            config.tick_rate,
            config.max_peers
        );

        Ok(Self {
            endpoint: Some(endpoint),
            connections: ConnectionManager::with_timeout(
                config.max_clients(),
                config.peer_timeout(),
            ),
            roster,
            events: ReconciliationQueue::new(),
            timestep: FixedTimestep::new(config.tick_rate),
            state: HostState::Listening,
            tick: 0,
            local_sequence: 0,
            next_projectile_id: 0,
            config,
        })
    }

    /// Hosts on `port` with every other setting at its default.
    pub fn host(port: u16) -> Result<Self, SessionError> {
        Self::start(SessionConfig::with_port(port))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().map(NetworkEndpoint::local_addr)
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    /// Connected peers, host included.
    pub fn peer_count(&self) -> usize {
        match self.state {
            HostState::Stopped => 0,
            _ => self.connections.len() + 1,
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
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

    /// Handles every datagram waiting on the socket.
    pub fn poll(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        let datagrams = endpoint.poll();
        let now = Instant::now();

        for (data, addr) in datagrams {
            let result = decode(&data)
                .map_err(SessionError::from)
                .and_then(|message| self.handle_message(message, addr, now));

            if let Err(e) = result {
                log_datagram_error(&e, addr);
            }
        }
    }

    /// One replication tick: publish our own state, then send every peer the
    /// whole roster.
    pub fn tick(&mut self, local_state: Option<PlayerState>) {
        if self.state == HostState::Stopped {
            return;
        }

        if let Some(mut state) = local_state {
            self.local_sequence = self.local_sequence.wrapping_add(1);
            state.id = HOST_ID;
            state.sequence = self.local_sequence;
            self.roster.write(|roster| roster.insert(state));
        }

        self.tick = self.tick.wrapping_add(1);
        if self.state == HostState::Listening {
            log::debug!("First tick, session running");
            self.state = HostState::Running;
        }

        let targets = self.connections.addrs();
        if targets.is_empty() {
            return;
        }

        let snapshot = Message::Snapshot {
            tick: self.tick,
            states: self.roster.read().values(),
        };
        if let Err(e) = self.broadcast(&targets, snapshot) {
            log::warn!("Failed to broadcast snapshot {}: {}", self.tick, e);
        }
    }

    /// Drops clients that have been silent longer than the peer timeout.
    pub fn sweep_timeouts(&mut self, now: Instant) -> Vec<PlayerId> {
        let dropped = self.connections.cleanup_timed_out(now);

        dropped
            .into_iter()
            .map(|conn| {
                log::info!("{}", SessionError::PeerTimeout(conn.player_id));
                self.remove_peer(conn.player_id, LeaveReason::Timeout);
                conn.player_id
            })
            .collect()
    }

    /// Receives, ticks when due, and expires silent peers.
    pub fn update(&mut self, dt: Duration, source: &mut dyn LocalStateSource) {
        self.poll();

        self.timestep.accumulate(dt);
        if self.timestep.drain_ticks() > 0 {
            let local_state = source.produce_local_state();
            self.tick(local_state);
        }

        self.sweep_timeouts(Instant::now());
    }

    /// Announces a shot fired by the host's own player.
    pub fn fire_shot(&mut self, origin: [f32; 3], direction: [f32; 3]) -> u32 {
        let projectile_id = self.allocate_projectile_id();
        let targets = self.connections.addrs();
        let message = Message::ShotFired {
            owner_id: HOST_ID,
            projectile_id,
            origin,
            direction,
        };

        if let Err(e) = self.broadcast(&targets, message) {
            log::warn!("Failed to relay shot {}: {}", projectile_id, e);
        }
        projectile_id
    }

    /// Hits are decided by the host alone. The host's own game loop gets the
    /// same event through its queue so both sides apply damage in one place.
    pub fn announce_hit(&mut self, target_id: PlayerId, attacker_id: PlayerId, damage: i32) {
        self.events.push(RemoteEvent::PlayerHit {
            target_id,
            attacker_id,
            damage,
        });

        let targets = self.connections.addrs();
        let message = Message::PlayerHit {
            target_id,
            attacker_id,
            damage,
        };
        if let Err(e) = self.broadcast(&targets, message) {
            log::warn!("Failed to relay hit on {}: {}", target_id, e);
        }
    }

    /// Moves the host's own player. The roster entry gets a fresh sequence so
    /// clients that miss the relay still take the new position from the next
    /// snapshot.
    pub fn announce_respawn(&mut self, position: [f32; 3]) {
        self.local_sequence = self.local_sequence.wrapping_add(1);
        let sequence = self.local_sequence;
        self.roster.write(|roster| {
            if let Some(state) = roster.get_mut(HOST_ID) {
                state.sequence = sequence;
                state.position = position;
                state.alive = true;
            }
        });

        let targets = self.connections.addrs();
        let message = Message::PlayerRespawn {
            player_id: HOST_ID,
            position,
        };
        if let Err(e) = self.broadcast(&targets, message) {
            log::warn!("Failed to relay respawn: {}", e);
        }
    }

    pub fn send_gameplay(&mut self, event: GameplayEvent) {
        match event {
            GameplayEvent::Shot { origin, direction } => {
                self.fire_shot(origin, direction);
            }
            GameplayEvent::Respawn { position } => self.announce_respawn(position),
            GameplayEvent::Hit {
                target_id,
                attacker_id,
                damage,
            } => self.announce_hit(target_id, attacker_id, damage),
        }
    }

    /// Tells every client the session is over and releases the socket.
    /// Events not yet drained are discarded.
    pub fn stop(&mut self) {
        if self.state == HostState::Stopped {
            return;
        }

        let targets = self.connections.addrs();
        if let Err(e) = self.broadcast(&targets, Message::Leave) {
            log::warn!("Failed to notify clients of shutdown: {}", e);
        }

        self.connections.clear();
        self.roster.write(|roster| roster.clear());
        let discarded = self.events.clear();
        self.endpoint = None;
        self.state = HostState::Stopped;

        log::info!(
            "Host stopped after {} ticks ({} undelivered events dropped)",
            self.tick,
            discarded
        );
    }

    fn handle_message(
        &mut self,
        message: Message,
        addr: SocketAddr,
        now: Instant,
    ) -> Result<(), SessionError> {
        self.connections.touch(&addr, now);

        match message {
            Message::JoinRequest => self.handle_join_request(addr, now),
            Message::StateUpdate(state) => self.handle_state_update(addr, state),
            Message::Leave => {
                if let Some(conn) = self.connections.remove_by_addr(&addr) {
                    log::info!("Player {} left", conn.player_id);
                    self.remove_peer(conn.player_id, LeaveReason::Graceful);
                }
                Ok(())
            }
            Message::Ping { timestamp_ms } => self.send(addr, Message::Pong { timestamp_ms }),
            Message::Pong { .. } => Ok(()),
            Message::ShotFired {
                origin, direction, ..
            } => self.handle_shot(addr, origin, direction),
            Message::PlayerRespawn { position, .. } => self.handle_respawn(addr, position),
            other => Err(SessionError::violation(format!(
                "{} is never sent to the host",
                other.kind()
            ))),
        }
    }

    fn handle_join_request(&mut self, addr: SocketAddr, now: Instant) -> Result<(), SessionError> {
        match self.connections.admit(addr, now) {
            Admission::Full => {
                self.send(
                    addr,
                    Message::JoinRejected {
                        reason: RejectReason::CapacityExceeded,
                    },
                )?;
                Err(SessionError::CapacityExceeded {
                    max_peers: self.config.max_peers,
                })
            }
            Admission::AlreadyConnected(player_id) => {
                log::debug!("Repeated join from {} (player {})", addr, player_id);
                let existing_players = self.states_except(player_id);
                self.send(
                    addr,
                    Message::JoinAssigned {
                        assigned_id: player_id,
                        existing_players,
                    },
                )
            }
            Admission::Accepted(player_id) => {
                // Captured before the newcomer's own entry exists.
                let existing_players = self.roster.read().values();
                let assigned = Message::JoinAssigned {
                    assigned_id: player_id,
                    existing_players,
                };
                match self.send(addr, assigned) {
                    Ok(()) => {}
                    // Never left the host; a retry must start from scratch.
                    Err(e @ SessionError::MalformedMessage(_)) => {
                        self.connections.remove(player_id);
                        return Err(e);
                    }
                    // The client retries and lands in AlreadyConnected.
                    Err(e) => log::warn!("Failed to send assignment to {}: {}", addr, e),
                }

                self.roster
                    .write(|roster| roster.insert(PlayerState::placeholder(player_id)));

                let others = self.connections.addrs_except(player_id);
                self.broadcast(&others, Message::PlayerJoin { player_id })?;

                self.events.push(RemoteEvent::PeerJoined {
                    id: player_id,
                    initial_state: None,
                });
                log::info!("Player {} joined from {}", player_id, addr);
                Ok(())
            }
        }
    }

    fn handle_state_update(
        &mut self,
        addr: SocketAddr,
        mut state: PlayerState,
    ) -> Result<(), SessionError> {
        let player_id = self.sender_id(addr, "STATE_UPDATE")?;

        if state.id != player_id {
            log::debug!(
                "Player {} stamped its state as {}, correcting",
                player_id,
                state.id
            );
            state.id = player_id;
        }

        if self.roster.write(|roster| roster.apply(state)) {
            self.events.push(RemoteEvent::PeerStateUpdated {
                id: player_id,
                state,
            });
        } else {
            log::trace!(
                "Discarding stale state {} from player {}",
                state.sequence,
                player_id
            );
        }
        Ok(())
    }

    fn handle_shot(
        &mut self,
        addr: SocketAddr,
        origin: [f32; 3],
        direction: [f32; 3],
    ) -> Result<(), SessionError> {
        let owner_id = self.sender_id(addr, "SHOT_FIRED")?;
        let projectile_id = self.allocate_projectile_id();

        self.events.push(RemoteEvent::ShotFired {
            owner_id,
            projectile_id,
            origin,
            direction,
        });

        let others = self.connections.addrs_except(owner_id);
        self.broadcast(
            &others,
            Message::ShotFired {
                owner_id,
                projectile_id,
                origin,
                direction,
            },
        )
    }

    fn handle_respawn(&mut self, addr: SocketAddr, position: [f32; 3]) -> Result<(), SessionError> {
        let player_id = self.sender_id(addr, "PLAYER_RESPAWN")?;

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

        let others = self.connections.addrs_except(player_id);
        self.broadcast(
            &others,
            Message::PlayerRespawn {
                player_id,
                position,
            },
        )
    }

    fn sender_id(&self, addr: SocketAddr, kind: &str) -> Result<PlayerId, SessionError> {
        self.connections
            .id_for(&addr)
            .ok_or_else(|| SessionError::violation(format!("{} from unjoined {}", kind, addr)))
    }

    fn remove_peer(&mut self, player_id: PlayerId, reason: LeaveReason) {
        self.roster.write(|roster| roster.remove(player_id));

        let targets = self.connections.addrs();
        if let Err(e) = self.broadcast(&targets, Message::PlayerLeave { player_id, reason }) {
            log::warn!("Failed to announce departure of {}: {}", player_id, e);
        }

        self.events.push(RemoteEvent::PeerLeft {
            id: player_id,
            reason,
        });
    }

    fn states_except(&self, player_id: PlayerId) -> Vec<PlayerState> {
        self.roster
            .read()
            .iter()
            .filter(|state| state.id != player_id)
            .copied()
            .collect()
    }

    fn allocate_projectile_id(&mut self) -> u32 {
        let id = self.next_projectile_id;
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        id
    }

    fn send(&mut self, addr: SocketAddr, message: Message) -> Result<(), SessionError> {
        let endpoint = self.endpoint.as_mut().ok_or(SessionError::NotConnected)?;
        let bytes = encode(message)?;
        endpoint.send_to(&bytes, addr)?;
        Ok(())
    }

    /// Encodes once, sends to each target. A failed send to one target does
    /// not stop the others.
    fn broadcast(&mut self, targets: &[SocketAddr], message: Message) -> Result<(), SessionError> {
        if targets.is_empty() {
            return Ok(());
        }

        let endpoint = self.endpoint.as_mut().ok_or(SessionError::NotConnected)?;
        let bytes = encode(message)?;
        for addr in targets {
            if let Err(e) = endpoint.send_to(&bytes, *addr) {
                log::warn!("Send to {} failed: {}", addr, e);
            }
        }
        Ok(())
    }
}

impl Session for HostSession {
    fn update(&mut self, dt: Duration, source: &mut dyn LocalStateSource) {
        HostSession::update(self, dt, source);
    }

    fn send_gameplay(&mut self, event: GameplayEvent) {
        HostSession::send_gameplay(self, event);
    }

    fn events(&self) -> ReconciliationQueue {
        HostSession::events(self)
    }

    fn roster(&self) -> SharedRoster {
        HostSession::roster(self)
    }

    fn local_id(&self) -> Option<PlayerId> {
        match self.state {
            HostState::Stopped => None,
            _ => Some(HOST_ID),
        }
    }

    fn is_active(&self) -> bool {
        self.state != HostState::Stopped
    }

    fn shutdown(&mut self) {
        self.stop();
    }
}
