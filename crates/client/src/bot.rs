use std::time::Instant;

use glam::Vec3;

use dogfight::{
    DEFAULT_HEALTH, InterpolationConfig, JoinFailure, PlayerId, PlayerState, RemoteEvent,
    RemoteEventSink, RemoteStateInterpolator,
};

/// Figure-eight flight path, offset per bot so several bots do not overlap.
pub struct Flight {
    started: Instant,
    offset: f32,
}

impl Flight {
    pub fn new(offset: f32) -> Self {
        Self {
            started: Instant::now(),
            offset,
        }
    }

    pub fn state_at(&self, now: Instant, health: i32) -> PlayerState {
        let t = now.saturating_duration_since(self.started).as_secs_f32() * 0.5;

        let position = Vec3::new(
            t.sin() * 25.0,
            10.0 + self.offset,
            (2.0 * t).sin() * 12.0 + self.offset,
        );
        let velocity = Vec3::new(t.cos() * 25.0, 0.0, (2.0 * t).cos() * 24.0);
        let yaw = velocity.x.atan2(velocity.z).to_degrees();

        let mut state = PlayerState::new(0, position, Vec3::new(0.0, yaw, 0.0));
        state.health = health;
        state.alive = health > 0;
        state
    }
}

/// What the bot's game loop knows about the session, fed from drained events.
pub struct BotWorld {
    interpolator: RemoteStateInterpolator,
    identity: Option<PlayerId>,
    failure: Option<JoinFailure>,
    health: i32,
}

impl BotWorld {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            interpolator: RemoteStateInterpolator::new(config),
            identity: None,
            failure: None,
            health: DEFAULT_HEALTH,
        }
    }

    pub fn identity(&self) -> Option<PlayerId> {
        self.identity
    }

    pub fn failure(&self) -> Option<JoinFailure> {
        self.failure
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn revive(&mut self) {
        self.health = DEFAULT_HEALTH;
    }

    pub fn interpolator(&self) -> &RemoteStateInterpolator {
        &self.interpolator
    }
}

impl RemoteEventSink for BotWorld {
    fn apply_remote_event(&mut self, event: RemoteEvent) {
        self.interpolator.apply_event(&event, Instant::now());

        match event {
            RemoteEvent::Joined { id } => {
                log::info!("Joined as player {}", id);
                self.identity = Some(id);
            }
            RemoteEvent::PeerJoined { id, .. } => log::info!("Player {} joined", id),
            RemoteEvent::PeerLeft { id, reason } => {
                log::info!("Player {} {}", id, reason.as_str())
            }
            RemoteEvent::PeerRespawned { id, .. } => log::info!("Player {} respawned", id),
            RemoteEvent::ShotFired {
                owner_id,
                projectile_id,
                ..
            } => log::debug!("Player {} fired projectile {}", owner_id, projectile_id),
            RemoteEvent::PlayerHit {
                target_id,
                attacker_id,
                damage,
            } => {
                if Some(target_id) == self.identity {
                    self.health -= damage;
                    log::info!(
                        "Hit by player {} for {}, health {}",
                        attacker_id,
                        damage,
                        self.health
                    );
                }
            }
            RemoteEvent::Closed { failure } => {
                log::warn!("Session ended: {}", failure.as_str());
                self.failure = Some(failure);
            }
            RemoteEvent::PeerStateUpdated { .. } => {}
        }
    }
}
