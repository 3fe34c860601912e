use std::time::{Duration, Instant};

use glam::Vec3;

use dogfight::{HOST_ID, LocalStateSource, PlayerState};

use crate::config::PilotConfig;

/// Stand-in for the host's own player: circles the arena at a fixed height
/// and fires along its heading every so often.
pub struct ScriptedPilot {
    config: PilotConfig,
    started: Instant,
    last_shot: Instant,
}

impl ScriptedPilot {
    pub fn new(config: PilotConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            started: now,
            last_shot: now,
        }
    }

    pub fn state_at(&self, now: Instant) -> PlayerState {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f32();
        let angle = (elapsed * self.config.orbit_speed).to_radians();

        let position = Vec3::new(
            angle.cos() * self.config.orbit_radius,
            self.config.altitude,
            angle.sin() * self.config.orbit_radius,
        );
        // Tangent to the circle, counter-clockwise.
        let heading = -angle.to_degrees() - 90.0;

        PlayerState::new(HOST_ID, position, Vec3::new(0.0, heading, 0.0))
    }

    /// Origin and direction of a shot, when one is due.
    pub fn take_shot(&mut self, now: Instant) -> Option<([f32; 3], [f32; 3])> {
        if self.config.fire_interval <= 0.0 {
            return None;
        }
        let interval = Duration::from_secs_f32(self.config.fire_interval);
        if now.saturating_duration_since(self.last_shot) < interval {
            return None;
        }
        self.last_shot = now;

        let position = self.state_at(now).position_vec();
        let tangent = Vec3::new(-position.z, 0.0, position.x).normalize_or_zero();
        Some((position.to_array(), tangent.to_array()))
    }
}

impl LocalStateSource for ScriptedPilot {
    fn produce_local_state(&mut self) -> Option<PlayerState> {
        Some(self.state_at(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_on_the_orbit() {
        let pilot = ScriptedPilot::new(PilotConfig::default());
        let later = pilot.started + Duration::from_secs(7);
        let position = pilot.state_at(later).position_vec();

        let radius = Vec3::new(position.x, 0.0, position.z).length();
        assert!((radius - 20.0).abs() < 1e-3);
        assert_eq!(position.y, 8.0);
    }

    #[test]
    fn fires_on_interval() {
        let mut pilot = ScriptedPilot::new(PilotConfig::default());
        let start = pilot.started;

        assert!(pilot.take_shot(start + Duration::from_secs(1)).is_none());
        assert!(pilot.take_shot(start + Duration::from_secs(3)).is_some());
        assert!(pilot.take_shot(start + Duration::from_secs(4)).is_none());
    }
}
