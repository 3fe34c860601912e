use std::time::Duration;

use dogfight::{InterpolationConfig, SessionConfig};

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub session: SessionConfig,
    pub interpolation: InterpolationConfig,
    /// Game loop rate; remote states are sampled this often.
    pub frame_rate: u32,
    pub network_poll_interval: Duration,
    pub report_interval: Duration,
    /// How long the bot flies before it "crashes" and respawns.
    pub respawn_interval: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            interpolation: InterpolationConfig::default(),
            frame_rate: 60,
            network_poll_interval: Duration::from_millis(2),
            report_interval: Duration::from_secs(2),
            respawn_interval: Duration::from_secs(15),
        }
    }
}

impl BotConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}
