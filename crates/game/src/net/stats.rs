use serde::{Deserialize, Serialize};

/// Outbound loss injection, used to exercise the overwrite-based recovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    /// Fraction in `0.0..=1.0` of outbound datagrams to drop.
    pub loss_percent: f32,
}

impl PacketLossSimulation {
    pub fn new(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent: loss_percent.clamp(0.0, 1.0),
        }
    }

    pub fn should_drop(&self) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        if self.loss_percent >= 1.0 {
            return true;
        }
        rand_percent() < self.loss_percent
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
    pub rejected_datagrams: u64,
    pub rtt_ms: f32,
    pub rtt_samples: u64,
}

impl NetworkStats {
    /// Folds one ping sample into the smoothed round-trip estimate.
    pub fn record_rtt(&mut self, sample_ms: f32) {
        const ALPHA: f32 = 0.125;

        self.rtt_samples += 1;
        if self.rtt_samples == 1 {
            self.rtt_ms = sample_ms;
        } else {
            self.rtt_ms = (1.0 - ALPHA) * self.rtt_ms + ALPHA * sample_ms;
        }
    }
}

pub fn rand_percent() -> f32 {
    rand_u64() as f32 / u64::MAX as f32
}

pub fn rand_u64() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default(),
    );
    hasher.finish()
}

pub fn unix_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
