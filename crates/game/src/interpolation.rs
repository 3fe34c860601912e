use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::event::RemoteEvent;
use crate::net::DEFAULT_TICK_RATE;
use crate::player::{PlayerId, PlayerState};

pub const DEFAULT_SNAP_DISTANCE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Rate remote states are published at; one interpolation window per tick.
    pub tick_rate: u32,
    /// How far past the latest state to keep moving, in ticks, before holding.
    pub max_extrapolation_ticks: f32,
    /// Jumps longer than this are teleports and are not smoothed.
    pub snap_distance: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_extrapolation_ticks: 2.0,
            snap_distance: DEFAULT_SNAP_DISTANCE,
        }
    }
}

impl InterpolationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[derive(Debug, Clone, Copy)]
struct Track {
    previous: PlayerState,
    current: PlayerState,
    received_at: Instant,
}

impl Track {
    fn new(state: PlayerState, received_at: Instant) -> Self {
        Self {
            previous: state,
            current: state,
            received_at,
        }
    }

    fn progress(&self, render_time: Instant, config: &InterpolationConfig) -> f32 {
        let elapsed = render_time.saturating_duration_since(self.received_at);
        let t = elapsed.as_secs_f32() / config.tick_period().as_secs_f32();
        t.min(1.0 + config.max_extrapolation_ticks.max(0.0))
    }

    fn sample(&self, render_time: Instant, config: &InterpolationConfig) -> PlayerState {
        let t = self.progress(render_time, config);

        let mut shown = self.current;
        shown.set_position(
            self.previous
                .position_vec()
                .lerp(self.current.position_vec(), t),
        );
        for axis in 0..3 {
            shown.rotation[axis] =
                lerp_degrees(self.previous.rotation[axis], self.current.rotation[axis], t);
        }
        shown
    }
}

/// Per-peer smoothing between the discrete states that arrive each tick.
///
/// Each identity keeps the value that was on screen when its latest state
/// arrived and moves from there to the new state over one tick period. Past
/// that it keeps going in the same direction for a bounded number of ticks,
/// then holds. Sampling never blocks and never touches the network.
#[derive(Debug, Clone)]
pub struct RemoteStateInterpolator {
    config: InterpolationConfig,
    tracks: BTreeMap<PlayerId, Track>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpolationStats {
    pub tracked: usize,
    pub extrapolating: usize,
}

impl RemoteStateInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(InterpolationConfig::default())
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn push(&mut self, state: PlayerState, received_at: Instant) {
        let Some(track) = self.tracks.get_mut(&state.id) else {
            self.tracks.insert(state.id, Track::new(state, received_at));
            return;
        };

        let shown = track.sample(received_at, &self.config);
        let respawned = !track.current.alive && state.alive;
        let jumped =
            shown.position_vec().distance(state.position_vec()) > self.config.snap_distance;

        track.previous = if respawned || jumped { state } else { shown };
        track.current = state;
        track.received_at = received_at;
    }

    /// Teleports a peer without smoothing. Returns false for unknown ids.
    pub fn snap(&mut self, id: PlayerId, position: [f32; 3], now: Instant) -> bool {
        let Some(track) = self.tracks.get_mut(&id) else {
            return false;
        };

        track.current.position = position;
        track.current.alive = true;
        track.previous = track.current;
        track.received_at = now;
        true
    }

    pub fn sample(&self, id: PlayerId, render_time: Instant) -> Option<PlayerState> {
        self.tracks
            .get(&id)
            .map(|track| track.sample(render_time, &self.config))
    }

    pub fn sample_all(&self, render_time: Instant) -> Vec<PlayerState> {
        self.tracks
            .values()
            .map(|track| track.sample(render_time, &self.config))
            .collect()
    }

    /// Mirrors one drained event. Peers appear with their first known state.
    pub fn apply_event(&mut self, event: &RemoteEvent, now: Instant) {
        match event {
            RemoteEvent::PeerJoined {
                initial_state: Some(state),
                ..
            }
            | RemoteEvent::PeerStateUpdated { state, .. } => self.push(*state, now),
            RemoteEvent::PeerLeft { id, .. } => {
                self.remove(*id);
            }
            RemoteEvent::PeerRespawned { id, position } => {
                self.snap(*id, *position, now);
            }
            RemoteEvent::Closed { .. } => self.clear(),
            _ => {}
        }
    }

    pub fn remove(&mut self, id: PlayerId) -> bool {
        self.tracks.remove(&id).is_some()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.tracks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn debug_stats(&self, now: Instant) -> InterpolationStats {
        InterpolationStats {
            tracked: self.tracks.len(),
            extrapolating: self
                .tracks
                .values()
                .filter(|track| track.progress(now, &self.config) > 1.0)
                .count(),
        }
    }
}

/// Signed difference `to - from` folded into [-180, 180).
fn shortest_arc(from: f32, to: f32) -> f32 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

fn lerp_degrees(from: f32, to: f32, t: f32) -> f32 {
    from + shortest_arc(from, to) * t
}
