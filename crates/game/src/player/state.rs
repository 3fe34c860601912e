use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize};

pub type PlayerId = u32;

/// The hosting peer always owns identity 0.
pub const HOST_ID: PlayerId = 0;

pub const DEFAULT_HEALTH: i32 = 100;

/// Replicated per-tick state of one peer. Rotation is Euler degrees.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerState {
    pub id: PlayerId,
    /// Publication counter stamped by the owning session.
    pub sequence: u32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub health: i32,
    pub alive: bool,
}

impl PlayerState {
    pub fn new(id: PlayerId, position: Vec3, rotation: Vec3) -> Self {
        Self {
            id,
            sequence: 0,
            position: position.to_array(),
            rotation: rotation.to_array(),
            health: DEFAULT_HEALTH,
            alive: true,
        }
    }

    /// Stand-in for a peer that has not published yet.
    pub fn placeholder(id: PlayerId) -> Self {
        Self::new(id, Vec3::ZERO, Vec3::ZERO)
    }

    pub fn position_vec(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    pub fn rotation_vec(&self) -> Vec3 {
        Vec3::from(self.rotation)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position.to_array();
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation.to_array();
    }

    pub fn is_placeholder(&self) -> bool {
        self.sequence == 0
    }
}
