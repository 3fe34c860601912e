use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::state::{PlayerId, PlayerState};
use crate::net::sequence_greater_than;

/// Identity -> latest known state. Entries are overwritten, never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    players: BTreeMap<PlayerId, PlayerState>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `state` if the identity is unknown or `state` is strictly newer
    /// than the stored one. Returns whether the roster changed.
    pub fn apply(&mut self, state: PlayerState) -> bool {
        if let Some(existing) = self.players.get(&state.id) {
            if !sequence_greater_than(state.sequence, existing.sequence) {
                return false;
            }
        }
        self.players.insert(state.id, state);
        true
    }

    /// Overwrites unconditionally. Used for authoritative local writes.
    pub fn insert(&mut self, state: PlayerState) {
        self.players.insert(state.id, state);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerState> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    /// All states in identity order.
    pub fn values(&self) -> Vec<PlayerState> {
        self.players.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}

/// Roster shared between the network side (sole writer) and the game loop,
/// which only takes copies.
#[derive(Debug, Clone, Default)]
pub struct SharedRoster {
    inner: Arc<RwLock<Roster>>,
}

impl SharedRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Roster> {
        self.inner.read()
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Roster) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn snapshot(&self) -> Roster {
        self.inner.read().clone()
    }

    pub fn get(&self, id: PlayerId) -> Option<PlayerState> {
        self.inner.read().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: PlayerId, sequence: u32, x: f32) -> PlayerState {
        let mut state = PlayerState::placeholder(id);
        state.sequence = sequence;
        state.position[0] = x;
        state
    }

    #[test]
    fn first_sighting_is_stored() {
        let mut roster = Roster::new();
        assert!(roster.apply(state(1, 0, 0.0)));
        assert!(roster.contains(1));
    }

    #[test]
    fn newer_overwrites_older_is_ignored() {
        let mut roster = Roster::new();
        roster.apply(state(1, 5, 5.0));

        assert!(!roster.apply(state(1, 4, 4.0)));
        assert_eq!(roster.get(1).unwrap().position[0], 5.0);

        assert!(roster.apply(state(1, 6, 6.0)));
        assert_eq!(roster.get(1).unwrap().position[0], 6.0);
    }

    #[test]
    fn duplicate_is_a_no_op() {
        let mut roster = Roster::new();
        roster.apply(state(3, 9, 1.0));
        let before = roster.clone();

        assert!(!roster.apply(state(3, 9, 1.0)));
        assert_eq!(roster, before);
    }

    #[test]
    fn wrapping_sequence_is_newer() {
        let mut roster = Roster::new();
        roster.apply(state(1, u32::MAX, 1.0));
        assert!(roster.apply(state(1, 0, 2.0)));
    }

    #[test]
    fn shared_roster_copies_out() {
        let shared = SharedRoster::new();
        shared.write(|roster| roster.insert(state(0, 0, 0.0)));

        let copy = shared.snapshot();
        shared.write(|roster| roster.remove(0));

        assert_eq!(copy.len(), 1);
        assert!(shared.is_empty());
    }
}
