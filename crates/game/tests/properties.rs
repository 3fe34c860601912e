use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;

use glam::Vec3;
use proptest::prelude::*;

use dogfight::net::{Admission, ConnectionManager};
use dogfight::{HOST_ID, PlayerState, Roster};

#[derive(Debug, Clone)]
enum Op {
    Join(u16),
    Leave(u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u16..12).prop_map(Op::Join),
        1 => (0u16..12).prop_map(Op::Leave),
    ]
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 7000 + port))
}

fn state() -> impl Strategy<Value = PlayerState> {
    (0u32..4, 0u32..50, -100.0f32..100.0).prop_map(|(id, sequence, x)| {
        let mut state = PlayerState::new(id, Vec3::new(x, 0.0, 0.0), Vec3::ZERO);
        state.sequence = sequence;
        state
    })
}

proptest! {
    #[test]
    fn identities_are_unique_and_never_reused(ops in prop::collection::vec(op(), 1..80)) {
        let mut connections = ConnectionManager::new(7);
        let mut ever_assigned = HashSet::new();
        let now = Instant::now();

        for op in ops {
            match op {
                Op::Join(port) => {
                    if let Admission::Accepted(id) = connections.admit(addr(port), now) {
                        prop_assert_ne!(id, HOST_ID);
                        prop_assert!(ever_assigned.insert(id), "identity {} handed out twice", id);
                    }
                }
                Op::Leave(port) => {
                    connections.remove_by_addr(&addr(port));
                }
            }

            let live: Vec<_> = connections.iter().map(|c| c.player_id).collect();
            let distinct: HashSet<_> = live.iter().copied().collect();
            prop_assert_eq!(live.len(), distinct.len());
            prop_assert!(connections.len() <= 7);
        }
    }

    #[test]
    fn applying_a_snapshot_twice_changes_nothing(states in prop::collection::vec(state(), 0..16)) {
        let mut roster = Roster::new();
        for state in &states {
            roster.apply(*state);
        }
        let once = roster.clone();

        for state in &states {
            prop_assert!(!roster.apply(*state));
        }
        prop_assert_eq!(roster, once);
    }

    #[test]
    fn arrival_order_does_not_matter(mut states in prop::collection::vec(state(), 1..16)) {
        // One publication per (id, sequence) pair, as a real publisher produces.
        let mut seen = HashSet::new();
        states.retain(|s| seen.insert((s.id, s.sequence)));

        let mut forward = Roster::new();
        for state in &states {
            forward.apply(*state);
        }
        let mut backward = Roster::new();
        for state in states.iter().rev() {
            backward.apply(*state);
        }

        prop_assert_eq!(&forward, &backward);
        for state in forward.iter() {
            let newest = states
                .iter()
                .filter(|s| s.id == state.id)
                .map(|s| s.sequence)
                .max();
            prop_assert_eq!(Some(state.sequence), newest);
        }
    }
}
