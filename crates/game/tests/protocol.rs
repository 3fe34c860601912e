mod common;

use std::net::SocketAddr;
use std::time::Duration;

use glam::Vec3;

use common::*;
use dogfight::net::{Message, NetworkEndpoint, RejectReason};
use dogfight::{HOST_ID, HostSession, PlayerState, RemoteEvent, SessionConfig};

fn raw_peer() -> NetworkEndpoint {
    NetworkEndpoint::bind("127.0.0.1:0").unwrap()
}

fn assignment(messages: &[Message]) -> Option<(u32, Vec<u32>)> {
    messages.iter().find_map(|message| match message {
        Message::JoinAssigned {
            assigned_id,
            existing_players,
        } => Some((
            *assigned_id,
            existing_players.iter().map(|state| state.id).collect(),
        )),
        _ => None,
    })
}

fn has_assignment(messages: &[Message]) -> bool {
    assignment(messages).is_some()
}

fn snapshot_has(messages: &[Message], id: u32, sequence: u32) -> bool {
    messages.iter().any(|message| match message {
        Message::Snapshot { states, .. } => {
            states.iter().any(|s| s.id == id && s.sequence == sequence)
        }
        _ => false,
    })
}

fn is_shot(message: &Message) -> bool {
    matches!(message, Message::ShotFired { .. })
}

fn is_respawn(message: &Message) -> bool {
    matches!(message, Message::PlayerRespawn { .. })
}

fn is_hit(message: &Message) -> bool {
    matches!(message, Message::PlayerHit { .. })
}

/// Joins two raw peers, returning them as identities 1 and 2.
fn two_raw_peers(host: &mut HostSession, addr: SocketAddr) -> (NetworkEndpoint, NetworkEndpoint) {
    let mut first = raw_peer();
    let mut second = raw_peer();

    send(&mut first, addr, Message::JoinRequest);
    collect_until(host, &mut first, has_assignment);
    send(&mut second, addr, Message::JoinRequest);
    collect_until(host, &mut second, has_assignment);

    (first, second)
}

#[test]
fn test_assignment_carries_published_states() {
    let (mut host, addr) = start_host(fast_config());
    let mut first = raw_peer();
    let mut second = raw_peer();

    send(&mut first, addr, Message::JoinRequest);
    let received = collect_until(&mut host, &mut first, has_assignment);
    assert_eq!(assignment(&received), Some((1, vec![HOST_ID])));

    host.tick(Some(PlayerState::new(HOST_ID, Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO)));
    let mut published = PlayerState::new(1, Vec3::new(-7.0, 0.0, 2.0), Vec3::ZERO);
    published.sequence = 4;
    send(&mut first, addr, Message::StateUpdate(published));
    let received = collect_until(&mut host, &mut first, |messages| snapshot_has(messages, 1, 4));
    assert!(snapshot_has(&received, 1, 4));

    send(&mut second, addr, Message::JoinRequest);
    let received = collect_until(&mut host, &mut second, has_assignment);
    let Some(Message::JoinAssigned {
        assigned_id,
        existing_players,
    }) = received.into_iter().find(|m| matches!(m, Message::JoinAssigned { .. }))
    else {
        panic!("no assignment received");
    };

    assert_eq!(assigned_id, 2);
    let listed: Vec<_> = existing_players
        .iter()
        .map(|s| (s.id, s.sequence, s.position))
        .collect();
    assert_eq!(
        listed,
        vec![(HOST_ID, 1, [3.0, 4.0, 5.0]), (1, 4, [-7.0, 0.0, 2.0])]
    );
}

#[test]
fn test_announcement_goes_to_others_only() {
    let (mut host, addr) = start_host(fast_config());
    let mut first = raw_peer();
    let mut second = raw_peer();

    send(&mut first, addr, Message::JoinRequest);
    collect_until(&mut host, &mut first, has_assignment);

    send(&mut second, addr, Message::JoinRequest);
    let to_joiner = collect_for(&mut host, &mut second, Duration::from_millis(150));
    let to_first = collect_for(&mut host, &mut first, Duration::from_millis(50));

    assert!(to_first.contains(&Message::PlayerJoin { player_id: 2 }));
    assert!(
        to_joiner
            .iter()
            .all(|message| !matches!(message, Message::PlayerJoin { .. }))
    );
}

#[test]
fn test_repeated_request_keeps_identity() {
    let (mut host, addr) = start_host(fast_config());
    let mut peer = raw_peer();

    send(&mut peer, addr, Message::JoinRequest);
    let first = collect_until(&mut host, &mut peer, has_assignment);
    send(&mut peer, addr, Message::JoinRequest);
    let second = collect_until(&mut host, &mut peer, has_assignment);

    assert_eq!(assignment(&first).map(|(id, _)| id), Some(1));
    assert_eq!(assignment(&second).map(|(id, _)| id), Some(1));
    assert_eq!(host.peer_count(), 2);
}

#[test]
fn test_spoofed_identity_is_ignored() {
    let (mut host, addr) = start_host(fast_config());
    let mut peer = raw_peer();

    send(&mut peer, addr, Message::JoinRequest);
    collect_until(&mut host, &mut peer, has_assignment);

    let mut forged = PlayerState::new(HOST_ID, Vec3::splat(99.0), Vec3::ZERO);
    forged.sequence = 1;
    send(&mut peer, addr, Message::StateUpdate(forged));

    let snapshots = collect_until(&mut host, &mut peer, |messages| snapshot_has(messages, 1, 1));

    let Some(Message::Snapshot { states, .. }) = snapshots.last() else {
        panic!("no snapshot received");
    };
    let host_entry = states.iter().find(|s| s.id == HOST_ID).unwrap();
    let peer_entry = states.iter().find(|s| s.id == 1).unwrap();
    assert_eq!(host_entry.position, [0.0; 3]);
    assert_eq!(peer_entry.position, [99.0; 3]);
}

#[test]
fn test_capacity_rejection() {
    let config = SessionConfig {
        max_peers: 2,
        ..fast_config()
    };
    let (mut host, addr) = start_host(config);
    let mut admitted = raw_peer();
    let mut refused = raw_peer();

    send(&mut admitted, addr, Message::JoinRequest);
    collect_until(&mut host, &mut admitted, has_assignment);

    send(&mut refused, addr, Message::JoinRequest);
    let received = collect_until(&mut host, &mut refused, |messages| !messages.is_empty());

    assert_eq!(
        received,
        vec![Message::JoinRejected {
            reason: RejectReason::CapacityExceeded
        }]
    );
    assert_eq!(host.peer_count(), 2);
}

#[test]
fn test_garbage_does_not_disturb_host() {
    let (mut host, addr) = start_host(fast_config());
    let mut peer = raw_peer();

    peer.send_to(b"{\"type\": \"PLAYER_JOIN\"}", addr).unwrap();
    peer.send_to(&[0xFF; 64], addr).unwrap();
    peer.send_to(&[1, 2, 3], addr).unwrap();
    send(&mut peer, addr, Message::JoinRequest);

    let received = collect_until(&mut host, &mut peer, has_assignment);
    assert_eq!(assignment(&received).map(|(id, _)| id), Some(1));
}

#[test]
fn test_unjoined_traffic_is_dropped() {
    let (mut host, addr) = start_host(fast_config());
    let mut stranger = raw_peer();

    let state = PlayerState::new(5, Vec3::ONE, Vec3::ZERO);
    send(&mut stranger, addr, Message::StateUpdate(state));
    let received = collect_for(&mut host, &mut stranger, Duration::from_millis(100));

    assert!(received.is_empty());
    assert!(host.roster().get(5).is_none());
    assert!(host.events().is_empty());
}

#[test]
fn test_shot_is_stamped_and_relayed_to_others() {
    let (mut host, addr) = start_host(fast_config());
    let (mut shooter, mut watcher) = two_raw_peers(&mut host, addr);
    host.events().clear();

    let origin = [1.0, 2.0, 3.0];
    let direction = [0.0, 0.0, 1.0];
    send(
        &mut shooter,
        addr,
        Message::ShotFired {
            owner_id: HOST_ID,
            projectile_id: 77,
            origin,
            direction,
        },
    );

    let seen = collect_until(&mut host, &mut watcher, |messages| messages.iter().any(is_shot));
    let relayed: Vec<_> = seen.into_iter().filter(is_shot).collect();
    assert_eq!(
        relayed,
        vec![Message::ShotFired {
            owner_id: 1,
            projectile_id: 0,
            origin,
            direction,
        }]
    );

    let echoed = collect_for(&mut host, &mut shooter, Duration::from_millis(100));
    assert!(!echoed.iter().any(is_shot));
    assert!(host.events().drain().contains(&RemoteEvent::ShotFired {
        owner_id: 1,
        projectile_id: 0,
        origin,
        direction,
    }));
}

#[test]
fn test_respawn_is_relayed_to_others() {
    let (mut host, addr) = start_host(fast_config());
    let (mut mover, mut watcher) = two_raw_peers(&mut host, addr);
    host.events().clear();

    let position = [0.0, 40.0, 0.0];
    send(
        &mut mover,
        addr,
        Message::PlayerRespawn {
            player_id: 9,
            position,
        },
    );

    let seen = collect_until(&mut host, &mut watcher, |messages| messages.iter().any(is_respawn));
    assert!(seen.contains(&Message::PlayerRespawn {
        player_id: 1,
        position
    }));

    let echoed = collect_for(&mut host, &mut mover, Duration::from_millis(100));
    assert!(!echoed.iter().any(is_respawn));
    assert!(
        host.events()
            .drain()
            .contains(&RemoteEvent::PeerRespawned { id: 1, position })
    );
    assert_eq!(host.roster().get(1).map(|s| s.position), Some(position));
    assert!(host.roster().get(9).is_none());
}

#[test]
fn test_client_hit_claim_is_not_relayed() {
    let (mut host, addr) = start_host(fast_config());
    let (mut attacker, mut victim) = two_raw_peers(&mut host, addr);
    host.events().clear();

    send(
        &mut attacker,
        addr,
        Message::PlayerHit {
            target_id: 2,
            attacker_id: 1,
            damage: 100,
        },
    );

    let seen = collect_for(&mut host, &mut victim, Duration::from_millis(150));
    assert!(!seen.iter().any(is_hit));
    assert!(
        !host
            .events()
            .drain()
            .iter()
            .any(|event| matches!(event, RemoteEvent::PlayerHit { .. }))
    );
}

#[test]
fn test_ping_is_answered_with_same_timestamp() {
    let (mut host, addr) = start_host(fast_config());
    let mut peer = raw_peer();

    send(&mut peer, addr, Message::Ping { timestamp_ms: 4242 });
    let received = collect_until(&mut host, &mut peer, |messages| !messages.is_empty());

    assert_eq!(received, vec![Message::Pong { timestamp_ms: 4242 }]);
}
