#![allow(dead_code)]

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use dogfight::net::{Message, NetworkEndpoint, decode, encode};
use dogfight::{ClientSession, HostSession, PlayerState, RemoteEvent, SessionConfig};

pub const STEP: Duration = Duration::from_millis(2);
pub const DEADLINE: Duration = Duration::from_secs(3);

pub fn fast_config() -> SessionConfig {
    SessionConfig {
        join_retry_interval_ms: 50,
        ping_interval_ms: 50,
        ..SessionConfig::loopback()
    }
}

pub fn start_host(config: SessionConfig) -> (HostSession, SocketAddr) {
    let host = HostSession::start(config).unwrap();
    let addr = host.local_addr().unwrap();
    (host, addr)
}

pub fn idle() -> impl FnMut() -> Option<PlayerState> {
    || None
}

/// Steps every session until `done` holds or the deadline passes.
pub fn pump_until(
    host: &mut HostSession,
    clients: &mut [&mut ClientSession],
    mut done: impl FnMut(&HostSession, &[&mut ClientSession]) -> bool,
) -> bool {
    let start = Instant::now();
    let mut source = idle();

    while start.elapsed() < DEADLINE {
        host.update(STEP, &mut source);
        for client in clients.iter_mut() {
            client.update(STEP, &mut source);
        }

        if done(&*host, &*clients) {
            return true;
        }
        thread::sleep(STEP);
    }
    false
}

pub fn pump_for(host: &mut HostSession, clients: &mut [&mut ClientSession], duration: Duration) {
    let start = Instant::now();
    pump_until(host, clients, |_, _| start.elapsed() >= duration);
}

pub fn joined_client(host: &mut HostSession, addr: SocketAddr) -> ClientSession {
    let mut client = ClientSession::new(fast_config());
    client.connect(addr).unwrap();

    let joined = pump_until(host, &mut [&mut client], |_, clients| {
        clients[0].identity().is_some()
    });
    assert!(joined, "client never received an assignment");
    client
}

pub fn peer_ids(events: &[RemoteEvent]) -> Vec<u32> {
    events.iter().filter_map(RemoteEvent::peer).collect()
}

pub fn send(endpoint: &mut NetworkEndpoint, to: SocketAddr, message: Message) {
    let bytes = encode(message).unwrap();
    endpoint.send_to(&bytes, to).unwrap();
}

/// Drives the host while collecting what a raw endpoint receives, until
/// `done` holds for the collected messages or the deadline passes.
pub fn collect_until(
    host: &mut HostSession,
    endpoint: &mut NetworkEndpoint,
    mut done: impl FnMut(&[Message]) -> bool,
) -> Vec<Message> {
    let start = Instant::now();
    let mut received = Vec::new();
    let mut source = idle();

    while start.elapsed() < DEADLINE {
        host.update(STEP, &mut source);
        for (data, _) in endpoint.poll() {
            if let Ok(message) = decode(&data) {
                received.push(message);
            }
        }

        if done(received.as_slice()) {
            break;
        }
        thread::sleep(STEP);
    }
    received
}

pub fn collect_for(
    host: &mut HostSession,
    endpoint: &mut NetworkEndpoint,
    duration: Duration,
) -> Vec<Message> {
    let start = Instant::now();
    collect_until(host, endpoint, |_| start.elapsed() >= duration)
}
