use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::event::{GameplayEvent, ReconciliationQueue};
use crate::player::{PlayerState, SharedRoster};

use super::{LocalStateSource, Session};

/// Latest local player state, written by the game loop and read by the
/// network thread once per tick.
#[derive(Debug, Clone, Default)]
pub struct LocalStateSlot {
    latest: Arc<Mutex<Option<PlayerState>>>,
}

impl LocalStateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, state: PlayerState) {
        *self.latest.lock() = Some(state);
    }

    pub fn latest(&self) -> Option<PlayerState> {
        *self.latest.lock()
    }

    pub fn clear(&self) {
        *self.latest.lock() = None;
    }
}

impl LocalStateSource for LocalStateSlot {
    fn produce_local_state(&mut self) -> Option<PlayerState> {
        self.latest()
    }
}

/// Runs a session on its own thread. The game loop keeps the queue, roster
/// and state slot handles; the session itself never leaves the thread.
pub struct NetworkThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    events: ReconciliationQueue,
    roster: SharedRoster,
    local_state: LocalStateSlot,
    outbound: Sender<GameplayEvent>,
}

impl NetworkThread {
    pub fn spawn<S>(session: S, poll_interval: Duration) -> io::Result<Self>
    where
        S: Session + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let events = session.events();
        let roster = session.roster();
        let local_state = LocalStateSlot::new();
        let (outbound, inbound) = crossbeam_channel::unbounded();

        let thread_running = Arc::clone(&running);
        let source = local_state.clone();
        let handle = thread::Builder::new()
            .name("session-net".into())
            .spawn(move || run(session, source, inbound, thread_running, poll_interval))?;

        Ok(Self {
            running,
            handle: Some(handle),
            events,
            roster,
            local_state,
            outbound,
        })
    }

    pub fn events(&self) -> &ReconciliationQueue {
        &self.events
    }

    pub fn roster(&self) -> &SharedRoster {
        &self.roster
    }

    pub fn publish_local_state(&self, state: PlayerState) {
        self.local_state.publish(state);
    }

    pub fn send_gameplay(&self, event: GameplayEvent) {
        if self.outbound.send(event).is_err() {
            log::warn!("Network thread gone, dropping {:?}", event);
        }
    }

    /// False once stopped, or once the session ended on its own.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Network thread panicked");
            }
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<S: Session>(
    mut session: S,
    mut source: LocalStateSlot,
    inbound: Receiver<GameplayEvent>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    log::debug!("Network thread started");
    let mut last_update = Instant::now();

    while running.load(Ordering::SeqCst) {
        for event in inbound.try_iter() {
            session.send_gameplay(event);
        }

        let now = Instant::now();
        session.update(now - last_update, &mut source);
        last_update = now;

        if !session.is_active() {
            running.store(false, Ordering::SeqCst);
            break;
        }

        thread::sleep(poll_interval);
    }

    session.shutdown();
    log::debug!("Network thread stopped");
}
