use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::types::RemoteEvent;

/// Consumer side of the queue, implemented by gameplay code.
pub trait RemoteEventSink {
    fn apply_remote_event(&mut self, event: RemoteEvent);
}

impl<F> RemoteEventSink for F
where
    F: FnMut(RemoteEvent),
{
    fn apply_remote_event(&mut self, event: RemoteEvent) {
        self(event)
    }
}

/// Ordered hand-off between the receive path and the game loop.
///
/// Written only by the session, drained only by the game loop. A drain takes
/// everything present at that instant; anything pushed while the drained
/// batch is being delivered waits for the next drain.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationQueue {
    pending: Arc<Mutex<VecDeque<RemoteEvent>>>,
}

impl ReconciliationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: RemoteEvent) {
        self.pending.lock().push_back(event);
    }

    pub fn drain(&self) -> Vec<RemoteEvent> {
        let batch = std::mem::take(&mut *self.pending.lock());
        batch.into()
    }

    pub fn drain_into<S: RemoteEventSink + ?Sized>(&self, sink: &mut S) -> usize {
        let batch = self.drain();
        let count = batch.len();
        for event in batch {
            sink.apply_remote_event(event);
        }
        count
    }

    /// Discards pending events without delivering them.
    pub fn clear(&self) -> usize {
        let mut pending = self.pending.lock();
        let discarded = pending.len();
        pending.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
