//! Observer Fanout (§4.6): who's watching a match, and pushing snapshots
//! to them without letting a dead connection wedge the match.

use tokio::sync::mpsc::UnboundedSender;

/// An opaque handle to a live subscriber. The transport layer owns the
/// receiving end (typically a WebSocket write task); we only ever push
/// serialized text and drop handles whose receiver has gone away.
#[derive(Default)]
pub struct ObserverSet {
    handles: Vec<UnboundedSender<String>>,
}

impl ObserverSet {
    pub fn subscribe(&mut self, handle: UnboundedSender<String>) {
        self.handles.push(handle);
    }

    /// Pushes `payload` to every live handle, silently dropping any whose
    /// receiver has hung up. Never panics or propagates a send failure.
    pub fn broadcast(&mut self, payload: &str) {
        self.handles.retain(|tx| tx.send(payload.to_string()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let mut set = ObserverSet::default();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        set.subscribe(tx1);
        set.subscribe(tx2);

        set.broadcast("hello");

        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn dead_receivers_are_dropped() {
        let mut set = ObserverSet::default();
        let (tx1, rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        drop(rx1);
        set.subscribe(tx1);
        set.subscribe(tx2);

        set.broadcast("first");
        assert_eq!(set.len(), 1);
        set.broadcast("second");
        assert_eq!(rx2.try_recv().unwrap(), "first");
        assert_eq!(rx2.try_recv().unwrap(), "second");
    }
}
