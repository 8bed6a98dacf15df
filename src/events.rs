//! Event subscription registry shared by the capture and transcription leaves.
//!
//! Listeners are additive: registering twice for the same kind delivers the
//! event twice. Removal takes back the exact handle returned by `add`, so
//! repeated subscribe/unsubscribe cycles cannot strand a listener in the
//! table or silently remove somebody else's.

use tokio::sync::mpsc;

/// Proof of a single registration. Required for removal.
#[derive(Debug)]
#[must_use = "dropping the handle without removing it leaves the listener registered"]
pub struct ListenerHandle<K> {
    kind: K,
    id: u64,
}

impl<K: Copy> ListenerHandle<K> {
    pub fn kind(&self) -> K {
        self.kind
    }
}

/// Registry of event subscribers keyed by event kind.
#[derive(Debug)]
pub struct ListenerTable<K, E> {
    next_id: u64,
    entries: Vec<(K, u64, mpsc::UnboundedSender<E>)>,
}

impl<K: Copy + Eq, E: Clone> ListenerTable<K, E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register a listener for `kind`. Returns the receiving half and the
    /// handle needed to deregister it later.
    pub fn add(&mut self, kind: K) -> (ListenerHandle<K>, mpsc::UnboundedReceiver<E>) {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.entries.push((kind, id, tx));

        (ListenerHandle { kind, id }, rx)
    }

    /// Deregister the listener behind `handle`. Dropping the sender closes
    /// the subscriber's receiver, which is how consumers observe teardown.
    ///
    /// Returns false if the handle was already removed.
    pub fn remove(&mut self, handle: ListenerHandle<K>) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|(kind, id, _)| !(*kind == handle.kind && *id == handle.id));
        self.entries.len() != before
    }

    /// Deliver `event` to every listener registered for `kind`.
    pub fn dispatch(&self, kind: K, event: E) {
        for (entry_kind, _, tx) in &self.entries {
            if *entry_kind == kind {
                // Subscriber may have dropped its receiver; nothing to do.
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Total registered listeners across all kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Copy + Eq, E: Clone> Default for ListenerTable<K, E> {
    fn default() -> Self {
        Self::new()
    }
}
