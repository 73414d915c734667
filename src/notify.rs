//! Change notification.
//!
//! Every node gets a [`ParameterListener`]: a cheap handle holding the node
//! id and the sending side of one shared channel.  The document drains that
//! channel on the control thread, which is where "last changed parameter"
//! and the dirty flag live.  Editor collaborators subscribe to
//! [`GraphEvent`]s.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::graph::NodeId;

/// A parameter change reported by (or on behalf of) a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    pub node_id: NodeId,
    pub parameter_index: usize,
    pub value: f32,
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    /// A connection was added or removed.
    ConnectionsChanged,
    ParameterChanged(ParameterChange),
    /// The document became dirty.
    DocumentChanged,
    /// The graph was emptied (clear or before a load).
    Cleared,
    /// A plugin could not be instantiated; reported once per failure.
    PluginError { name: String, message: String },
}

/// Per-node sending handle.  Safe to call from any thread.
#[derive(Debug, Clone)]
pub struct ParameterListener {
    node_id: NodeId,
    sender: Sender<ParameterChange>,
}

impl ParameterListener {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn parameter_changed(&self, parameter_index: usize, value: f32) {
        let _ = self.sender.send(ParameterChange {
            node_id: self.node_id,
            parameter_index,
            value,
        });
    }
}

/// Fan-in point for every node listener plus fan-out to subscribers.
pub struct ChangeHub {
    tx: Sender<ParameterChange>,
    rx: Receiver<ParameterChange>,
    last_changed: Option<ParameterChange>,
    subscribers: Vec<Sender<GraphEvent>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            last_changed: None,
            subscribers: Vec::new(),
        }
    }

    pub fn listener_for(&self, node_id: NodeId) -> ParameterListener {
        ParameterListener {
            node_id,
            sender: self.tx.clone(),
        }
    }

    /// Take every queued change, oldest first.
    pub fn drain(&mut self) -> Vec<ParameterChange> {
        self.drain_live(|_| true)
    }

    /// Like [`drain`](Self::drain) but discards changes from nodes for
    /// which `is_live` is false.
    pub fn drain_live(&mut self, is_live: impl Fn(NodeId) -> bool) -> Vec<ParameterChange> {
        let changes: Vec<ParameterChange> =
            self.rx.try_iter().filter(|c| is_live(c.node_id)).collect();
        if let Some(last) = changes.last() {
            self.last_changed = Some(*last);
        }
        changes
    }

    /// Most recent change seen by [`drain`](Self::drain).
    pub fn last_changed(&self) -> Option<ParameterChange> {
        self.last_changed
    }

    pub fn forget_node(&mut self, node_id: NodeId) {
        if self.last_changed.is_some_and(|c| c.node_id == node_id) {
            self.last_changed = None;
        }
    }

    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber, pruning the ones that hung up.
    pub fn broadcast(&mut self, event: GraphEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listeners_fan_in() {
        let mut hub = ChangeHub::new();
        let a = hub.listener_for(1);
        let b = hub.listener_for(2);

        a.parameter_changed(0, 0.5);
        let handle = std::thread::spawn(move || b.parameter_changed(3, 0.25));
        handle.join().unwrap();

        let changes = hub.drain();
        assert_eq!(changes.len(), 2);
        let last = hub.last_changed().unwrap();
        assert_eq!((last.node_id, last.parameter_index), (2, 3));
        assert!(hub.drain().is_empty());
        assert_eq!(hub.last_changed(), Some(last));
    }

    #[test]
    fn test_drain_live_skips_dead_nodes() {
        let mut hub = ChangeHub::new();
        hub.listener_for(1).parameter_changed(0, 0.1);
        hub.listener_for(9).parameter_changed(2, 0.9);

        let changes = hub.drain_live(|id| id != 9);
        assert_eq!(changes.len(), 1);
        assert_eq!(hub.last_changed().unwrap().node_id, 1);
    }

    #[test]
    fn test_forget_node_clears_last_changed() {
        let mut hub = ChangeHub::new();
        hub.listener_for(4).parameter_changed(1, 1.0);
        hub.drain();
        hub.forget_node(5);
        assert!(hub.last_changed().is_some());
        hub.forget_node(4);
        assert!(hub.last_changed().is_none());
    }

    #[test]
    fn test_broadcast_prunes_dropped_subscribers() {
        let mut hub = ChangeHub::new();
        let kept = hub.subscribe();
        let dropped = hub.subscribe();
        drop(dropped);

        hub.broadcast(GraphEvent::NodeAdded(1));
        hub.broadcast(GraphEvent::DocumentChanged);
        assert_eq!(hub.subscribers.len(), 1);
        assert_eq!(
            kept.try_iter().collect::<Vec<_>>(),
            vec![GraphEvent::NodeAdded(1), GraphEvent::DocumentChanged]
        );
    }
}
