//! The graph store: owns every node and connection.
//!
//! Nodes keep insertion order so index-based enumeration is stable.  Every
//! mutator reports whether it changed anything; the document decides what
//! that means for its dirty flag.

use super::types::*;
use crate::error::{HostError, Result};
use crate::plugin::{PluginBackendKind, PluginInstance};

#[derive(Debug)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    connections: Vec<Connection>,
    /// Wider than `NodeId` so the counter can move past the last id.
    next_id: u64,
    automation_node_id: Option<NodeId>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            connections: Vec::new(),
            next_id: 1,
            automation_node_id: None,
        }
    }

    // ── Nodes ──────────────────────────────────────────────────────────────

    /// Insert a node under `explicit_id` (used when restoring a document)
    /// or the next free id.
    pub fn add_node(
        &mut self,
        processor: Box<dyn PluginInstance>,
        properties: NodeProperties,
        explicit_id: Option<NodeId>,
    ) -> Result<NodeId> {
        if properties.plugin_type == PluginBackendKind::AutomationTrack
            && let Some(existing) = self.automation_node_id
        {
            return Err(HostError::AutomationTrackExists(existing));
        }

        let id = match explicit_id {
            Some(id) if self.node_for_id(id).is_some() => {
                return Err(HostError::DuplicateNodeId(id));
            }
            Some(id) => id,
            None => self.next_id().ok_or(HostError::NodeIdsExhausted)?,
        };
        self.reserve_id(id);

        if properties.plugin_type == PluginBackendKind::AutomationTrack {
            self.automation_node_id = Some(id);
        }
        self.nodes.push(GraphNode::new(id, processor, properties));
        Ok(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    pub fn node_for_id(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_for_id_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(GraphNode::id).collect()
    }

    /// The id the next automatically numbered node will get, `None` once
    /// every id has been handed out.
    pub fn next_id(&self) -> Option<NodeId> {
        NodeId::try_from(self.next_id).ok()
    }

    /// Make sure `id` is never handed out automatically.
    pub fn reserve_id(&mut self, id: NodeId) {
        self.next_id = self.next_id.max(u64::from(id) + 1);
    }

    pub fn automation_node_id(&self) -> Option<NodeId> {
        self.automation_node_id
    }

    /// Remove a node, its connections and release its plugin.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(pos) = self.nodes.iter().position(|n| n.id() == id) else {
            return false;
        };
        self.disconnect_node(id);

        let mut node = self.nodes.remove(pos);
        node.release();
        drop(node);

        if self.automation_node_id == Some(id) {
            self.automation_node_id = None;
        }
        true
    }

    // ── Connections ────────────────────────────────────────────────────────

    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn connection(&self, index: usize) -> Option<&Connection> {
        self.connections.get(index)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection_between(
        &self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> Option<&Connection> {
        let wanted = Connection::new(source_node, source_channel, dest_node, dest_channel);
        self.connections.iter().find(|c| **c == wanted)
    }

    /// Whether both endpoints exist and the channels are valid for them.
    /// MIDI may only connect to MIDI.
    pub fn is_connection_legal(&self, c: &Connection) -> bool {
        if (c.source_channel == MIDI_CHANNEL_INDEX) != (c.dest_channel == MIDI_CHANNEL_INDEX) {
            return false;
        }
        let (Some(source), Some(dest)) =
            (self.node_for_id(c.source_node), self.node_for_id(c.dest_node))
        else {
            return false;
        };
        source.is_valid_output(c.source_channel) && dest.is_valid_input(c.dest_channel)
    }

    /// Pure legality check for a prospective edge: legal endpoints, not a
    /// duplicate, and no cycle (a self-loop counts as one).
    pub fn can_connect(
        &self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> bool {
        let candidate = Connection::new(source_node, source_channel, dest_node, dest_channel);
        self.is_connection_legal(&candidate)
            && !self.connections.contains(&candidate)
            && !self.is_reachable(dest_node, source_node)
    }

    pub fn add_connection(
        &mut self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> bool {
        if !self.can_connect(source_node, source_channel, dest_node, dest_channel) {
            return false;
        }
        self.connections.push(Connection::new(
            source_node,
            source_channel,
            dest_node,
            dest_channel,
        ));
        true
    }

    pub fn remove_connection(&mut self, index: usize) -> bool {
        if index < self.connections.len() {
            self.connections.remove(index);
            true
        } else {
            false
        }
    }

    pub fn remove_connection_between(
        &mut self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> bool {
        let wanted = Connection::new(source_node, source_channel, dest_node, dest_channel);
        let before = self.connections.len();
        self.connections.retain(|c| *c != wanted);
        self.connections.len() != before
    }

    /// Remove every connection touching `id`.
    pub fn disconnect_node(&mut self, id: NodeId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| !c.touches(id));
        self.connections.len() != before
    }

    /// Drop connections whose endpoints or channels no longer validate.
    pub fn remove_illegal_connections(&mut self) -> bool {
        let before = self.connections.len();
        let connections = std::mem::take(&mut self.connections);
        self.connections = connections
            .into_iter()
            .filter(|c| {
                let legal = self.is_connection_legal(c);
                if !legal {
                    log::warn!("Dropping illegal connection {:?}", c);
                }
                legal
            })
            .collect();
        self.connections.len() != before
    }

    /// Is `to` reachable from `from` by following connections downstream?
    fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = Vec::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
            stack.extend(
                self.connections
                    .iter()
                    .filter(|c| c.source_node == id)
                    .map(|c| c.dest_node),
            );
        }
        false
    }

    /// Drop everything.  Ids keep counting up.
    pub fn clear(&mut self) {
        self.connections.clear();
        for node in &mut self.nodes {
            node.release();
        }
        self.nodes.clear();
        self.automation_node_id = None;
    }
}
