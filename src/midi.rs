//! MIDI controller mappings.
//!
//! Several controllers may target the same parameter (layered control), so
//! the table allows duplicates.  Display lookup returns the first match in
//! insertion order.

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiMapping {
    pub node_id: NodeId,
    pub parameter_index: usize,
    pub channel: u8,
    pub controller: u8,
}

impl MidiMapping {
    pub fn new(node_id: NodeId, parameter_index: usize, channel: u8, controller: u8) -> Self {
        Self {
            node_id,
            parameter_index,
            channel,
            controller,
        }
    }

    /// "CC:<controller> Chan:<channel>"
    pub fn display(&self) -> String {
        format!("CC:{} Chan:{}", self.controller, self.channel)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MidiMappingTable {
    mappings: Vec<MidiMapping>,
}

impl MidiMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mapping: MidiMapping) {
        self.mappings.push(mapping);
    }

    /// Display string of the first mapping bound to this parameter.
    pub fn find(&self, node_id: NodeId, parameter_index: usize) -> Option<String> {
        self.mappings
            .iter()
            .find(|m| m.node_id == node_id && m.parameter_index == parameter_index)
            .map(MidiMapping::display)
    }

    /// Every (node, parameter) driven by this controller.
    pub fn targets(&self, channel: u8, controller: u8) -> impl Iterator<Item = &MidiMapping> {
        self.mappings
            .iter()
            .filter(move |m| m.channel == channel && m.controller == controller)
    }

    pub fn remove_for_node(&mut self, node_id: NodeId) -> bool {
        let before = self.mappings.len();
        self.mappings.retain(|m| m.node_id != node_id);
        self.mappings.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
    }
}
