use serde::{Deserialize, Serialize};

use crate::notify::ParameterListener;
use crate::plugin::{PluginBackendKind, PluginInstance};

/// Unique identifier for a graph node.  Monotonic, never reused within a
/// session.
pub type NodeId = u32;

/// Channel index addressing a node's MIDI stream rather than an audio
/// channel.
pub const MIDI_CHANNEL_INDEX: usize = 0x1000;

/// A directed edge from one node's output channel to another node's input
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source_node: NodeId,
    pub source_channel: usize,
    pub dest_node: NodeId,
    pub dest_channel: usize,
}

impl Connection {
    pub fn new(
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> Self {
        Self {
            source_node,
            source_channel,
            dest_node,
            dest_channel,
        }
    }

    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source_node == node_id || self.dest_node == node_id
    }

    pub fn is_midi(&self) -> bool {
        self.source_channel == MIDI_CHANNEL_INDEX
    }
}

/// Host-side metadata stored on every node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeProperties {
    /// Editor position, normalised to [0, 1].
    pub x: f64,
    pub y: f64,
    /// Last position of the node's editor window.
    pub ui_last_x: i32,
    pub ui_last_y: i32,
    pub plugin_type: PluginBackendKind,
    pub plugin_name: String,
    /// Inline descriptor XML for kinds that cannot describe themselves.
    pub plugin_desc: Option<String>,
}

impl NodeProperties {
    pub fn new(plugin_type: PluginBackendKind, plugin_name: impl Into<String>) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            ui_last_x: 0,
            ui_last_y: 0,
            plugin_type,
            plugin_name: plugin_name.into(),
            plugin_desc: None,
        }
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x.clamp(0.0, 1.0);
        self.y = y.clamp(0.0, 1.0);
    }
}

/// A graph-resident plugin instance.
pub struct GraphNode {
    id: NodeId,
    processor: Box<dyn PluginInstance>,
    pub properties: NodeProperties,
    listener: Option<ParameterListener>,
}

impl GraphNode {
    pub(crate) fn new(
        id: NodeId,
        processor: Box<dyn PluginInstance>,
        properties: NodeProperties,
    ) -> Self {
        Self {
            id,
            processor,
            properties,
            listener: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn processor(&self) -> &dyn PluginInstance {
        self.processor.as_ref()
    }

    pub fn processor_mut(&mut self) -> &mut dyn PluginInstance {
        self.processor.as_mut()
    }

    pub fn num_input_channels(&self) -> usize {
        self.processor.num_input_channels()
    }

    pub fn num_output_channels(&self) -> usize {
        self.processor.num_output_channels()
    }

    /// Whether `channel` is a valid output of this node.
    pub fn is_valid_output(&self, channel: usize) -> bool {
        if channel == MIDI_CHANNEL_INDEX {
            self.processor.produces_midi()
        } else {
            channel < self.num_output_channels()
        }
    }

    /// Whether `channel` is a valid input of this node.
    pub fn is_valid_input(&self, channel: usize) -> bool {
        if channel == MIDI_CHANNEL_INDEX {
            self.processor.accepts_midi()
        } else {
            channel < self.num_input_channels()
        }
    }

    pub fn attach_listener(&mut self, listener: ParameterListener) {
        self.processor.set_listener(Some(listener.clone()));
        self.listener = Some(listener);
    }

    pub fn detach_listener(&mut self) {
        self.processor.set_listener(None);
        self.listener = None;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Set a parameter from the host side and report it like a change the
    /// plugin made itself.
    pub fn set_parameter_notifying_host(&mut self, index: usize, value: f32) {
        self.processor.set_parameter(index, value);
        if let Some(listener) = &self.listener {
            listener.parameter_changed(index, value);
        }
    }

    /// Detach and free the plugin's resources.  The instance itself is
    /// dropped with the node.
    pub(crate) fn release(&mut self) {
        self.detach_listener();
        self.processor.set_play_head(None);
        self.processor.release_resources();
    }
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("name", &self.properties.plugin_name)
            .field("type", &self.properties.plugin_type)
            .field("inputs", &self.num_input_channels())
            .field("outputs", &self.num_output_channels())
            .finish()
    }
}
