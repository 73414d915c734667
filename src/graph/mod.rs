//! Graph data model: nodes, connections and the factory that builds nodes.

pub mod factory;
pub mod store;
pub mod types;

pub use factory::NodeFactory;
pub use store::GraphStore;
pub use types::{Connection, GraphNode, MIDI_CHANNEL_INDEX, NodeId, NodeProperties};
