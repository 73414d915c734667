//! Error type shared by the graph, document and transport layers.

use std::path::PathBuf;

use crate::graph::NodeId;

/// Errors surfaced by host operations.
///
/// Connection legality failures are not errors: `add_connection` simply
/// returns `false`.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The document could not be parsed or has the wrong root element.
    #[error("{0}")]
    Load(String),

    /// Writing the document to disk failed.
    #[error("couldn't write to the file {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The plugin loader (or a host processor) refused to build an instance.
    #[error("could not create filter '{name}': {message}")]
    PluginInstantiation { name: String, message: String },

    /// An explicit node id collided with a node already in the graph.
    #[error("node id {0} is already in use")]
    DuplicateNodeId(NodeId),

    /// Only one automation track is allowed per document.
    #[error("an automation track already exists (node {0})")]
    AutomationTrackExists(NodeId),

    /// Every node id has been handed out this session.
    #[error("no node ids left")]
    NodeIdsExhausted,

    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    /// Tempo must be a positive number of beats per minute.
    #[error("invalid tempo: {0} BPM")]
    InvalidBpm(u32),

    #[error("failed to serialise document: {0}")]
    Xml(#[from] quick_xml::SeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;
