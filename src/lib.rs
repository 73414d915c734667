//! plughost: an audio plugin host library.
//!
//! Plugins of several formats are loaded into a processing graph, driven by
//! a shared transport, and saved to and restored from `FILTERGRAPH` XML
//! documents.

pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod midi;
pub mod notify;
pub mod plugin;
pub mod transport;

#[cfg(test)]
mod testing;

pub use document::Document;
pub use error::{HostError, Result};
