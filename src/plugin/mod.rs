//! Format-agnostic plugin abstraction layer.
//!
//! This module defines the descriptor, the backend kind and the
//! [`PluginInstance`] capability every graph node exposes.  Loading is
//! delegated to [`FormatBackend`]s registered with the [`PluginManager`];
//! the host's own processors live in [`builtin`] and [`internal`].

pub mod builtin;
pub mod internal;
pub mod manager;
pub mod types;

pub use builtin::{AudioFilePlayer, AutomatableParameter, AutomationTrack, PluginWrapper};
pub use internal::{InternalFormat, IoKind};
pub use manager::{FormatBackend, PluginLoader, PluginManager};
pub use types::*;
