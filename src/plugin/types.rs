//! Backend-agnostic plugin types shared by the loader, the factory and the
//! serializer.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::notify::ParameterListener;
use crate::transport::SharedPlayHead;

// ---------------------------------------------------------------------------
// Backend kind
// ---------------------------------------------------------------------------

/// How a plugin is brought into the graph.  Derived once from the
/// descriptor's format name; the factory switches on it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginBackendKind {
    /// Host-internal processors supplied through the loader (I/O nodes).
    InternalBuiltIn,
    /// Third-party binaries (VST, VST3, LV2, CLAP, ...), always wrapped.
    NativeThirdParty,
    /// Plugins in a custom, script-hosted format.  They cannot describe
    /// themselves, so their descriptor is kept inline on the node.
    CustomHostedFormat,
    /// The host's sound-file player.
    FilePlaybackSource,
    /// The host's automation track (one per document).
    AutomationTrack,
}

impl PluginBackendKind {
    pub const INTERNAL_FORMAT: &'static str = "Internal";
    pub const CUSTOM_FORMAT: &'static str = "Custom";
    pub const SOUNDFILE_FORMAT: &'static str = "SoundfilePlayer";
    pub const AUTOMATION_FORMAT: &'static str = "AutomationTrack";

    pub fn from_format_name(format: &str) -> Self {
        match format {
            Self::INTERNAL_FORMAT => Self::InternalBuiltIn,
            Self::CUSTOM_FORMAT => Self::CustomHostedFormat,
            Self::SOUNDFILE_FORMAT => Self::FilePlaybackSource,
            Self::AUTOMATION_FORMAT => Self::AutomationTrack,
            _ => Self::NativeThirdParty,
        }
    }

    /// Tag stored in the node property bag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalBuiltIn => "Internal",
            Self::NativeThirdParty => "ThirdParty",
            Self::CustomHostedFormat => "Custom",
            Self::FilePlaybackSource => "SoundfilePlayer",
            Self::AutomationTrack => "AutomationTrack",
        }
    }

    /// Whether a live instance of this kind can rebuild its own descriptor.
    /// The others rely on the copy inlined at creation time.
    pub fn is_self_describing(&self) -> bool {
        matches!(self, Self::InternalBuiltIn | Self::NativeThirdParty)
    }
}

impl std::fmt::Display for PluginBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Descriptor (catalog entry — enough to instantiate a plugin)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginDescription {
    pub name: String,
    #[serde(default)]
    pub descriptive_name: String,
    /// Format name, e.g. "VST3", "LV2", "Internal", "SoundfilePlayer".
    pub format_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub version: String,
    /// Path of the plugin binary/script, or an identifier for internal ones.
    #[serde(default)]
    pub file_or_identifier: String,
    #[serde(default)]
    pub uid: i32,
    #[serde(default)]
    pub is_instrument: bool,
    pub num_input_channels: usize,
    pub num_output_channels: usize,
}

impl PluginDescription {
    pub fn new(
        name: impl Into<String>,
        format_name: impl Into<String>,
        num_input_channels: usize,
        num_output_channels: usize,
    ) -> Self {
        let name = name.into();
        Self {
            descriptive_name: name.clone(),
            name,
            format_name: format_name.into(),
            num_input_channels,
            num_output_channels,
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file_or_identifier: impl Into<String>) -> Self {
        self.file_or_identifier = file_or_identifier.into();
        self
    }

    pub fn kind(&self) -> PluginBackendKind {
        PluginBackendKind::from_format_name(&self.format_name)
    }

    /// A descriptor needs at least a name and a format to be loadable.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.format_name.is_empty()
    }

    pub fn is_effect(&self) -> bool {
        self.num_input_channels > 0 && self.num_output_channels > 0
    }

    pub fn is_generator(&self) -> bool {
        self.num_input_channels == 0 && self.num_output_channels > 0
    }
}

// ---------------------------------------------------------------------------
// Plugin instance capability
// ---------------------------------------------------------------------------

/// The capability set every graph-resident processor exposes, whatever
/// backend produced it.
pub trait PluginInstance: Send {
    fn name(&self) -> String;

    /// Rebuild a descriptor from the live instance.  `None` for processors
    /// that cannot describe themselves.
    fn describe(&self) -> Option<PluginDescription> {
        None
    }

    fn num_input_channels(&self) -> usize;
    fn num_output_channels(&self) -> usize;

    /// Apply the graph's processing configuration.
    fn set_play_config(
        &mut self,
        num_inputs: usize,
        num_outputs: usize,
        sample_rate: f64,
        block_size: usize,
    );

    fn set_play_head(&mut self, _play_head: Option<SharedPlayHead>) {}

    fn accepts_midi(&self) -> bool {
        false
    }

    fn produces_midi(&self) -> bool {
        false
    }

    fn num_parameters(&self) -> usize {
        0
    }

    fn parameter_name(&self, _index: usize) -> String {
        String::new()
    }

    fn parameter(&self, _index: usize) -> f32 {
        0.0
    }

    fn set_parameter(&mut self, _index: usize, _value: f32) {}

    /// Opaque state blob.  The host never interprets it.
    fn get_state(&self) -> Vec<u8>;
    fn set_state(&mut self, data: &[u8]);

    /// Hand the instance a listener for changes it originates itself (e.g.
    /// from its own editor).  `None` detaches.
    fn set_listener(&mut self, _listener: Option<ParameterListener>) {}

    /// Free heavy resources before the instance is dropped.
    fn release_resources(&mut self) {}

    /// Downcast hook used by the document to register automatable
    /// parameters.
    fn as_automation_track_mut(&mut self) -> Option<&mut super::builtin::AutomationTrack> {
        None
    }
}

// ---------------------------------------------------------------------------
// Lock-free parameter storage (shared between RT and control threads)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(val: f32) -> Self {
        Self(AtomicU32::new(val.to_bits()))
    }
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
    pub fn store(&self, val: f32) {
        self.0.store(val.to_bits(), Ordering::Relaxed);
    }
}

/// A named parameter slot backed by an [`AtomicF32`].
#[derive(Debug)]
pub struct ParameterSlot {
    pub name: &'static str,
    pub value: AtomicF32,
}

impl ParameterSlot {
    pub fn new(name: &'static str, default: f32) -> Self {
        Self {
            name,
            value: AtomicF32::new(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_format_name() {
        assert_eq!(
            PluginBackendKind::from_format_name("Internal"),
            PluginBackendKind::InternalBuiltIn
        );
        assert_eq!(
            PluginBackendKind::from_format_name("AutomationTrack"),
            PluginBackendKind::AutomationTrack
        );
        assert_eq!(
            PluginBackendKind::from_format_name("SoundfilePlayer"),
            PluginBackendKind::FilePlaybackSource
        );
        assert_eq!(
            PluginBackendKind::from_format_name("Custom"),
            PluginBackendKind::CustomHostedFormat
        );
        assert_eq!(
            PluginBackendKind::from_format_name("VST3"),
            PluginBackendKind::NativeThirdParty
        );
    }

    #[test]
    fn test_self_describing_kinds() {
        assert!(PluginBackendKind::InternalBuiltIn.is_self_describing());
        assert!(PluginBackendKind::NativeThirdParty.is_self_describing());
        assert!(!PluginBackendKind::CustomHostedFormat.is_self_describing());
        assert!(!PluginBackendKind::AutomationTrack.is_self_describing());
    }

    #[test]
    fn test_description_validity() {
        let desc = PluginDescription::new("Reverb", "VST3", 2, 2);
        assert!(desc.is_valid());
        assert!(desc.is_effect());
        assert!(!PluginDescription::default().is_valid());
    }

    #[test]
    fn test_atomic_f32() {
        let a = AtomicF32::new(0.25);
        assert_eq!(a.load(), 0.25);
        a.store(-1.5);
        assert_eq!(a.load(), -1.5);
    }
}
