//! Processors the host builds itself rather than asking the loader for:
//! the automation track, the sound-file player, and the wrapper placed
//! around every third-party instance.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::types::*;
use crate::graph::NodeId;
use crate::notify::ParameterListener;
use crate::transport::SharedPlayHead;

/// Common channel/config bookkeeping for host processors.
#[derive(Debug, Clone, Default)]
struct PlayConfig {
    num_inputs: usize,
    num_outputs: usize,
    sample_rate: f64,
    block_size: usize,
}

impl PlayConfig {
    fn stereo() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 2,
            ..Default::default()
        }
    }

    fn set(&mut self, num_inputs: usize, num_outputs: usize, sample_rate: f64, block_size: usize) {
        *self = Self {
            num_inputs,
            num_outputs,
            sample_rate,
            block_size,
        };
    }
}

// ---------------------------------------------------------------------------
// Automation track
// ---------------------------------------------------------------------------

/// A node parameter registered with the automation track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatableParameter {
    pub node_id: NodeId,
    pub parameter_index: usize,
    pub node_name: String,
    pub parameter_name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AutomationState {
    parameters: Vec<AutomatableParameter>,
}

/// Records which parameters of other nodes are driven by automation.
pub struct AutomationTrack {
    config: PlayConfig,
    play_head: Option<SharedPlayHead>,
    parameters: Vec<AutomatableParameter>,
}

impl AutomationTrack {
    pub const NAME: &'static str = "AutomationTrack";

    pub fn new() -> Self {
        Self {
            config: PlayConfig::stereo(),
            play_head: None,
            parameters: Vec::new(),
        }
    }

    /// Register a parameter.  Returns false if it was already present.
    pub fn add_automatable_node(&mut self, param: AutomatableParameter) -> bool {
        if self
            .parameters
            .iter()
            .any(|p| p.node_id == param.node_id && p.parameter_index == param.parameter_index)
        {
            return false;
        }
        self.parameters.push(param);
        true
    }

    /// Forget every parameter belonging to `node_id`.
    pub fn remove_node(&mut self, node_id: NodeId) -> bool {
        let before = self.parameters.len();
        self.parameters.retain(|p| p.node_id != node_id);
        self.parameters.len() != before
    }

    /// Keep only parameters whose node passes `keep`.  Returns true if any
    /// were dropped.
    pub fn retain_nodes(&mut self, keep: impl Fn(NodeId) -> bool) -> bool {
        let before = self.parameters.len();
        self.parameters.retain(|p| keep(p.node_id));
        self.parameters.len() != before
    }

    pub fn parameters(&self) -> &[AutomatableParameter] {
        &self.parameters
    }

    pub fn play_head(&self) -> Option<&SharedPlayHead> {
        self.play_head.as_ref()
    }
}

impl Default for AutomationTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginInstance for AutomationTrack {
    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn num_input_channels(&self) -> usize {
        self.config.num_inputs
    }

    fn num_output_channels(&self) -> usize {
        self.config.num_outputs
    }

    fn set_play_config(&mut self, ins: usize, outs: usize, sample_rate: f64, block_size: usize) {
        self.config.set(ins, outs, sample_rate, block_size);
    }

    fn set_play_head(&mut self, play_head: Option<SharedPlayHead>) {
        self.play_head = play_head;
    }

    fn get_state(&self) -> Vec<u8> {
        let state = AutomationState {
            parameters: self.parameters.clone(),
        };
        serde_json::to_vec(&state).unwrap_or_default()
    }

    fn set_state(&mut self, data: &[u8]) {
        match serde_json::from_slice::<AutomationState>(data) {
            Ok(state) => self.parameters = state.parameters,
            Err(e) => log::warn!("Ignoring unreadable automation state: {}", e),
        }
    }

    fn as_automation_track_mut(&mut self) -> Option<&mut AutomationTrack> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// Sound-file player
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct FilePlayerState {
    file: Option<PathBuf>,
    gain: f32,
    looping: f32,
}

/// Plays an audio file into the graph.  Decoding and streaming belong to
/// the audio path; the control side only tracks the file and parameters.
pub struct AudioFilePlayer {
    config: PlayConfig,
    play_head: Option<SharedPlayHead>,
    file: Option<PathBuf>,
    params: [ParameterSlot; 2],
}

impl AudioFilePlayer {
    pub const NAME: &'static str = "Soundfile Player";
    const GAIN: usize = 0;
    const LOOP: usize = 1;

    pub fn new() -> Self {
        Self {
            config: PlayConfig::stereo(),
            play_head: None,
            file: None,
            params: [ParameterSlot::new("Gain", 1.0), ParameterSlot::new("Loop", 0.0)],
        }
    }

    pub fn setup_audio_file(&mut self, path: &Path) {
        if !path.exists() {
            log::warn!("Soundfile player: {} does not exist", path.display());
        }
        self.file = Some(path.to_path_buf());
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn gain(&self) -> f32 {
        self.params[Self::GAIN].value.load()
    }

    pub fn is_looping(&self) -> bool {
        self.params[Self::LOOP].value.load() >= 0.5
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn play_head(&self) -> Option<&SharedPlayHead> {
        self.play_head.as_ref()
    }
}

impl Default for AudioFilePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginInstance for AudioFilePlayer {
    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn num_input_channels(&self) -> usize {
        self.config.num_inputs
    }

    fn num_output_channels(&self) -> usize {
        self.config.num_outputs
    }

    fn set_play_config(&mut self, ins: usize, outs: usize, sample_rate: f64, block_size: usize) {
        self.config.set(ins, outs, sample_rate, block_size);
    }

    fn set_play_head(&mut self, play_head: Option<SharedPlayHead>) {
        self.play_head = play_head;
    }

    fn num_parameters(&self) -> usize {
        self.params.len()
    }

    fn parameter_name(&self, index: usize) -> String {
        self.params
            .get(index)
            .map(|p| p.name.to_string())
            .unwrap_or_default()
    }

    fn parameter(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.value.load()).unwrap_or(0.0)
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.params.get(index) {
            slot.value.store(value.clamp(0.0, 1.0));
        }
    }

    fn get_state(&self) -> Vec<u8> {
        let state = FilePlayerState {
            file: self.file.clone(),
            gain: self.gain(),
            looping: self.params[Self::LOOP].value.load(),
        };
        serde_json::to_vec(&state).unwrap_or_default()
    }

    fn set_state(&mut self, data: &[u8]) {
        match serde_json::from_slice::<FilePlayerState>(data) {
            Ok(state) => {
                if state.file.is_some() {
                    self.file = state.file;
                }
                self.params[Self::GAIN].value.store(state.gain);
                self.params[Self::LOOP].value.store(state.looping);
            }
            Err(e) => log::warn!("Ignoring unreadable soundfile player state: {}", e),
        }
    }
}

// ---------------------------------------------------------------------------
// Third-party wrapper
// ---------------------------------------------------------------------------

/// Wraps every third-party instance so the host controls its channel
/// layout and display name independently of what the binary reports.
pub struct PluginWrapper {
    inner: Box<dyn PluginInstance>,
    /// Descriptor the instance was loaded from, used when the binary can't
    /// describe itself.
    description: PluginDescription,
    plugin_name: String,
    config: PlayConfig,
}

impl PluginWrapper {
    pub fn new(inner: Box<dyn PluginInstance>, description: PluginDescription) -> Self {
        let plugin_name = inner.name();
        let config = PlayConfig {
            num_inputs: inner.num_input_channels(),
            num_outputs: inner.num_output_channels(),
            ..Default::default()
        };
        Self {
            inner,
            description,
            plugin_name,
            config,
        }
    }

    pub fn set_plugin_name(&mut self, name: impl Into<String>) {
        self.plugin_name = name.into();
    }

    pub fn inner(&self) -> &dyn PluginInstance {
        self.inner.as_ref()
    }
}

impl PluginInstance for PluginWrapper {
    fn name(&self) -> String {
        self.plugin_name.clone()
    }

    /// The inner descriptor (or the one loaded from), with the wrapper's
    /// name and channel layout.
    fn describe(&self) -> Option<PluginDescription> {
        let mut desc = self
            .inner
            .describe()
            .unwrap_or_else(|| self.description.clone());
        desc.name = self.plugin_name.clone();
        desc.num_input_channels = self.config.num_inputs;
        desc.num_output_channels = self.config.num_outputs;
        Some(desc)
    }

    fn num_input_channels(&self) -> usize {
        self.config.num_inputs
    }

    fn num_output_channels(&self) -> usize {
        self.config.num_outputs
    }

    fn set_play_config(&mut self, ins: usize, outs: usize, sample_rate: f64, block_size: usize) {
        self.config.set(ins, outs, sample_rate, block_size);
        self.inner.set_play_config(ins, outs, sample_rate, block_size);
    }

    fn set_play_head(&mut self, play_head: Option<SharedPlayHead>) {
        self.inner.set_play_head(play_head);
    }

    fn accepts_midi(&self) -> bool {
        self.inner.accepts_midi()
    }

    fn produces_midi(&self) -> bool {
        self.inner.produces_midi()
    }

    fn num_parameters(&self) -> usize {
        self.inner.num_parameters()
    }

    fn parameter_name(&self, index: usize) -> String {
        self.inner.parameter_name(index)
    }

    fn parameter(&self, index: usize) -> f32 {
        self.inner.parameter(index)
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        self.inner.set_parameter(index, value);
    }

    fn get_state(&self) -> Vec<u8> {
        self.inner.get_state()
    }

    fn set_state(&mut self, data: &[u8]) {
        self.inner.set_state(data);
    }

    fn set_listener(&mut self, listener: Option<ParameterListener>) {
        self.inner.set_listener(listener);
    }

    fn release_resources(&mut self) {
        self.inner.release_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlugin;

    fn param(node_id: NodeId, index: usize) -> AutomatableParameter {
        AutomatableParameter {
            node_id,
            parameter_index: index,
            node_name: "Gain".into(),
            parameter_name: "Level".into(),
        }
    }

    #[test]
    fn test_automation_track_deduplicates() {
        let mut track = AutomationTrack::new();
        assert!(track.add_automatable_node(param(3, 0)));
        assert!(!track.add_automatable_node(param(3, 0)));
        assert!(track.add_automatable_node(param(3, 1)));
        assert_eq!(track.parameters().len(), 2);
        assert!(track.remove_node(3));
        assert!(track.parameters().is_empty());
    }

    #[test]
    fn test_automation_state_round_trip() {
        let mut track = AutomationTrack::new();
        track.add_automatable_node(param(7, 2));
        let state = track.get_state();

        let mut restored = AutomationTrack::new();
        restored.set_state(&state);
        assert_eq!(restored.parameters(), track.parameters());

        restored.set_state(b"not json");
        assert_eq!(restored.parameters().len(), 1);
    }

    #[test]
    fn test_file_player_state_and_clamping() {
        let mut player = AudioFilePlayer::new();
        player.setup_audio_file(Path::new("/nonexistent/loop.wav"));
        player.set_parameter(0, 3.0);
        player.set_parameter(1, 1.0);
        assert_eq!(player.gain(), 1.0);
        assert!(player.is_looping());

        let mut restored = AudioFilePlayer::new();
        restored.set_state(&player.get_state());
        assert_eq!(restored.file(), Some(Path::new("/nonexistent/loop.wav")));
        assert!(restored.is_looping());
    }

    #[test]
    fn test_wrapper_overrides_layout_and_name() {
        let desc = PluginDescription::new("Gain", "VST3", 1, 1);
        let mut wrapper =
            PluginWrapper::new(Box::new(FakePlugin::from_description(&desc)), desc);
        wrapper.set_plugin_name("Gain (wrapped)");
        wrapper.set_play_config(2, 4, 48000.0, 128);

        let desc = wrapper.describe().unwrap();
        assert_eq!(desc.name, "Gain (wrapped)");
        assert_eq!(desc.num_input_channels, 2);
        assert_eq!(desc.num_output_channels, 4);
        assert_eq!(desc.format_name, "VST3");
        assert_eq!(wrapper.inner().num_output_channels(), 4);
    }

    #[test]
    fn test_wrapper_describes_opaque_instance() {
        let desc = PluginDescription::new("Delay", "LV2", 2, 2).with_file("urn:delay");
        let inner = FakePlugin::from_description(&desc).without_describe();
        assert!(inner.describe().is_none());

        let mut wrapper = PluginWrapper::new(Box::new(inner), desc.clone());
        wrapper.set_plugin_name("Delay");
        assert_eq!(wrapper.describe(), Some(desc));
    }
}
