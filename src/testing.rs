//! Test doubles: an in-memory plugin and a format backend producing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::notify::ParameterListener;
use crate::plugin::{FormatBackend, PluginDescription, PluginInstance};

pub struct FakePlugin {
    desc: PluginDescription,
    self_describing: bool,
    accepts_midi: bool,
    produces_midi: bool,
    params: Vec<f32>,
    state: Vec<u8>,
    released: Arc<AtomicBool>,
    listener: Arc<Mutex<Option<ParameterListener>>>,
}

impl FakePlugin {
    pub fn new(name: &str, format: &str, ins: usize, outs: usize) -> Self {
        Self::from_description(&PluginDescription::new(name, format, ins, outs))
    }

    pub fn from_description(desc: &PluginDescription) -> Self {
        Self {
            desc: desc.clone(),
            self_describing: true,
            accepts_midi: false,
            produces_midi: false,
            params: vec![0.5, 0.0],
            state: Vec::new(),
            released: Arc::new(AtomicBool::new(false)),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_midi(mut self, accepts: bool, produces: bool) -> Self {
        self.accepts_midi = accepts;
        self.produces_midi = produces;
        self
    }

    /// Behave like a binary that can't report its own descriptor.
    pub fn without_describe(mut self) -> Self {
        self.self_describing = false;
        self
    }

    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    /// The listener the host attached, shared so tests can fire changes
    /// "from the plugin's editor" after the instance has been boxed.
    pub fn listener_handle(&self) -> Arc<Mutex<Option<ParameterListener>>> {
        self.listener.clone()
    }
}

impl PluginInstance for FakePlugin {
    fn name(&self) -> String {
        self.desc.name.clone()
    }

    fn describe(&self) -> Option<PluginDescription> {
        self.self_describing.then(|| self.desc.clone())
    }

    fn num_input_channels(&self) -> usize {
        self.desc.num_input_channels
    }

    fn num_output_channels(&self) -> usize {
        self.desc.num_output_channels
    }

    fn set_play_config(&mut self, ins: usize, outs: usize, _sample_rate: f64, _block_size: usize) {
        self.desc.num_input_channels = ins;
        self.desc.num_output_channels = outs;
    }

    fn accepts_midi(&self) -> bool {
        self.accepts_midi
    }

    fn produces_midi(&self) -> bool {
        self.produces_midi
    }

    fn num_parameters(&self) -> usize {
        self.params.len()
    }

    fn parameter_name(&self, index: usize) -> String {
        ["Level", "Pan"].get(index).map(|s| s.to_string()).unwrap_or_default()
    }

    fn parameter(&self, index: usize) -> f32 {
        self.params.get(index).copied().unwrap_or(0.0)
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(p) = self.params.get_mut(index) {
            *p = value;
        }
    }

    fn get_state(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.params.iter().flat_map(|p| p.to_le_bytes()).collect();
        out.extend_from_slice(&self.state);
        out
    }

    fn set_state(&mut self, data: &[u8]) {
        let param_bytes = self.params.len() * 4;
        if data.len() < param_bytes {
            return;
        }
        for (i, chunk) in data[..param_bytes].chunks_exact(4).enumerate() {
            self.params[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.state = data[param_bytes..].to_vec();
    }

    fn set_listener(&mut self, listener: Option<ParameterListener>) {
        *self.listener.lock() = listener;
    }

    fn release_resources(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Backend that builds [`FakePlugin`]s.  The plugin named "Broken" always
/// fails to load.  Plugins of the `Custom` format do not describe
/// themselves, nor do those of an [`opaque`](Self::opaque) backend.
pub struct FakeFormat {
    name: String,
    describes: bool,
}

impl FakeFormat {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            describes: name != "Custom",
        }
    }

    pub fn opaque(name: &str) -> Self {
        Self {
            name: name.to_string(),
            describes: false,
        }
    }
}

impl FormatBackend for FakeFormat {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> Vec<PluginDescription> {
        vec![
            PluginDescription::new("Gain", self.name.clone(), 2, 2).with_file("/plugins/gain"),
            PluginDescription::new("Synth", self.name.clone(), 0, 2).with_file("/plugins/synth"),
        ]
    }

    fn create_instance(
        &self,
        desc: &PluginDescription,
        sample_rate: f64,
        block_size: usize,
    ) -> Result<Box<dyn PluginInstance>, String> {
        if desc.name == "Broken" {
            return Err("binary failed to load".to_string());
        }
        let mut plugin = FakePlugin::from_description(desc);
        plugin.self_describing = self.describes;
        if desc.name == "Synth" {
            plugin.accepts_midi = true;
        }
        plugin.set_play_config(
            desc.num_input_channels,
            desc.num_output_channels,
            sample_rate,
            block_size,
        );
        Ok(Box::new(plugin))
    }
}
