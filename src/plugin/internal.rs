//! The host's `Internal` format: graph I/O endpoints.
//!
//! These stand in for the audio device inputs/outputs and the MIDI input
//! inside the graph.  They carry no parameters and no state.

use super::manager::FormatBackend;
use super::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    AudioInput,
    AudioOutput,
    MidiInput,
}

impl IoKind {
    const ALL: [IoKind; 3] = [Self::AudioInput, Self::AudioOutput, Self::MidiInput];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AudioInput => "Audio Input",
            Self::AudioOutput => "Audio Output",
            Self::MidiInput => "Midi Input",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.display_name() == name)
    }

    fn default_channels(&self) -> (usize, usize) {
        match self {
            Self::AudioInput => (0, 2),
            Self::AudioOutput => (2, 0),
            Self::MidiInput => (0, 0),
        }
    }
}

/// Backend for the `Internal` format.
pub struct InternalFormat;

impl InternalFormat {
    pub fn description(kind: IoKind) -> PluginDescription {
        let (ins, outs) = kind.default_channels();
        let mut desc = PluginDescription::new(
            kind.display_name(),
            PluginBackendKind::INTERNAL_FORMAT,
            ins,
            outs,
        )
        .with_file(kind.display_name());
        desc.manufacturer = "plughost".to_string();
        desc.category = "I/O devices".to_string();
        desc
    }
}

impl FormatBackend for InternalFormat {
    fn name(&self) -> &str {
        PluginBackendKind::INTERNAL_FORMAT
    }

    fn scan(&self) -> Vec<PluginDescription> {
        IoKind::ALL.into_iter().map(Self::description).collect()
    }

    fn create_instance(
        &self,
        desc: &PluginDescription,
        sample_rate: f64,
        block_size: usize,
    ) -> Result<Box<dyn PluginInstance>, String> {
        let kind = IoKind::from_name(&desc.name)
            .ok_or_else(|| format!("unknown internal processor '{}'", desc.name))?;
        let mut processor = IoProcessor::new(kind);
        let (ins, outs) = match kind {
            IoKind::AudioInput => (0, desc.num_output_channels.max(1)),
            IoKind::AudioOutput => (desc.num_input_channels.max(1), 0),
            IoKind::MidiInput => (0, 0),
        };
        processor.set_play_config(ins, outs, sample_rate, block_size);
        Ok(Box::new(processor))
    }
}

/// One graph endpoint.
pub struct IoProcessor {
    kind: IoKind,
    num_inputs: usize,
    num_outputs: usize,
    sample_rate: f64,
    block_size: usize,
}

impl IoProcessor {
    pub fn new(kind: IoKind) -> Self {
        let (num_inputs, num_outputs) = kind.default_channels();
        Self {
            kind,
            num_inputs,
            num_outputs,
            sample_rate: 0.0,
            block_size: 0,
        }
    }

    pub fn kind(&self) -> IoKind {
        self.kind
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl PluginInstance for IoProcessor {
    fn name(&self) -> String {
        self.kind.display_name().to_string()
    }

    fn describe(&self) -> Option<PluginDescription> {
        let mut desc = InternalFormat::description(self.kind);
        desc.num_input_channels = self.num_inputs;
        desc.num_output_channels = self.num_outputs;
        Some(desc)
    }

    fn num_input_channels(&self) -> usize {
        self.num_inputs
    }

    fn num_output_channels(&self) -> usize {
        self.num_outputs
    }

    fn set_play_config(
        &mut self,
        num_inputs: usize,
        num_outputs: usize,
        sample_rate: f64,
        block_size: usize,
    ) {
        self.num_inputs = num_inputs;
        self.num_outputs = num_outputs;
        self.sample_rate = sample_rate;
        self.block_size = block_size;
    }

    fn produces_midi(&self) -> bool {
        self.kind == IoKind::MidiInput
    }

    fn get_state(&self) -> Vec<u8> {
        Vec::new()
    }

    fn set_state(&mut self, _data: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_lists_all_endpoints() {
        let names: Vec<String> = InternalFormat.scan().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Audio Input", "Audio Output", "Midi Input"]);
    }

    #[test]
    fn test_midi_input_produces_midi() {
        let desc = InternalFormat::description(IoKind::MidiInput);
        let instance = InternalFormat.create_instance(&desc, 48000.0, 256).unwrap();
        assert!(instance.produces_midi());
        assert_eq!(instance.num_output_channels(), 0);
    }

    #[test]
    fn test_describe_round_trips_channel_counts() {
        let mut desc = InternalFormat::description(IoKind::AudioOutput);
        desc.num_input_channels = 4;
        let instance = InternalFormat.create_instance(&desc, 48000.0, 256).unwrap();
        let described = instance.describe().unwrap();
        assert_eq!(described.num_input_channels, 4);
        assert_eq!(described.kind(), PluginBackendKind::InternalBuiltIn);
    }

    #[test]
    fn test_unknown_internal_name() {
        let desc = PluginDescription::new("Mixer", "Internal", 2, 2);
        assert!(InternalFormat.create_instance(&desc, 48000.0, 256).is_err());
    }
}
