//! Node factory: turns a descriptor into a configured, registered node.
//!
//! The backend kind is resolved once from the descriptor.  Host processors
//! (automation track, sound-file player) are built here; everything else
//! comes from the plugin loader, with third-party instances wrapped.

use std::path::Path;

use super::store::GraphStore;
use super::types::{NodeId, NodeProperties};
use crate::config::ProcessingConfig;
use crate::document::xml;
use crate::error::{HostError, Result};
use crate::plugin::{
    AudioFilePlayer, AutomationTrack, PluginBackendKind, PluginDescription, PluginInstance,
    PluginLoader, PluginWrapper,
};
use crate::transport::SharedPlayHead;

pub struct NodeFactory {
    loader: Box<dyn PluginLoader>,
    play_head: SharedPlayHead,
    config: ProcessingConfig,
}

impl NodeFactory {
    pub fn new(
        loader: Box<dyn PluginLoader>,
        play_head: SharedPlayHead,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            loader,
            play_head,
            config,
        }
    }

    pub fn config(&self) -> ProcessingConfig {
        self.config
    }

    /// Build a node for `desc` and register it with `store`.  Nothing is
    /// registered when instantiation fails.
    pub fn create_node(
        &self,
        store: &mut GraphStore,
        desc: &PluginDescription,
        explicit_id: Option<NodeId>,
    ) -> Result<NodeId> {
        if !desc.is_valid() {
            return Err(HostError::PluginInstantiation {
                name: desc.name.clone(),
                message: "descriptor has no name or format".to_string(),
            });
        }

        let kind = desc.kind();
        if kind == PluginBackendKind::AutomationTrack
            && let Some(existing) = store.automation_node_id()
        {
            return Err(HostError::AutomationTrackExists(existing));
        }

        let (mut processor, mut properties) = self.instantiate(kind, desc)?;
        processor.set_play_head(Some(self.play_head.clone()));
        if !kind.is_self_describing() {
            properties.plugin_desc = Some(xml::descriptor_to_string(desc)?);
        }

        let id = store.add_node(processor, properties, explicit_id)?;
        log::info!("Created node {} '{}' ({})", id, desc.name, kind);
        Ok(id)
    }

    fn instantiate(
        &self,
        kind: PluginBackendKind,
        desc: &PluginDescription,
    ) -> Result<(Box<dyn PluginInstance>, NodeProperties)> {
        let ProcessingConfig {
            sample_rate,
            block_size,
        } = self.config;

        match kind {
            PluginBackendKind::AutomationTrack => {
                let mut track = AutomationTrack::new();
                track.set_play_config(2, 2, sample_rate, block_size);
                Ok((Box::new(track), NodeProperties::new(kind, AutomationTrack::NAME)))
            }
            PluginBackendKind::FilePlaybackSource => {
                let mut player = AudioFilePlayer::new();
                player.set_play_config(2, 2, sample_rate, block_size);
                if !desc.file_or_identifier.is_empty() {
                    player.setup_audio_file(Path::new(&desc.file_or_identifier));
                }
                Ok((Box::new(player), NodeProperties::new(kind, AudioFilePlayer::NAME)))
            }
            PluginBackendKind::InternalBuiltIn => {
                let instance = self.load(desc)?;
                Ok((instance, NodeProperties::new(kind, desc.name.clone())))
            }
            PluginBackendKind::CustomHostedFormat => {
                // The script decides its own channel count.
                let mut instance = self.load(desc)?;
                let (ins, outs) = (instance.num_input_channels(), instance.num_output_channels());
                instance.set_play_config(ins, outs, sample_rate, block_size);
                let name = instance.name();
                Ok((instance, NodeProperties::new(kind, name)))
            }
            PluginBackendKind::NativeThirdParty => {
                let mut wrapper = PluginWrapper::new(self.load(desc)?, desc.clone());
                wrapper.set_play_config(
                    desc.num_input_channels,
                    desc.num_output_channels,
                    sample_rate,
                    block_size,
                );
                wrapper.set_plugin_name(desc.name.clone());
                Ok((Box::new(wrapper), NodeProperties::new(kind, desc.name.clone())))
            }
        }
    }

    fn load(&self, desc: &PluginDescription) -> Result<Box<dyn PluginInstance>> {
        self.loader
            .instantiate(desc, self.config.sample_rate, self.config.block_size)
            .map_err(|message| {
                log::error!("Couldn't create filter '{}': {}", desc.name, message);
                HostError::PluginInstantiation {
                    name: desc.name.clone(),
                    message,
                }
            })
    }
}
