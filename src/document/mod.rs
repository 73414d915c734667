//! The filter-graph document: the graph, its MIDI mappings, the transport
//! and the file it was loaded from or saved to.
//!
//! All mutation happens on the control thread through `&mut self`.  Every
//! operation that changes what would be written to disk marks the document
//! dirty and tells subscribers.

pub mod serializer;
pub mod xml;

use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use uuid::Uuid;

use crate::config::ProcessingConfig;
use crate::error::{HostError, Result};
use crate::graph::{GraphNode, GraphStore, NodeFactory, NodeId};
use crate::midi::{MidiMapping, MidiMappingTable};
use crate::notify::{ChangeHub, GraphEvent, ParameterChange};
use crate::plugin::{
    AutomatableParameter, AutomationTrack, PluginBackendKind, PluginDescription, PluginLoader,
};
use crate::transport::{SharedPlayHead, TransportClock};

/// Title of a document that has never been saved.
pub const UNTITLED: &str = "Unnamed";

/// Editor-window collaborator.  The document only asks it to close
/// windows before the nodes behind them go away.
pub trait PluginWindows: Send {
    fn close_windows_for(&mut self, node_id: NodeId);
    fn close_all(&mut self);
}

/// For headless use.
pub struct NoWindows;

impl PluginWindows for NoWindows {
    fn close_windows_for(&mut self, _node_id: NodeId) {}
    fn close_all(&mut self) {}
}

pub struct Document {
    store: GraphStore,
    factory: NodeFactory,
    midi_mappings: MidiMappingTable,
    transport: TransportClock,
    changes: ChangeHub,
    windows: Box<dyn PluginWindows>,
    file: Option<PathBuf>,
    dirty: bool,
}

impl Document {
    pub fn new(loader: Box<dyn PluginLoader>, config: ProcessingConfig, bpm: u32) -> Result<Self> {
        let transport = TransportClock::new(bpm)?;
        let factory = NodeFactory::new(loader, transport.play_head(), config);
        Ok(Self {
            store: GraphStore::new(),
            factory,
            midi_mappings: MidiMappingTable::new(),
            transport,
            changes: ChangeHub::new(),
            windows: Box::new(NoWindows),
            file: None,
            dirty: false,
        })
    }

    pub fn with_windows(mut self, windows: Box<dyn PluginWindows>) -> Self {
        self.windows = windows;
        self
    }

    pub fn graph(&self) -> &GraphStore {
        &self.store
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.store.node_for_id(id)
    }

    pub fn midi_mappings(&self) -> &MidiMappingTable {
        &self.midi_mappings
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    // ── Dirty state & events ───────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_changed(&mut self, changed: bool) {
        if changed && !self.dirty {
            self.changes.broadcast(GraphEvent::DocumentChanged);
        }
        self.dirty = changed;
    }

    fn changed(&mut self) {
        self.set_changed(true);
    }

    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        self.changes.subscribe()
    }

    // ── Nodes ──────────────────────────────────────────────────────────────

    /// Instantiate `desc` and place it at (`x`, `y`).
    pub fn add_filter(&mut self, desc: &PluginDescription, x: f64, y: f64) -> Result<NodeId> {
        let id = match self.factory.create_node(&mut self.store, desc, None) {
            Ok(id) => id,
            Err(e) => {
                if let HostError::PluginInstantiation { name, message } = &e {
                    self.changes.broadcast(GraphEvent::PluginError {
                        name: name.clone(),
                        message: message.clone(),
                    });
                }
                return Err(e);
            }
        };
        if let Some(node) = self.store.node_for_id_mut(id) {
            node.properties.set_position(x, y);
        }
        self.node_added(id);
        self.changed();
        Ok(id)
    }

    fn node_added(&mut self, id: NodeId) {
        let listener = self.changes.listener_for(id);
        if let Some(node) = self.store.node_for_id_mut(id) {
            node.attach_listener(listener);
        }
        self.changes.broadcast(GraphEvent::NodeAdded(id));
    }

    pub fn remove_filter(&mut self, id: NodeId) -> bool {
        self.windows.close_windows_for(id);
        if !self.store.remove_node(id) {
            return false;
        }
        self.forget_node(id);
        if let Some(track) = self.automation_track_mut() {
            track.remove_node(id);
        }
        log::info!("Removed node {}", id);
        self.changes.broadcast(GraphEvent::NodeRemoved(id));
        self.changed();
        true
    }

    fn forget_node(&mut self, id: NodeId) {
        self.midi_mappings.remove_for_node(id);
        self.changes.forget_node(id);
    }

    pub fn disconnect_filter(&mut self, id: NodeId) -> bool {
        let removed = self.store.disconnect_node(id);
        self.connections_changed(removed)
    }

    pub fn remove_illegal_connections(&mut self) -> bool {
        let removed = self.store.remove_illegal_connections();
        self.connections_changed(removed)
    }

    pub fn set_node_position(&mut self, id: NodeId, x: f64, y: f64) {
        let Some(node) = self.store.node_for_id_mut(id) else {
            return;
        };
        let before = (node.properties.x, node.properties.y);
        node.properties.set_position(x, y);
        if (node.properties.x, node.properties.y) != before {
            self.changed();
        }
    }

    /// (0, 0) for unknown nodes.
    pub fn node_position(&self, id: NodeId) -> (f64, f64) {
        self.store
            .node_for_id(id)
            .map_or((0.0, 0.0), |n| (n.properties.x, n.properties.y))
    }

    pub fn set_node_ui_position(&mut self, id: NodeId, x: i32, y: i32) {
        if let Some(node) = self.store.node_for_id_mut(id) {
            node.properties.ui_last_x = x;
            node.properties.ui_last_y = y;
        }
    }

    /// Drop every node, connection and mapping.
    pub fn clear(&mut self) {
        self.clear_graph();
        self.changed();
    }

    fn clear_graph(&mut self) {
        self.windows.close_all();
        for id in self.store.node_ids() {
            self.changes.forget_node(id);
        }
        self.store.clear();
        self.midi_mappings.clear();
        self.changes.broadcast(GraphEvent::Cleared);
    }

    // ── Connections ────────────────────────────────────────────────────────

    pub fn can_connect(
        &self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> bool {
        self.store
            .can_connect(source_node, source_channel, dest_node, dest_channel)
    }

    pub fn add_connection(
        &mut self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> bool {
        let added = self
            .store
            .add_connection(source_node, source_channel, dest_node, dest_channel);
        self.connections_changed(added)
    }

    pub fn remove_connection(&mut self, index: usize) -> bool {
        let removed = self.store.remove_connection(index);
        self.connections_changed(removed)
    }

    pub fn remove_connection_between(
        &mut self,
        source_node: NodeId,
        source_channel: usize,
        dest_node: NodeId,
        dest_channel: usize,
    ) -> bool {
        let removed =
            self.store
                .remove_connection_between(source_node, source_channel, dest_node, dest_channel);
        self.connections_changed(removed)
    }

    fn connections_changed(&mut self, changed: bool) -> bool {
        if changed {
            self.changes.broadcast(GraphEvent::ConnectionsChanged);
            self.changed();
        }
        changed
    }

    // ── Parameters & automation ────────────────────────────────────────────

    /// Set a parameter from the host side.  The change is queued like one
    /// the plugin made itself and picked up by
    /// [`dispatch_pending_changes`](Self::dispatch_pending_changes).
    pub fn set_parameter(&mut self, id: NodeId, index: usize, value: f32) -> Result<()> {
        let node = self
            .store
            .node_for_id_mut(id)
            .ok_or(HostError::NodeNotFound(id))?;
        node.set_parameter_notifying_host(index, value);
        Ok(())
    }

    /// Deliver queued parameter changes.  Returns how many were delivered.
    pub fn dispatch_pending_changes(&mut self) -> usize {
        let store = &self.store;
        let changes = self
            .changes
            .drain_live(|id| store.node_for_id(id).is_some());
        if changes.is_empty() {
            return 0;
        }
        for change in &changes {
            self.changes.broadcast(GraphEvent::ParameterChanged(*change));
        }
        self.changed();
        changes.len()
    }

    pub fn last_changed_parameter(&self) -> Option<ParameterChange> {
        self.changes.last_changed()
    }

    /// Register a parameter with the automation track, creating the track
    /// in the middle of the canvas if the document has none.
    pub fn add_node_to_automation_track(&mut self, id: NodeId, parameter_index: usize) -> Result<()> {
        let node = self.store.node_for_id(id).ok_or(HostError::NodeNotFound(id))?;
        let param = AutomatableParameter {
            node_id: id,
            parameter_index,
            node_name: node.properties.plugin_name.clone(),
            parameter_name: node.processor().parameter_name(parameter_index),
        };

        if self.store.automation_node_id().is_none() {
            let desc = PluginDescription::new(
                AutomationTrack::NAME,
                PluginBackendKind::AUTOMATION_FORMAT,
                2,
                2,
            );
            self.add_filter(&desc, 0.5, 0.5)?;
        }

        let added = self
            .automation_track_mut()
            .is_some_and(|track| track.add_automatable_node(param));
        if added {
            self.changed();
        }
        Ok(())
    }

    /// Parameters currently registered with the automation track.
    pub fn automated_parameters(&mut self) -> Vec<AutomatableParameter> {
        self.automation_track_mut()
            .map(|track| track.parameters().to_vec())
            .unwrap_or_default()
    }

    fn automation_track_mut(&mut self) -> Option<&mut AutomationTrack> {
        let id = self.store.automation_node_id()?;
        self.store
            .node_for_id_mut(id)?
            .processor_mut()
            .as_automation_track_mut()
    }

    // ── MIDI mappings ──────────────────────────────────────────────────────

    pub fn find_controller_for_parameter(&self, id: NodeId, parameter_index: usize) -> Option<String> {
        self.midi_mappings.find(id, parameter_index)
    }

    pub fn add_midi_mapping(&mut self, mapping: MidiMapping) {
        self.midi_mappings.add(mapping);
        self.changed();
    }

    /// Apply an incoming control change to every parameter mapped to it.
    /// Returns the number of parameters set.
    pub fn handle_midi_controller(&mut self, channel: u8, controller: u8, value: u8) -> usize {
        let normalised = f32::from(value.min(127)) / 127.0;
        let targets: Vec<MidiMapping> = self
            .midi_mappings
            .targets(channel, controller)
            .copied()
            .collect();

        let mut applied = 0;
        for target in targets {
            if let Some(node) = self.store.node_for_id_mut(target.node_id) {
                node.set_parameter_notifying_host(target.parameter_index, normalised);
                applied += 1;
            }
        }
        applied
    }

    // ── Persistence ────────────────────────────────────────────────────────

    /// File stem of the backing file, or "Unnamed" when there is none on
    /// disk.
    pub fn document_title(&self) -> String {
        self.file
            .as_deref()
            .filter(|p| p.exists())
            .and_then(Path::file_stem)
            .map_or_else(|| UNTITLED.to_string(), |s| s.to_string_lossy().into_owned())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        serializer::create_xml(&self.store, &self.midi_mappings)
    }

    /// Replace the graph with the one in `text`.  On failure the graph is
    /// left empty.
    pub fn load_from_str(&mut self, text: &str) -> Result<()> {
        self.clear_graph();

        let report = serializer::restore_from_xml(
            text,
            &mut self.store,
            &self.factory,
            &mut self.midi_mappings,
        );
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                log::error!("Couldn't load document: {}", e);
                self.clear_graph();
                self.dirty = false;
                return Err(e);
            }
        };

        for id in report.created {
            self.node_added(id);
        }
        for skipped in report.skipped {
            self.changes.broadcast(GraphEvent::PluginError {
                name: skipped.name,
                message: skipped.message,
            });
        }
        self.dirty = false;
        Ok(())
    }

    pub fn load_document(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HostError::Load(format!("Couldn't read {}: {}", path.display(), e))
        })?;
        self.load_from_str(&text)?;
        self.file = Some(path.to_path_buf());
        log::info!(
            "Loaded {} ({} nodes, {} connections)",
            path.display(),
            self.store.num_nodes(),
            self.store.num_connections()
        );
        Ok(())
    }

    /// Write the document to `path` through a temporary sibling so a failed
    /// write never truncates an existing file.
    pub fn save_document(&mut self, path: &Path) -> Result<()> {
        let text = self.to_xml_string()?;
        write_atomically(path, &text).map_err(|source| {
            log::error!("Couldn't save {}: {}", path.display(), source);
            HostError::Save {
                path: path.to_path_buf(),
                source,
            }
        })?;

        self.file = Some(path.to_path_buf());
        self.dirty = false;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    // ── Transport ──────────────────────────────────────────────────────────

    pub fn set_playing(&mut self, start: bool, reset_position: bool) {
        self.transport.set_playing(start, reset_position);
    }

    pub fn set_bpm(&mut self, bpm: u32) -> Result<()> {
        self.transport.set_bpm(bpm)
    }

    pub fn bpm(&self) -> u32 {
        self.transport.bpm()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    pub fn play_head(&self) -> SharedPlayHead {
        self.transport.play_head()
    }

    pub fn transport(&self) -> &TransportClock {
        &self.transport
    }
}

fn write_atomically(path: &Path, text: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = std::fs::write(&tmp, text).and_then(|()| std::fs::rename(&tmp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
