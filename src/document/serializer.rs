//! Conversion between the live graph and its XML document.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::xml::{self, ConnectionXml, FilterXml, GraphXml, MidiMappingXml};
use crate::error::Result;
use crate::graph::{GraphNode, GraphStore, NodeFactory, NodeId};
use crate::midi::{MidiMapping, MidiMappingTable};
use crate::plugin::PluginDescription;

/// A node that could not be recreated while restoring.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedNode {
    pub id: NodeId,
    pub name: String,
    pub message: String,
}

/// What a restore produced besides the graph itself.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub created: Vec<NodeId>,
    pub skipped: Vec<SkippedNode>,
}

pub fn create_xml(store: &GraphStore, mappings: &MidiMappingTable) -> Result<String> {
    let graph = GraphXml {
        filters: store.nodes().filter_map(filter_to_xml).collect(),
        connections: store
            .connections()
            .iter()
            .map(|c| ConnectionXml {
                src_filter: i64::from(c.source_node),
                src_channel: c.source_channel as i64,
                dst_filter: i64::from(c.dest_node),
                dst_channel: c.dest_channel as i64,
            })
            .collect(),
        midi_mappings: mappings.iter().map(MidiMappingXml::from).collect(),
    };
    xml::write_document(&graph)
}

/// The descriptor to persist for `node`: rebuilt from the live instance
/// when its kind can, otherwise the copy inlined at creation.
pub fn node_descriptor(node: &GraphNode) -> Option<PluginDescription> {
    if node.properties.plugin_type.is_self_describing()
        && let Some(desc) = node.processor().describe()
    {
        return Some(desc);
    }
    node.properties
        .plugin_desc
        .as_deref()
        .and_then(xml::descriptor_from_str)
}

fn filter_to_xml(node: &GraphNode) -> Option<FilterXml> {
    let Some(desc) = node_descriptor(node) else {
        log::warn!(
            "Node {} '{}' has no plugin description, not saving it",
            node.id(),
            node.properties.plugin_name
        );
        return None;
    };

    let props = &node.properties;
    Some(FilterXml {
        uid: node.id(),
        x: props.x.clamp(0.0, 1.0),
        y: props.y.clamp(0.0, 1.0),
        ui_last_x: Some(props.ui_last_x.to_string()),
        ui_last_y: Some(props.ui_last_y.to_string()),
        plugin: Some((&desc).into()),
        state: STANDARD.encode(node.processor().get_state()),
    })
}

/// Rebuild nodes, connections and mappings from `text` into an empty
/// store.  Nodes whose plugin can't be created are skipped and reported;
/// connections that don't validate are dropped.
pub fn restore_from_xml(
    text: &str,
    store: &mut GraphStore,
    factory: &NodeFactory,
    mappings: &mut MidiMappingTable,
) -> Result<RestoreReport> {
    let graph = xml::parse_document(text)?;
    let mut report = RestoreReport::default();

    // Uids of filters that fail to load stay taken.
    for filter in &graph.filters {
        store.reserve_id(filter.uid);
    }

    for filter in &graph.filters {
        let Some(plugin) = filter.plugin.clone() else {
            log::warn!("Filter {} has no PLUGIN element, skipping", filter.uid);
            continue;
        };
        let desc = PluginDescription::from(plugin);

        let id = match factory.create_node(store, &desc, Some(filter.uid)) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Skipping filter {} '{}': {}", filter.uid, desc.name, e);
                report.skipped.push(SkippedNode {
                    id: filter.uid,
                    name: desc.name.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        if let Some(node) = store.node_for_id_mut(id) {
            node.properties.set_position(filter.x, filter.y);
            let (ui_x, ui_y) = filter.ui_last_position();
            node.properties.ui_last_x = ui_x;
            node.properties.ui_last_y = ui_y;
            restore_state(node, &filter.state);
        }
        report.created.push(id);
    }
    prune_automation(store);

    for c in &graph.connections {
        let (Ok(src), Ok(src_ch), Ok(dst), Ok(dst_ch)) = (
            NodeId::try_from(c.src_filter),
            usize::try_from(c.src_channel),
            NodeId::try_from(c.dst_filter),
            usize::try_from(c.dst_channel),
        ) else {
            log::debug!("Dropping malformed connection {:?}", c);
            continue;
        };
        store.add_connection(src, src_ch, dst, dst_ch);
    }
    store.remove_illegal_connections();

    for m in &graph.midi_mappings {
        let mapping = MidiMapping::from(m);
        if store.node_for_id(mapping.node_id).is_none() {
            log::debug!("Dropping MIDI mapping for missing node {}", mapping.node_id);
            continue;
        }
        mappings.add(mapping);
    }

    Ok(report)
}

/// Drop automation entries whose node wasn't recreated.
fn prune_automation(store: &mut GraphStore) {
    let live = store.node_ids();
    let Some(track_id) = store.automation_node_id() else {
        return;
    };
    if let Some(track) = store
        .node_for_id_mut(track_id)
        .and_then(|node| node.processor_mut().as_automation_track_mut())
        && track.retain_nodes(|id| live.contains(&id))
    {
        log::debug!("Dropped automation entries for nodes that failed to load");
    }
}

fn restore_state(node: &mut GraphNode, encoded: &str) {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return;
    }
    match STANDARD.decode(encoded) {
        Ok(data) => node.processor_mut().set_state(&data),
        Err(e) => log::warn!("Couldn't decode state of node {}: {}", node.id(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingConfig;
    use crate::graph::MIDI_CHANNEL_INDEX;
    use crate::plugin::PluginManager;
    use crate::testing::FakeFormat;
    use crate::transport::PlayHead;

    fn factory() -> NodeFactory {
        let mut manager = PluginManager::new();
        manager.register_format(Box::new(FakeFormat::new("VST3")));
        manager.register_format(Box::new(FakeFormat::new("Custom")));
        NodeFactory::new(Box::new(manager), PlayHead::new(120), ProcessingConfig::default())
    }

    fn restore(text: &str) -> (GraphStore, MidiMappingTable, RestoreReport) {
        let mut store = GraphStore::new();
        let mut mappings = MidiMappingTable::new();
        let report = restore_from_xml(text, &mut store, &factory(), &mut mappings).unwrap();
        (store, mappings, report)
    }

    #[test]
    fn test_state_and_layout_survive() {
        let factory = factory();
        let mut store = GraphStore::new();
        let mut mappings = MidiMappingTable::new();
        let a = factory
            .create_node(&mut store, &PluginDescription::new("Gain", "VST3", 2, 2), None)
            .unwrap();
        let b = factory
            .create_node(&mut store, &PluginDescription::new("Drone", "Custom", 2, 2), None)
            .unwrap();
        {
            let node = store.node_for_id_mut(a).unwrap();
            node.properties.set_position(0.25, 0.5);
            node.properties.ui_last_x = 300;
            node.processor_mut().set_parameter(0, 0.125);
        }
        assert!(store.add_connection(a, 1, b, 0));
        mappings.add(MidiMapping::new(a, 0, 1, 7));

        let text = create_xml(&store, &mappings).unwrap();
        let (restored, restored_mappings, report) = restore(&text);

        assert_eq!(report.created, vec![a, b]);
        assert!(report.skipped.is_empty());
        let node = restored.node_for_id(a).unwrap();
        assert_eq!((node.properties.x, node.properties.y), (0.25, 0.5));
        assert_eq!(node.properties.ui_last_x, 300);
        assert_eq!(node.processor().parameter(0), 0.125);
        assert_eq!(restored.node_for_id(b).unwrap().properties.plugin_name, "Drone");
        assert!(restored.connection_between(a, 1, b, 0).is_some());
        assert_eq!(restored_mappings.find(a, 0).as_deref(), Some("CC:7 Chan:1"));
    }

    #[test]
    fn test_bad_connections_are_dropped() {
        let text = r#"<FILTERGRAPH>
  <FILTER uid="1" x="0" y="0"><PLUGIN name="Gain" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
  <FILTER uid="2" x="0" y="0"><PLUGIN name="Gain" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
  <CONNECTION srcFilter="1" srcChannel="0" dstFilter="2" dstChannel="0"/>
  <CONNECTION srcFilter="99" srcChannel="0" dstFilter="2" dstChannel="1"/>
  <CONNECTION srcFilter="1" srcChannel="-3" dstFilter="2" dstChannel="1"/>
  <CONNECTION srcFilter="1" srcChannel="5" dstFilter="2" dstChannel="1"/>
  <CONNECTION srcFilter="1" srcChannel="4096" dstFilter="2" dstChannel="4096"/>
</FILTERGRAPH>"#;
        let (store, _, _) = restore(text);
        assert_eq!(store.num_nodes(), 2);
        assert_eq!(store.num_connections(), 1);
        assert_eq!(*store.connection(0).unwrap(), crate::graph::Connection::new(1, 0, 2, 0));
        assert_eq!(MIDI_CHANNEL_INDEX, 4096);
    }

    #[test]
    fn test_unloadable_plugin_is_skipped_and_reported() {
        let text = r#"<FILTERGRAPH>
  <FILTER uid="3" x="0.1" y="0.1"><PLUGIN name="Broken" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
  <FILTER uid="5" x="0.1" y="0.1"><PLUGIN name="Gain" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
  <CONNECTION srcFilter="3" srcChannel="0" dstFilter="5" dstChannel="0"/>
</FILTERGRAPH>"#;
        let (store, _, report) = restore(text);
        assert_eq!(store.node_ids(), vec![5]);
        assert_eq!(store.num_connections(), 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 3);
        assert_eq!(report.skipped[0].name, "Broken");
        assert_eq!(store.next_id(), Some(6));
    }

    #[test]
    fn test_skipped_filter_keeps_its_uid_and_loses_mappings() {
        let text = r#"<FILTERGRAPH>
  <FILTER uid="1" x="0" y="0"><PLUGIN name="Gain" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
  <FILTER uid="2" x="0" y="0"><PLUGIN name="Broken" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
  <MIDI_MAPPINGS NodeId="2" ParameterIndex="0" Channel="1" Controller="7"/>
  <MIDI_MAPPINGS NodeId="1" ParameterIndex="1" Channel="1" Controller="8"/>
</FILTERGRAPH>"#;
        let (mut store, mappings, report) = restore(text);
        assert_eq!(report.skipped[0].id, 2);
        assert_eq!(store.next_id(), Some(3));
        assert_eq!(mappings.find(2, 0), None);
        assert_eq!(mappings.find(1, 1).as_deref(), Some("CC:8 Chan:1"));

        let id = factory()
            .create_node(&mut store, &PluginDescription::new("Gain", "VST3", 2, 2), None)
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn test_last_uid_exhausts_automatic_ids() {
        let text = r#"<FILTERGRAPH>
  <FILTER uid="4294967295" x="0" y="0"><PLUGIN name="Gain" format="VST3" numInputs="2" numOutputs="2"/><STATE/></FILTER>
</FILTERGRAPH>"#;
        let (mut store, _, _) = restore(text);
        assert_eq!(store.node_ids(), vec![NodeId::MAX]);
        let next = factory().create_node(&mut store, &PluginDescription::new("Gain", "VST3", 2, 2), None);
        assert!(matches!(next, Err(crate::error::HostError::NodeIdsExhausted)));
        assert_eq!(store.num_nodes(), 1);
    }

    #[test]
    fn test_undecodable_state_keeps_node() {
        let text = r#"<FILTERGRAPH>
  <FILTER uid="1" x="2.0" y="-1"><PLUGIN name="Gain" format="VST3" numInputs="2" numOutputs="2"/><STATE>!!not base64!!</STATE></FILTER>
</FILTERGRAPH>"#;
        let (store, _, _) = restore(text);
        let node = store.node_for_id(1).unwrap();
        assert_eq!(node.processor().parameter(0), 0.5);
        assert_eq!((node.properties.x, node.properties.y), (1.0, 0.0));
    }
}
