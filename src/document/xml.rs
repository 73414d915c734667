//! On-disk shape of a filter-graph document.
//!
//! These types mirror the XML one to one; conversion to and from the live
//! graph happens in the serializer.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};
use crate::midi::MidiMapping;
use crate::plugin::PluginDescription;

pub const ROOT_TAG: &str = "FILTERGRAPH";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "FILTERGRAPH")]
pub struct GraphXml {
    #[serde(rename = "FILTER", default)]
    pub filters: Vec<FilterXml>,
    #[serde(rename = "CONNECTION", default)]
    pub connections: Vec<ConnectionXml>,
    #[serde(rename = "MIDI_MAPPINGS", default)]
    pub midi_mappings: Vec<MidiMappingXml>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterXml {
    #[serde(rename = "@uid")]
    pub uid: u32,
    #[serde(rename = "@x", default)]
    pub x: f64,
    #[serde(rename = "@y", default)]
    pub y: f64,
    #[serde(rename = "@uiLastX", default)]
    pub ui_last_x: Option<String>,
    #[serde(rename = "@uiLastY", default)]
    pub ui_last_y: Option<String>,
    #[serde(rename = "PLUGIN", default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<DescriptorXml>,
    #[serde(rename = "STATE", default)]
    pub state: String,
}

impl FilterXml {
    pub fn ui_last_position(&self) -> (i32, i32) {
        (lenient_int(&self.ui_last_x), lenient_int(&self.ui_last_y))
    }
}

/// Channels are signed on disk so a bad value drops the connection
/// instead of failing the whole document.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionXml {
    #[serde(rename = "@srcFilter")]
    pub src_filter: i64,
    #[serde(rename = "@srcChannel")]
    pub src_channel: i64,
    #[serde(rename = "@dstFilter")]
    pub dst_filter: i64,
    #[serde(rename = "@dstChannel")]
    pub dst_channel: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MidiMappingXml {
    #[serde(rename = "@NodeId")]
    pub node_id: u32,
    #[serde(rename = "@ParameterIndex")]
    pub parameter_index: usize,
    #[serde(rename = "@Channel")]
    pub channel: u8,
    #[serde(rename = "@Controller")]
    pub controller: u8,
}

impl From<&MidiMapping> for MidiMappingXml {
    fn from(m: &MidiMapping) -> Self {
        Self {
            node_id: m.node_id,
            parameter_index: m.parameter_index,
            channel: m.channel,
            controller: m.controller,
        }
    }
}

impl From<&MidiMappingXml> for MidiMapping {
    fn from(m: &MidiMappingXml) -> Self {
        MidiMapping::new(m.node_id, m.parameter_index, m.channel, m.controller)
    }
}

/// A plugin descriptor as stored under `FILTER` and inline on nodes that
/// cannot describe themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "PLUGIN")]
pub struct DescriptorXml {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@descriptiveName", default)]
    pub descriptive_name: String,
    #[serde(rename = "@format")]
    pub format: String,
    #[serde(rename = "@category", default)]
    pub category: String,
    #[serde(rename = "@manufacturer", default)]
    pub manufacturer: String,
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "@file", default)]
    pub file: String,
    /// Hexadecimal.
    #[serde(rename = "@uid", default)]
    pub uid: String,
    #[serde(rename = "@isInstrument", default)]
    pub is_instrument: bool,
    #[serde(rename = "@numInputs", default)]
    pub num_inputs: usize,
    #[serde(rename = "@numOutputs", default)]
    pub num_outputs: usize,
}

impl From<&PluginDescription> for DescriptorXml {
    fn from(d: &PluginDescription) -> Self {
        Self {
            name: d.name.clone(),
            descriptive_name: d.descriptive_name.clone(),
            format: d.format_name.clone(),
            category: d.category.clone(),
            manufacturer: d.manufacturer.clone(),
            version: d.version.clone(),
            file: d.file_or_identifier.clone(),
            uid: format!("{:x}", d.uid),
            is_instrument: d.is_instrument,
            num_inputs: d.num_input_channels,
            num_outputs: d.num_output_channels,
        }
    }
}

impl From<DescriptorXml> for PluginDescription {
    fn from(d: DescriptorXml) -> Self {
        Self {
            name: d.name,
            descriptive_name: d.descriptive_name,
            format_name: d.format,
            category: d.category,
            manufacturer: d.manufacturer,
            version: d.version,
            file_or_identifier: d.file,
            uid: u32::from_str_radix(d.uid.trim(), 16).map_or(0, |v| v as i32),
            is_instrument: d.is_instrument,
            num_input_channels: d.num_inputs,
            num_output_channels: d.num_outputs,
        }
    }
}

/// Serialize a descriptor as a standalone `PLUGIN` element.
pub fn descriptor_to_string(desc: &PluginDescription) -> Result<String> {
    Ok(quick_xml::se::to_string(&DescriptorXml::from(desc))?)
}

pub fn descriptor_from_str(xml: &str) -> Option<PluginDescription> {
    match quick_xml::de::from_str::<DescriptorXml>(xml) {
        Ok(d) => Some(d.into()),
        Err(e) => {
            log::warn!("Unreadable inline plugin description: {}", e);
            None
        }
    }
}

/// Parse a whole document.  The root element must be `FILTERGRAPH`.
pub fn parse_document(xml: &str) -> Result<GraphXml> {
    let root = root_element_name(xml)?;
    if root != ROOT_TAG {
        return Err(HostError::Load(format!(
            "Not a valid filter graph file (root element is <{}>)",
            root
        )));
    }
    quick_xml::de::from_str(xml)
        .map_err(|e| HostError::Load(format!("Not a valid filter graph file: {}", e)))
}

/// Pretty-printed document with an XML declaration.
pub fn write_document(graph: &GraphXml) -> Result<String> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let mut ser = quick_xml::se::Serializer::new(&mut out);
    ser.indent(' ', 2);
    graph.serialize(ser)?;
    out.push('\n');
    Ok(out)
}

fn root_element_name(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(HostError::Load(
                    "Not a valid filter graph file (no root element)".to_string(),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(HostError::Load(format!(
                    "Not a valid filter graph file: {}",
                    e
                )));
            }
        }
    }
}

fn lenient_int(value: &Option<String>) -> i32 {
    value
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
