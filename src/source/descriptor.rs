//! Stream descriptors
//!
//! Immutable metadata snapshots describing a discovered upstream stream.
//! Descriptors are produced by a discovery resolve and consumed read-only
//! by the relay and recording layers; the JSON form uses the camelCase
//! names the downstream consumers expect.

use serde::Serialize;

/// Per-channel value encoding of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    /// 32-bit float channels
    Float32,
    /// 64-bit float channels
    Float64,
    /// String channels (event markers)
    String,
    /// 8-bit integer channels
    Int8,
    /// 16-bit integer channels
    Int16,
    /// 32-bit integer channels
    Int32,
    /// 64-bit integer channels
    Int64,
}

impl ChannelFormat {
    /// Lowercase wire name of the format
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelFormat::Float32 => "float32",
            ChannelFormat::Float64 => "float64",
            ChannelFormat::String => "string",
            ChannelFormat::Int8 => "int8",
            ChannelFormat::Int16 => "int16",
            ChannelFormat::Int32 => "int32",
            ChannelFormat::Int64 => "int64",
        }
    }

    /// True for string-typed streams
    pub fn is_text(&self) -> bool {
        matches!(self, ChannelFormat::String)
    }
}

impl std::fmt::Display for ChannelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a discovered stream
///
/// Created by a resolve; a later resolve fully replaces the cache these
/// live in, so a descriptor held across resolves may describe a stream
/// that is no longer reachable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    /// Opaque unique identifier assigned by discovery
    pub uid: String,

    /// Human-readable stream name
    pub name: String,

    /// Content type (e.g. "EEG", "Markers")
    #[serde(rename = "type")]
    pub stream_type: String,

    /// Number of channels per sample
    pub channel_count: u32,

    /// Nominal sampling rate in Hz (0 = irregular)
    pub nominal_srate: f64,

    /// Per-channel value encoding
    pub channel_format: ChannelFormat,

    /// Source-assigned device/application id
    pub source_id: String,

    /// Host the stream originates from
    pub hostname: String,

    /// Stream creation time, epoch seconds
    pub created_at: f64,

    /// Raw descriptor document as delivered by discovery, unparsed
    pub raw_desc: String,

    /// Channel labels, in channel order
    pub channel_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor {
            uid: "uid-1".to_string(),
            name: "TestEEG".to_string(),
            stream_type: "EEG".to_string(),
            channel_count: 2,
            nominal_srate: 256.0,
            channel_format: ChannelFormat::Float32,
            source_id: "dev-001".to_string(),
            hostname: "lab-host".to_string(),
            created_at: 100.0,
            raw_desc: "<info/>".to_string(),
            channel_names: vec!["Fp1".to_string(), "Fp2".to_string()],
        }
    }

    #[test]
    fn test_descriptor_json_field_names() {
        let value = serde_json::to_value(descriptor()).unwrap();

        assert_eq!(value["uid"], "uid-1");
        assert_eq!(value["type"], "EEG");
        assert_eq!(value["channelCount"], 2);
        assert_eq!(value["nominalSrate"], 256.0);
        assert_eq!(value["channelFormat"], "float32");
        assert_eq!(value["sourceId"], "dev-001");
        assert_eq!(value["createdAt"], 100.0);
        assert_eq!(value["rawDesc"], "<info/>");
        assert_eq!(value["channelNames"][0], "Fp1");
    }

    #[test]
    fn test_channel_format_names() {
        assert_eq!(ChannelFormat::Float32.as_str(), "float32");
        assert_eq!(ChannelFormat::Int64.as_str(), "int64");
        assert_eq!(ChannelFormat::String.to_string(), "string");
        assert!(ChannelFormat::String.is_text());
        assert!(!ChannelFormat::Float64.is_text());
    }
}
