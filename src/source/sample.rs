//! Sample messages produced by upstream pulls
//!
//! This module defines the unit of fan-out: one timestamped multi-channel
//! sample. Samples are immutable once produced and cheap to clone: the
//! channel payload is reference-counted, so every subscriber queue shares
//! the same allocation.

use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Channel payload of a single sample
///
/// Numeric streams (the common case) carry one `f64` per channel; marker
/// style streams carry strings. The variant is fixed per stream by its
/// descriptor's channel format.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    /// One numeric value per channel
    Numeric(Arc<[f64]>),
    /// One string value per channel
    Text(Arc<[String]>),
}

impl ChannelValues {
    /// Number of channel values
    pub fn len(&self) -> usize {
        match self {
            ChannelValues::Numeric(v) => v.len(),
            ChannelValues::Text(v) => v.len(),
        }
    }

    /// True if there are no channel values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for string-typed payloads
    pub fn is_text(&self) -> bool {
        matches!(self, ChannelValues::Text(_))
    }
}

impl Serialize for ChannelValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Both variants serialize as a bare JSON array
        match self {
            ChannelValues::Numeric(v) => serializer.collect_seq(v.iter()),
            ChannelValues::Text(v) => serializer.collect_seq(v.iter()),
        }
    }
}

impl From<Vec<f64>> for ChannelValues {
    fn from(values: Vec<f64>) -> Self {
        ChannelValues::Numeric(values.into())
    }
}

impl From<Vec<String>> for ChannelValues {
    fn from(values: Vec<String>) -> Self {
        ChannelValues::Text(values.into())
    }
}

/// One timestamped sample pulled from an upstream stream
///
/// Serializes to the wire/disk line format `{"t": <seconds>, "d": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Source timestamp in seconds
    #[serde(rename = "t")]
    pub timestamp: f64,

    /// Channel values, in channel order
    #[serde(rename = "d")]
    pub values: ChannelValues,
}

impl Sample {
    /// Create a numeric sample
    pub fn numeric(timestamp: f64, values: Vec<f64>) -> Self {
        Self {
            timestamp,
            values: values.into(),
        }
    }

    /// Create a string sample
    pub fn text(timestamp: f64, values: Vec<String>) -> Self {
        Self {
            timestamp,
            values: values.into(),
        }
    }
}
