use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::palette::Color;

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "FRAME")]
    Frame {
        #[serde(rename = "dataURL")]
        data_url: String,
    },

    #[serde(rename = "LABELED")]
    Labeled {
        #[serde(rename = "uuid")]
        id: String,
        name: String,
    },

    #[serde(rename = "TRAINING")]
    Training {
        #[serde(rename = "uuid")]
        id: String,
        mode: TrainingMode,
    },

    // Sent once, right after the channel opens.
    #[serde(rename = "PALETTE")]
    Palette {
        colors: Vec<[u8; 3]>,
        colors_hex: Vec<String>,
    },
}

impl Outbound {
    pub fn palette(colors: &[Color]) -> Self {
        Self::Palette {
            colors: colors.iter().map(Color::rgb).collect(),
            colors_hex: colors.iter().map(Color::hex).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame { .. } => "FRAME",
            Self::Labeled { .. } => "LABELED",
            Self::Training { .. } => "TRAINING",
            Self::Palette { .. } => "PALETTE",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    On,
    Off,
}

impl From<bool> for TrainingMode {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Annotated(AnnotationBatch),
    /// One submitted frame has been fully consumed.
    Processed,
    /// A well-formed envelope with a `type` this client does not know.
    Unknown(String),
}

/// Result of processing one frame on the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotationBatch {
    pub content: String,

    /// Backend processing time in milliseconds.
    #[serde(deserialize_with = "millis_from_string_or_number")]
    pub processing_time: f64,

    #[serde(rename = "frame_faces", default)]
    pub sightings: Vec<PersonSighting>,
}

/// One person found in a frame. Only `uuid` is guaranteed; an absent
/// field means "no change" for a person already known.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonSighting {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// `#rrggbb` assigned by the backend.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub samples: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message has no string \"type\" field")]
    MissingType,
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    match kind.as_str() {
        "ANNOTATED" => Ok(Inbound::Annotated(serde_json::from_value(value)?)),
        "PROCESSED" => Ok(Inbound::Processed),
        _ => Ok(Inbound::Unknown(kind)),
    }
}

// The backend formats the duration as a string ("12.34"); accept plain
// numbers too.
fn millis_from_string_or_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Number(f64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Number(ms) => Ok(ms),
        Millis::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
