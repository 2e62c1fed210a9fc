//! Wire messages exchanged between the background and page contexts.
//!
//! Both directions are `serde` enums tagged by `action`, so the JSON shape
//! is `{"action": "get-canvas", "type": "auto"}` and
//! `{"action": "save-canvas", "canvasRect": {...}}`.

use crate::locator::geometry::Rect;
use serde::{Deserialize, Serialize};

/// How the page resolves which canvas the user means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// The element under the last known pointer position.
    Cursor,
    /// The visible canvas nearest the viewport center.
    Auto,
}

/// Background → page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum BackgroundCommand {
    #[serde(rename = "get-canvas")]
    GetCanvas {
        #[serde(rename = "type")]
        mode: SelectionMode,
    },
    /// Read every canvas directly and send each as a blob.
    #[serde(rename = "export-canvases")]
    ExportCanvases,
}

/// Page → background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ContentCommand {
    /// Capture request: crop the visible tab to `canvas_rect` (device px).
    #[serde(rename = "save-canvas", rename_all = "camelCase")]
    SaveCanvas { canvas_rect: Rect },
    #[serde(rename = "downloadBlob")]
    DownloadBlob { blob: Blob, filename: String },
}

/// Encoded image bytes with their MIME type. Serialized as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
