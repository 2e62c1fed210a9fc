//! Output configuration: file name base and image encoding.
//!
//! Defaults are fixed at build time. The binary may override them through
//! `CANVAS_SAVER_IMAGE_NAME` / `CANVAS_SAVER_IMAGE_FORMAT` (a `.env` file is
//! honoured via dotenvy before this is read).

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_IMAGE_NAME: &str = "canvas_image";
pub const DEFAULT_ENCODING: ImageEncoding = ImageEncoding::Png;

const ENV_IMAGE_NAME: &str = "CANVAS_SAVER_IMAGE_NAME";
const ENV_IMAGE_FORMAT: &str = "CANVAS_SAVER_IMAGE_FORMAT";

/// Raster formats the tab can be captured and saved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Png,
    Jpeg,
}

impl ImageEncoding {
    /// File extension, also the subtype in `image/<ext>`.
    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageEncoding::Png => ImageFormat::Png,
            ImageEncoding::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageEncoding::Png),
            "jpeg" | "jpg" => Ok(ImageEncoding::Jpeg),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub image_name: String,
    pub encoding: ImageEncoding,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            encoding: DEFAULT_ENCODING,
        }
    }
}

impl OutputConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_IMAGE_NAME) {
            let name = name.trim();
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::InvalidName(name.to_string()));
            }
            config.image_name = name.to_string();
        }
        if let Some(format) = lookup(ENV_IMAGE_FORMAT) {
            config.encoding = format.parse()?;
        }

        Ok(config)
    }

    /// `<image_name>.<ext>`, the name every cropped capture is saved under.
    pub fn filename(&self) -> String {
        format!("{}.{}", self.image_name, self.encoding.extension())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown image format '{0}' (expected png or jpeg)")]
    UnknownFormat(String),

    #[error("Invalid image name '{0}'")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_filename_is_canvas_image_png() {
        assert_eq!(OutputConfig::default().filename(), "canvas_image.png");
    }

    #[test]
    fn env_overrides_name_and_format() {
        let config = OutputConfig::from_lookup(lookup(&[
            (ENV_IMAGE_NAME, "snapshot"),
            (ENV_IMAGE_FORMAT, "JPG"),
        ]))
        .unwrap();
        assert_eq!(config.encoding, ImageEncoding::Jpeg);
        assert_eq!(config.filename(), "snapshot.jpeg");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = OutputConfig::from_lookup(lookup(&[(ENV_IMAGE_FORMAT, "gif")]));
        assert!(matches!(result, Err(ConfigError::UnknownFormat(f)) if f == "gif"));
    }

    #[test]
    fn name_with_path_separator_is_rejected() {
        let result = OutputConfig::from_lookup(lookup(&[(ENV_IMAGE_NAME, "../x")]));
        assert!(matches!(result, Err(ConfigError::InvalidName(_))));
    }
}
