//! glyphforge.toml handling
//!
//! The file is optional. Every key has a default, so a partial file only
//! overrides what it names:
//!
//! ```toml
//! [atlas]
//! pixel_height = 32.0
//! preset = "extended"
//! sdf = true
//! padding = 2
//!
//! [output]
//! directory = "assets/fonts"
//! format = "bmp"
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use glyphforge_text::{charset, AtlasConfig, CharEncoding, FillRule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "glyphforge.toml";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GlyphforgeConfig {
    #[serde(default)]
    pub atlas: AtlasSection,
    #[serde(default)]
    pub output: OutputSection,
}

/// Build parameters
#[derive(Debug, Deserialize, Serialize)]
pub struct AtlasSection {
    #[serde(default = "default_pixel_height")]
    pub pixel_height: f32,
    /// Explicit charset; takes precedence over `preset`
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub preset: CharsetPreset,
    #[serde(default)]
    pub encoding: EncodingSetting,
    #[serde(default)]
    pub sdf: bool,
    #[serde(default = "default_min_size")]
    pub min_width: u32,
    #[serde(default = "default_min_size")]
    pub min_height: u32,
    #[serde(default = "default_max_size")]
    pub max_width: u32,
    #[serde(default = "default_max_size")]
    pub max_height: u32,
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_sdf_spread")]
    pub sdf_spread: u32,
    #[serde(default = "default_size_margin")]
    pub size_margin: u32,
    #[serde(default = "default_max_grow_attempts")]
    pub max_grow_attempts: u32,
    #[serde(default = "default_fallback_advance_ratio")]
    pub fallback_advance_ratio: f32,
    #[serde(default)]
    pub fill_rule: FillRuleSetting,
}

fn default_pixel_height() -> f32 {
    48.0
}

fn default_min_size() -> u32 {
    2048
}

fn default_max_size() -> u32 {
    16384
}

fn default_padding() -> u32 {
    4
}

fn default_sdf_spread() -> u32 {
    4
}

fn default_size_margin() -> u32 {
    256
}

fn default_max_grow_attempts() -> u32 {
    8
}

fn default_fallback_advance_ratio() -> f32 {
    0.5
}

impl Default for AtlasSection {
    fn default() -> Self {
        Self {
            pixel_height: default_pixel_height(),
            charset: None,
            preset: CharsetPreset::default(),
            encoding: EncodingSetting::default(),
            sdf: false,
            min_width: default_min_size(),
            min_height: default_min_size(),
            max_width: default_max_size(),
            max_height: default_max_size(),
            padding: default_padding(),
            sdf_spread: default_sdf_spread(),
            size_margin: default_size_margin(),
            max_grow_attempts: default_max_grow_attempts(),
            fallback_advance_ratio: default_fallback_advance_ratio(),
            fill_rule: FillRuleSetting::default(),
        }
    }
}

impl AtlasSection {
    pub fn atlas_config(&self) -> AtlasConfig {
        AtlasConfig::default()
            .with_min_size(self.min_width, self.min_height)
            .with_max_size(self.max_width, self.max_height)
            .with_padding(self.padding)
            .with_sdf_spread(self.sdf_spread)
            .with_size_margin(self.size_margin)
            .with_max_grow_attempts(self.max_grow_attempts)
            .with_fallback_advance_ratio(self.fallback_advance_ratio)
            .with_fill_rule(self.fill_rule.into())
    }
}

/// Where and how results are written
#[derive(Debug, Deserialize, Serialize)]
pub struct OutputSection {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: ImageFormatSetting,
    /// Write the metadata text file next to the image
    #[serde(default = "default_true")]
    pub metadata: bool,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            format: ImageFormatSetting::default(),
            metadata: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CharsetPreset {
    /// Printable ASCII (U+0020 to U+007E)
    #[default]
    Ascii,
    /// Letters, digits and common punctuation
    Basic,
    /// Basic plus currency, math and arrow symbols
    Extended,
}

impl CharsetPreset {
    pub fn chars(self) -> &'static str {
        match self {
            CharsetPreset::Ascii => charset::PRINTABLE_ASCII,
            CharsetPreset::Basic => charset::BASIC,
            CharsetPreset::Extended => charset::EXTENDED,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodingSetting {
    None,
    #[default]
    Utf8,
    Ascii,
}

impl From<EncodingSetting> for CharEncoding {
    fn from(setting: EncodingSetting) -> Self {
        match setting {
            EncodingSetting::None => CharEncoding::None,
            EncodingSetting::Utf8 => CharEncoding::Utf8,
            EncodingSetting::Ascii => CharEncoding::Ascii,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FillRuleSetting {
    #[default]
    NonZero,
    EvenOdd,
}

impl From<FillRuleSetting> for FillRule {
    fn from(setting: FillRuleSetting) -> Self {
        match setting {
            FillRuleSetting::NonZero => FillRule::NonZero,
            FillRuleSetting::EvenOdd => FillRule::EvenOdd,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormatSetting {
    #[default]
    Png,
    Bmp,
}

impl ImageFormatSetting {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormatSetting::Png => "png",
            ImageFormatSetting::Bmp => "bmp",
        }
    }
}

impl GlyphforgeConfig {
    /// Loads `path`, or `glyphforge.toml` in the current directory when no
    /// path is given. Only the implicit file may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::load_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = GlyphforgeConfig::parse("").unwrap();
        assert_eq!(config.atlas.pixel_height, 48.0);
        assert_eq!(config.atlas.atlas_config(), AtlasConfig::default());
        assert_eq!(config.output.format, ImageFormatSetting::Png);
        assert!(config.output.metadata);
    }

    #[test]
    fn partial_sections_override() {
        let config = GlyphforgeConfig::parse(
            r#"
            [atlas]
            pixel_height = 24.0
            preset = "extended"
            encoding = "ascii"
            padding = 1
            max_width = 4096
            fill_rule = "evenodd"

            [output]
            directory = "out"
            format = "bmp"
            "#,
        )
        .unwrap();

        assert_eq!(config.atlas.pixel_height, 24.0);
        assert_eq!(config.atlas.preset, CharsetPreset::Extended);
        assert_eq!(CharEncoding::from(config.atlas.encoding), CharEncoding::Ascii);
        let atlas = config.atlas.atlas_config();
        assert_eq!(atlas.padding, 1);
        assert_eq!(atlas.fill_rule, FillRule::EvenOdd);
        assert_eq!(atlas.min_width, 2048);
        assert_eq!((atlas.max_width, atlas.max_height), (4096, 16384));
        assert_eq!(config.output.directory, PathBuf::from("out"));
        assert_eq!(config.output.format.extension(), "bmp");
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(GlyphforgeConfig::parse("[atlas]\nencoding = \"latin1\"").is_err());
        assert!(GlyphforgeConfig::parse("[output]\nformat = \"gif\"").is_err());
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = GlyphforgeConfig::default();
        config.atlas.sdf = true;
        config.atlas.charset = Some("abc".into());
        let text = config.to_toml().unwrap();
        let parsed = GlyphforgeConfig::parse(&text).unwrap();
        assert!(parsed.atlas.sdf);
        assert_eq!(parsed.atlas.charset.as_deref(), Some("abc"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(GlyphforgeConfig::load(Some(Path::new("/nonexistent/glyphforge.toml"))).is_err());
    }
}
