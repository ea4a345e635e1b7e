//! Named text styles referenced by text overlays.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::profile::{file_stem_for, list_stems, ProfileError};
use crate::transition::DEFAULT_SENTINEL;

/// Font size used when a style does not set one.
pub const DEFAULT_FONT_SIZE: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FontWeight {
    Thin,
    ExtraLight,
    Light,
    #[default]
    Normal,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

impl FontWeight {
    pub const ALL: [FontWeight; 9] = [
        FontWeight::Thin,
        FontWeight::ExtraLight,
        FontWeight::Light,
        FontWeight::Normal,
        FontWeight::Medium,
        FontWeight::SemiBold,
        FontWeight::Bold,
        FontWeight::ExtraBold,
        FontWeight::Black,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FontWeight::Thin => "Thin",
            FontWeight::ExtraLight => "Extra Light",
            FontWeight::Light => "Light",
            FontWeight::Normal => "Normal",
            FontWeight::Medium => "Medium",
            FontWeight::SemiBold => "Semi Bold",
            FontWeight::Bold => "Bold",
            FontWeight::ExtraBold => "Extra Bold",
            FontWeight::Black => "Black",
        }
    }

    /// CSS numeric weight.
    pub fn numeric(self) -> u16 {
        match self {
            FontWeight::Thin => 100,
            FontWeight::ExtraLight => 200,
            FontWeight::Light => 300,
            FontWeight::Normal => 400,
            FontWeight::Medium => 500,
            FontWeight::SemiBold => 600,
            FontWeight::Bold => 700,
            FontWeight::ExtraBold => 800,
            FontWeight::Black => 900,
        }
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FontWeight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FontWeight::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown font weight '{s}'"))
    }
}

impl TryFrom<String> for FontWeight {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontWeight> for String {
    fn from(weight: FontWeight) -> Self {
        weight.name().to_string()
    }
}

/// Font and effect settings applied to a text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Fill colour as `#RRGGBB` or `#RRGGBBAA`.
    pub font_color: String,
    pub font_weight: FontWeight,
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Effect descriptors in application order.
    #[serde(default)]
    pub effects: Vec<String>,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_color: "#FFFFFF".to_string(),
            font_weight: FontWeight::Normal,
            font_family: "System".to_string(),
            font_size: DEFAULT_FONT_SIZE,
            effects: Vec::new(),
        }
    }
}

impl TextStyle {
    /// Parse the fill colour into RGBA components.
    pub fn rgba(&self) -> Option<[u8; 4]> {
        let hex = self.font_color.trim().trim_start_matches('#');
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
            8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
            _ => None,
        }
    }
}

/// Directory of saved text styles.
#[derive(Debug, Clone)]
pub struct TextStyleStore {
    dir: PathBuf,
}

impl TextStyleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, ProfileError> {
        Ok(self.dir.join(format!("{}.json", file_stem_for(name)?)))
    }

    /// Style names with `_DEFAULT` always first.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        let mut names = vec![DEFAULT_SENTINEL.to_string()];
        names.extend(list_stems(&self.dir)?);
        Ok(names)
    }

    /// Load a style; `_DEFAULT` and `None` resolve to the built-in style.
    pub fn load(&self, name: Option<&str>) -> Result<TextStyle, ProfileError> {
        let name = match name {
            None | Some(DEFAULT_SENTINEL) => return Ok(TextStyle::default()),
            Some(name) => name,
        };
        let path = self.path_for(name)?;
        let json = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProfileError::NotFound {
                name: name.to_string(),
            },
            _ => ProfileError::IoError {
                path: path.clone(),
                source: e,
            },
        })?;
        serde_json::from_str(&json).map_err(|e| ProfileError::ParseError { path, source: e })
    }

    /// Load a style, falling back to the built-in one with a warning.
    pub fn load_or_default(&self, name: Option<&str>) -> TextStyle {
        self.load(name).unwrap_or_else(|e| {
            tracing::warn!(style = ?name, error = %e, "Using default text style");
            TextStyle::default()
        })
    }

    pub fn save(&self, name: &str, style: &TextStyle) -> Result<PathBuf, ProfileError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ProfileError::IoError {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = self.path_for(name)?;
        let json = serde_json::to_string_pretty(style).map_err(|e| ProfileError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| ProfileError::IoError {
            path: path.clone(),
            source: e,
        })?;
        tracing::info!(style = name, "Text style saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_weight_names() {
        assert_eq!("Semi Bold".parse::<FontWeight>().unwrap(), FontWeight::SemiBold);
        assert_eq!("extra light".parse::<FontWeight>().unwrap(), FontWeight::ExtraLight);
        assert!("Heavy".parse::<FontWeight>().is_err());
        assert_eq!(FontWeight::Black.numeric(), 900);
    }

    #[test]
    fn test_default_style() {
        let style = TextStyle::default();
        assert_eq!(style.rgba(), Some([255, 255, 255, 255]));
        assert_eq!(style.font_family, "System");
        assert_eq!(style.font_weight, FontWeight::Normal);
        assert_eq!(style.font_size, 60.0);
    }

    #[test]
    fn test_style_serializes_weight_by_name() {
        let style = TextStyle {
            font_weight: FontWeight::ExtraBold,
            effects: vec!["DropShadow".into()],
            ..TextStyle::default()
        };
        let json = serde_json::to_string(&style).unwrap();
        assert!(json.contains("\"Extra Bold\""));
        let back: TextStyle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, style);
    }

    #[test]
    fn test_store_lists_default_first() {
        let dir = std::env::temp_dir().join(format!("cueline-styles-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = TextStyleStore::new(&dir);
        store.save("Lower Third", &TextStyle::default()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["_DEFAULT", "Lower_Third"]);
        assert_eq!(store.load(Some("_DEFAULT")).unwrap(), TextStyle::default());
        assert!(store.load(Some("Lower Third")).is_ok());
        assert!(matches!(
            store.load(Some("Missing")),
            Err(ProfileError::NotFound { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
