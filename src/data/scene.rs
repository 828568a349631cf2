//! Scene data and data file loading
//!
//! Scenes and the database can be stored as JSON or RON (Rusty Object
//! Notation); the format is picked from the file extension.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::commands::Command;

/// One page of an event: a command list and nothing else the preloader needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    /// Commands run by this page
    #[serde(default)]
    pub list: Vec<Command>,
}

/// An event placed on a scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneEvent {
    /// Event id, unique within the scene
    pub id: u32,
    /// Editor name
    #[serde(default)]
    pub name: String,
    /// Free-form note, may carry `<characterImage:NAME>` tags
    #[serde(default)]
    pub note: String,
    /// Event pages
    #[serde(default)]
    pub pages: Vec<EventPage>,
}

/// Static data of a loadable scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    /// Scene id
    pub id: u32,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Background image name, empty for none
    #[serde(default)]
    pub parallax_name: String,
    /// Tileset used by the tile layers
    #[serde(default)]
    pub tileset_id: Option<u32>,
    /// Events on the scene
    #[serde(default)]
    pub events: Vec<SceneEvent>,
}

impl SceneData {
    /// Create a new empty scene
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an event to the scene
    pub fn add_event(&mut self, event: SceneEvent) -> usize {
        let index = self.events.len();
        self.events.push(event);
        index
    }

    /// Load a scene from a `.json` or `.ron` file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        load_file(path)
    }

    /// Number of commands across all event pages, nested lists excluded
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.events
            .iter()
            .flat_map(|event| &event.pages)
            .map(|page| page.list.len())
            .sum()
    }
}

/// Deserialize a data file, picking the format from its extension
pub(crate) fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, DataError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let content = fs::read_to_string(path).map_err(|e| DataError::IoError(e.to_string()))?;
    match extension.as_deref() {
        Some("json") => {
            serde_json::from_str(&content).map_err(|e| DataError::DeserializeError(e.to_string()))
        }
        Some("ron") => {
            ron::from_str(&content).map_err(|e| DataError::DeserializeError(e.to_string()))
        }
        _ => Err(DataError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Errors that can occur while loading game data
#[derive(Debug, Clone)]
pub enum DataError {
    /// IO error
    IoError(String),
    /// Deserialization error
    DeserializeError(String),
    /// File extension is neither `.json` nor `.ron`
    UnsupportedFormat(String),
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
            Self::UnsupportedFormat(path) => write!(f, "Unsupported data format: {path}"),
        }
    }
}

impl std::error::Error for DataError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Map001.json");
        fs::write(
            &path,
            r#"{
                "id": 1,
                "name": "Village",
                "parallax_name": "Sky",
                "tileset_id": 2,
                "events": [{
                    "id": 1,
                    "note": "<characterImage:Elder>",
                    "pages": [{"list": [{"kind": "ShowText", "face": "Elder"}]}]
                }]
            }"#,
        )
        .unwrap();

        let scene = SceneData::load(&path).unwrap();
        assert_eq!(scene.name, "Village");
        assert_eq!(scene.tileset_id, Some(2));
        assert_eq!(scene.command_count(), 1);
    }

    #[test]
    fn test_scene_load_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Map002.ron");
        fs::write(&path, r#"(id: 2, name: "Cave", parallax_name: "", events: [])"#).unwrap();

        let scene = SceneData::load(&path).unwrap();
        assert_eq!(scene.id, 2);
        assert!(scene.tileset_id.is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Map003.xml");
        fs::write(&path, "<map/>").unwrap();

        assert!(matches!(
            SceneData::load(&path),
            Err(DataError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            SceneData::load(dir.path().join("missing.json")),
            Err(DataError::IoError(_))
        ));
    }
}
