//! Resource identifiers
//!
//! A [`ResourceId`] names an image independently of the scene that references it,
//! so two scenes pointing at the same file share one cache entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Image folders the runtime loads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    /// Message window portraits
    Face,
    /// Pictures shown by event commands
    Picture,
    /// Character sprite sheets
    Character,
    /// Scrolling scene backgrounds
    Parallax,
    /// Tile layer images
    Tileset,
    /// Front-view battler sprites
    Enemy,
    /// Side-view battler sprites
    SvEnemy,
    /// Window skins and other system images
    System,
}

impl ResourceCategory {
    /// All categories, in lookup order.
    pub const ALL: [Self; 8] = [
        Self::Face,
        Self::Picture,
        Self::Character,
        Self::Parallax,
        Self::Tileset,
        Self::Enemy,
        Self::SvEnemy,
        Self::System,
    ];

    /// Directory (relative to the game root) holding images of this category
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Face => "img/faces",
            Self::Picture => "img/pictures",
            Self::Character => "img/characters",
            Self::Parallax => "img/parallaxes",
            Self::Tileset => "img/tilesets",
            Self::Enemy => "img/enemies",
            Self::SvEnemy => "img/sv_enemies",
            Self::System => "img/system",
        }
    }
}

/// Normalized path of an image, without file extension.
///
/// Backslashes become forward slashes, `.` segments and empty segments are
/// dropped, so `./img//faces\Actor1` and `img/faces/Actor1` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Create an id from a raw path
    #[must_use]
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize(path.as_ref()))
    }

    /// Create an id for `name` inside a category folder
    #[must_use]
    pub fn in_category(category: ResourceCategory, name: &str) -> Self {
        Self::new(format!("{}/{}", category.directory(), name))
    }

    /// The normalized path
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Category inferred from the id's folder, if it is a known one
    #[must_use]
    pub fn category(&self) -> Option<ResourceCategory> {
        ResourceCategory::ALL.into_iter().find(|category| {
            self.0
                .strip_prefix(category.directory())
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Path of the file with the given extension
    #[must_use]
    pub fn with_extension(&self, extension: &str) -> String {
        format!("{}.{extension}", self.0)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ResourceId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}
