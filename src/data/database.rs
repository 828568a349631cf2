//! Game database: tilesets, troops, enemies and subroutines

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::commands::Command;
use super::scene::{DataError, EventPage, load_file};

/// Images used by the tile layers of scenes sharing this tileset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tileset {
    /// Editor name
    #[serde(default)]
    pub name: String,
    /// One image name per tile layer, empty for unused layers
    #[serde(default)]
    pub tileset_names: Vec<String>,
}

/// One enemy slot of a troop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopMember {
    /// Enemy id
    pub enemy_id: u32,
}

/// A group of enemies fought together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Troop {
    /// Editor name
    #[serde(default)]
    pub name: String,
    /// Enemies in the troop
    #[serde(default)]
    pub members: Vec<TroopMember>,
    /// Battle event pages
    #[serde(default)]
    pub pages: Vec<EventPage>,
}

/// An enemy definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Battler image name, shared by front and side view folders
    #[serde(default)]
    pub battler_name: String,
}

/// How a subroutine is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Only when called
    #[default]
    None,
    /// Runs once, blocking the player, while its switch is on
    Autorun,
    /// Runs continuously alongside the scene while its switch is on
    Parallel,
}

/// A named, independently invocable block of commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subroutine {
    /// Editor name
    #[serde(default)]
    pub name: String,
    /// Start condition
    #[serde(default)]
    pub trigger: Trigger,
    /// Commands
    #[serde(default)]
    pub list: Vec<Command>,
}

impl Subroutine {
    /// Parallel subroutines keep running until stopped explicitly
    #[must_use]
    pub fn is_long_running(&self) -> bool {
        self.trigger == Trigger::Parallel
    }
}

/// Static game data shared by every scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameDatabase {
    /// Tilesets by id
    #[serde(default)]
    pub tilesets: FxHashMap<u32, Tileset>,
    /// Troops by id
    #[serde(default)]
    pub troops: FxHashMap<u32, Troop>,
    /// Enemies by id
    #[serde(default)]
    pub enemies: FxHashMap<u32, Enemy>,
    /// Subroutines by id
    #[serde(default)]
    pub subroutines: FxHashMap<u32, Subroutine>,
}

impl GameDatabase {
    /// Create an empty database
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the database from a `.json` or `.ron` file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        load_file(path)
    }

    /// Look up a tileset
    #[must_use]
    pub fn tileset(&self, id: u32) -> Option<&Tileset> {
        self.tilesets.get(&id)
    }

    /// Look up a troop
    #[must_use]
    pub fn troop(&self, id: u32) -> Option<&Troop> {
        self.troops.get(&id)
    }

    /// Look up an enemy
    #[must_use]
    pub fn enemy(&self, id: u32) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    /// Look up a subroutine
    #[must_use]
    pub fn subroutine(&self, id: u32) -> Option<&Subroutine> {
        self.subroutines.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_json() {
        let json = r#"{
            "tilesets": {"1": {"name": "Field", "tileset_names": ["Outside_A1", "", "Outside_B"]}},
            "enemies": {"3": {"name": "Bat", "battler_name": "Bat"}},
            "troops": {"2": {"members": [{"enemy_id": 3}], "pages": []}},
            "subroutines": {
                "5": {"name": "Rain", "trigger": "Parallel", "list": []},
                "6": {"name": "Chest", "list": [{"kind": "CallSubroutine", "id": 5}]}
            }
        }"#;
        let db: GameDatabase = serde_json::from_str(json).unwrap();

        assert_eq!(db.tileset(1).map(|t| t.tileset_names.len()), Some(3));
        assert_eq!(db.troop(2).map(|t| t.members[0].enemy_id), Some(3));
        assert!(db.subroutine(5).is_some_and(Subroutine::is_long_running));
        assert!(!db.subroutine(6).is_some_and(Subroutine::is_long_running));
        assert!(db.subroutine(7).is_none());
    }

    #[test]
    fn test_database_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Database.json");

        let mut db = GameDatabase::new();
        db.enemies.insert(
            1,
            Enemy {
                name: "Slime".into(),
                battler_name: "Slime".into(),
            },
        );
        std::fs::write(&path, serde_json::to_string(&db).unwrap()).unwrap();

        assert_eq!(GameDatabase::load(&path).unwrap(), db);
    }
}
