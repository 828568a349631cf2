//! Inert game data consumed by the preloader
//!
//! Scenes, command trees and the shared database, deserialized from JSON or RON.

mod commands;
mod database;
mod scene;

pub use commands::{Command, MoveRoute, MoveStep, TroopRef};
pub use database::{Enemy, GameDatabase, Subroutine, Tileset, Trigger, Troop, TroopMember};
pub use scene::{DataError, EventPage, SceneData, SceneEvent};
