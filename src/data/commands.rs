//! Event command trees
//!
//! Commands are a tagged union: most are leaves, while conditional branches
//! and choice prompts own nested command lists. Only the fields the preloader
//! or an interpreter needs are modelled; everything else deserializes to
//! [`Command::Other`].

use serde::{Deserialize, Serialize};

/// One event command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Command {
    /// Open a message window, optionally with a face portrait
    ShowText {
        /// Face image name, empty for none
        #[serde(default)]
        face: String,
        /// Cell inside the face sheet
        #[serde(default)]
        face_index: u32,
    },
    /// Display a picture
    ShowPicture {
        /// Picture slot
        picture_id: u32,
        /// Picture image name
        name: String,
    },
    /// Move a picture, possibly swapping its image
    MovePicture {
        /// Picture slot
        picture_id: u32,
        /// Picture image name
        #[serde(default)]
        name: String,
    },
    /// Apply a movement route to a character
    SetMoveRoute {
        /// Target character (-1 player, 0 this event)
        #[serde(default)]
        character_id: i32,
        /// Steps of the route
        route: MoveRoute,
    },
    /// Start a battle
    BattleProcessing {
        /// Which troop to fight
        troop: TroopRef,
    },
    /// Run script source
    Script {
        /// Source text
        source: String,
    },
    /// Invoke a plugin command
    PluginCommand {
        /// Command text with arguments
        source: String,
    },
    /// Run one of two command lists depending on a condition
    ConditionalBranch {
        /// Opaque condition description, evaluated by the interpreter
        #[serde(default)]
        condition: String,
        /// Commands run when the condition holds
        #[serde(default)]
        then_branch: Vec<Command>,
        /// Commands run otherwise
        #[serde(default)]
        else_branch: Vec<Command>,
    },
    /// Present a choice prompt
    ShowChoices {
        /// Choice labels
        choices: Vec<String>,
        /// Commands per choice, in label order
        #[serde(default)]
        arms: Vec<Vec<Command>>,
    },
    /// Invoke a subroutine by id
    CallSubroutine {
        /// Subroutine id
        id: u32,
    },
    /// Move the player to another scene
    TransferPlayer {
        /// Destination scene id
        scene_id: u32,
    },
    /// Any command irrelevant to image preloading
    #[serde(other)]
    Other,
}

impl Command {
    /// Nested command lists owned by this command
    pub fn children(&self) -> impl Iterator<Item = &[Command]> {
        let lists: Vec<&[Command]> = match self {
            Self::ConditionalBranch {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch.as_slice(), else_branch.as_slice()],
            Self::ShowChoices { arms, .. } => arms.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        };
        lists.into_iter()
    }
}

/// A movement route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveRoute {
    /// Loop when finished
    #[serde(default)]
    pub repeat: bool,
    /// Route steps
    #[serde(default)]
    pub list: Vec<MoveStep>,
}

/// One movement route step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MoveStep {
    /// Swap the character sprite sheet
    ChangeImage {
        /// Character image name
        name: String,
        /// Cell inside the sheet
        #[serde(default)]
        index: u32,
    },
    /// Any other step
    #[serde(other)]
    Other,
}

/// Troop selection of a battle command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by")]
pub enum TroopRef {
    /// A fixed troop
    Direct {
        /// Troop id
        troop_id: u32,
    },
    /// Troop id read from a game variable at runtime
    Variable {
        /// Variable id
        variable_id: u32,
    },
    /// Same troop as a random encounter
    RandomEncounter,
}
