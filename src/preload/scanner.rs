//! Image reference discovery
//!
//! The scanner walks command trees and scene metadata and collects every image
//! they could display, whether or not the branch holding the reference ever
//! runs. Traversal uses an explicit worklist, so arbitrarily deep nesting of
//! conditional branches and choices is safe.
//!
//! The scanner only resolves identifiers. It never loads anything.

use rustc_hash::FxHashSet;

use crate::assets::{ResourceCategory, ResourceId};
use crate::core::{PreloadConfig, detail_level};
use crate::data::{Command, GameDatabase, MoveStep, SceneData, TroopRef};

use super::probe::{FileProbe, PathResolver};

const IMAGE_MANAGER_LOAD: &str = "ImageManager.load";
const LOAD_BITMAP: &str = "ImageManager.loadBitmap";
const LOAD_SYSTEM: &str = "ImageManager.loadSystem";
const CHARACTER_IMAGE_TAG: &str = "<characterImage:";

/// What the scanner looks at besides plain image commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Parse script and plugin command text for image loads
    pub check_scripts: bool,
    /// Inline the trees of called subroutines
    pub follow_subroutine_calls: bool,
    /// Log every discovered image at debug level
    pub verbose: bool,
}

impl ScanOptions {
    /// Derive scan options from the preloader configuration.
    ///
    /// Subroutine calls are followed only when subroutines are not preloaded
    /// on demand, so their images travel with the calling scene instead.
    #[must_use]
    pub fn from_config(config: &PreloadConfig) -> Self {
        Self {
            check_scripts: config.check_scripts,
            follow_subroutine_calls: !config.on_demand_subroutine_preload,
            verbose: config.debug_logging,
        }
    }
}

/// Command tree → set of existing image ids
pub struct ReferenceScanner<P: FileProbe> {
    resolver: PathResolver<P>,
    options: ScanOptions,
}

impl<P: FileProbe> ReferenceScanner<P> {
    /// Create a scanner probing `extensions` through `probe`
    #[must_use]
    pub fn new(probe: P, extensions: Vec<String>, options: ScanOptions) -> Self {
        Self {
            resolver: PathResolver::new(probe, extensions),
            options,
        }
    }

    /// Current options
    #[must_use]
    pub const fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// The memoizing resolver
    #[must_use]
    pub fn resolver(&self) -> &PathResolver<P> {
        &self.resolver
    }

    /// Images referenced by a command list, including every nested branch
    pub fn scan_commands(
        &mut self,
        commands: &[Command],
        db: &GameDatabase,
    ) -> FxHashSet<ResourceId> {
        let mut found = FxHashSet::default();
        self.walk(vec![commands], FxHashSet::default(), db, &mut found);
        found
    }

    /// Images referenced by a subroutine's own tree.
    ///
    /// Returns `None` if the database has no subroutine `id`.
    pub fn scan_subroutine(
        &mut self,
        id: u32,
        db: &GameDatabase,
    ) -> Option<FxHashSet<ResourceId>> {
        let subroutine = db.subroutine(id)?;
        let mut visited = FxHashSet::default();
        visited.insert(id);

        let mut found = FxHashSet::default();
        self.walk(vec![subroutine.list.as_slice()], visited, db, &mut found);
        Some(found)
    }

    /// Images a scene can display: event pages, note tags, the parallax
    /// and the tile layers of its tileset
    pub fn scan_scene(&mut self, scene: &SceneData, db: &GameDatabase) -> FxHashSet<ResourceId> {
        let mut found = FxHashSet::default();

        let pages: Vec<&[Command]> = scene
            .events
            .iter()
            .flat_map(|event| &event.pages)
            .map(|page| page.list.as_slice())
            .collect();
        self.walk(pages, FxHashSet::default(), db, &mut found);

        for event in &scene.events {
            for name in character_image_tags(&event.note) {
                self.add(&mut found, ResourceCategory::Character, name);
            }
        }

        self.add(&mut found, ResourceCategory::Parallax, &scene.parallax_name);

        if let Some(tileset) = scene.tileset_id.and_then(|id| db.tileset(id)) {
            for name in &tileset.tileset_names {
                self.add(&mut found, ResourceCategory::Tileset, name);
            }
        }

        log::debug!(
            "Scanned scene {} ({}): {} images",
            scene.id,
            scene.name,
            found.len()
        );
        found
    }

    /// Resolve the battlers and battle page images of every troop once, so
    /// the existence memo is warm before the first battle starts.
    ///
    /// Returns the number of distinct images found.
    pub fn warm_troops(&mut self, db: &GameDatabase) -> usize {
        let mut found = FxHashSet::default();

        let mut troop_ids: Vec<u32> = db.troops.keys().copied().collect();
        troop_ids.sort_unstable();
        for troop_id in troop_ids {
            self.add_troop(&mut found, troop_id, db);
            if let Some(troop) = db.troop(troop_id) {
                let pages = troop.pages.iter().map(|page| page.list.as_slice()).collect();
                self.walk(pages, FxHashSet::default(), db, &mut found);
            }
        }

        log::info!(
            "Warmed {} troops: {} images, {} probes",
            db.troops.len(),
            found.len(),
            self.resolver.probe_count()
        );
        found.len()
    }

    fn walk<'a>(
        &mut self,
        roots: Vec<&'a [Command]>,
        mut visited: FxHashSet<u32>,
        db: &'a GameDatabase,
        found: &mut FxHashSet<ResourceId>,
    ) {
        let mut worklist = roots;

        while let Some(list) = worklist.pop() {
            for command in list {
                worklist.extend(command.children());

                match command {
                    Command::ShowText { face, .. } => {
                        self.add(found, ResourceCategory::Face, face);
                    }
                    Command::ShowPicture { name, .. } | Command::MovePicture { name, .. } => {
                        self.add(found, ResourceCategory::Picture, name);
                    }
                    Command::SetMoveRoute { route, .. } => {
                        for step in &route.list {
                            if let MoveStep::ChangeImage { name, .. } = step {
                                self.add(found, ResourceCategory::Character, name);
                            }
                        }
                    }
                    Command::BattleProcessing {
                        troop: TroopRef::Direct { troop_id },
                    } => {
                        self.add_troop(found, *troop_id, db);
                    }
                    Command::Script { source } | Command::PluginCommand { source } => {
                        if self.options.check_scripts {
                            for path in script_image_paths(source) {
                                self.add_path(found, &path);
                            }
                        }
                    }
                    Command::CallSubroutine { id } => {
                        if self.options.follow_subroutine_calls && visited.insert(*id) {
                            if let Some(subroutine) = db.subroutine(*id) {
                                worklist.push(subroutine.list.as_slice());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn add_troop(&mut self, found: &mut FxHashSet<ResourceId>, troop_id: u32, db: &GameDatabase) {
        let Some(troop) = db.troop(troop_id) else {
            return;
        };
        for member in &troop.members {
            if let Some(enemy) = db.enemy(member.enemy_id) {
                self.add(found, ResourceCategory::Enemy, &enemy.battler_name);
                self.add(found, ResourceCategory::SvEnemy, &enemy.battler_name);
            }
        }
    }

    fn add(&mut self, found: &mut FxHashSet<ResourceId>, category: ResourceCategory, name: &str) {
        if let Some(id) = self.resolver.resolve_in(category, name) {
            self.record(found, id);
        }
    }

    fn add_path(&mut self, found: &mut FxHashSet<ResourceId>, path: &str) {
        if let Some(id) = self.resolver.resolve(ResourceId::new(path)) {
            self.record(found, id);
        }
    }

    fn record(&self, found: &mut FxHashSet<ResourceId>, id: ResourceId) {
        if !found.contains(&id) {
            log::log!(detail_level(self.options.verbose), "Found image {id}");
            found.insert(id);
        }
    }
}

/// Names inside `<characterImage:NAME>` note tags
fn character_image_tags(note: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = note;
    while let Some(start) = rest.find(CHARACTER_IMAGE_TAG) {
        let tail = &rest[start + CHARACTER_IMAGE_TAG.len()..];
        let Some(end) = tail.find('>') else {
            break;
        };
        names.push(tail[..end].trim());
        rest = &tail[end + 1..];
    }
    names
}

/// Image paths passed as string literals to `ImageManager` loads.
///
/// `loadBitmap('img/pictures/', 'Sun')` yields `img/pictures/Sun`, and
/// `loadSystem('Window')` yields `img/system/Window`. Calls with computed
/// arguments are ignored.
fn script_image_paths(source: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(IMAGE_MANAGER_LOAD) {
        let call = &rest[start..];
        let (folder, args) = if let Some(args) = call.strip_prefix(LOAD_BITMAP) {
            (None, args)
        } else if let Some(args) = call.strip_prefix(LOAD_SYSTEM) {
            (Some(ResourceCategory::System.directory()), args)
        } else {
            rest = &call[IMAGE_MANAGER_LOAD.len()..];
            continue;
        };

        match (folder, string_arguments(args).as_slice()) {
            (Some(dir), [name, ..]) if !name.is_empty() => paths.push(format!("{dir}/{name}")),
            (None, [dir, name, ..]) if !name.is_empty() => paths.push(format!("{dir}/{name}")),
            (None, [path]) if !path.is_empty() => paths.push((*path).to_string()),
            _ => {}
        }
        rest = args;
    }
    paths
}

/// Leading string literal arguments of a call. `args` starts right after
/// the callee name.
fn string_arguments(args: &str) -> Vec<&str> {
    let mut literals = Vec::new();
    let Some(mut rest) = args.trim_start().strip_prefix('(') else {
        return literals;
    };

    loop {
        rest = rest.trim_start();
        let Some(quote) = rest.chars().next().filter(|c| matches!(c, '\'' | '"' | '`')) else {
            break;
        };
        let body = &rest[1..];
        let Some(end) = body.find(quote) else {
            break;
        };
        literals.push(&body[..end]);

        rest = body[end + 1..].trim_start();
        match rest.strip_prefix(',') {
            Some(next) => rest = next,
            None => break,
        }
    }
    literals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        Enemy, EventPage, MoveRoute, SceneEvent, Subroutine, Tileset, Troop, TroopMember,
    };
    use std::path::Path;

    /// Probe accepting everything except paths containing "Missing"
    fn lenient(path: &Path) -> bool {
        !path.to_string_lossy().contains("Missing")
    }

    fn scanner(options: ScanOptions) -> ReferenceScanner<fn(&Path) -> bool> {
        ReferenceScanner::new(lenient as fn(&Path) -> bool, vec!["png".into()], options)
    }

    fn ids(found: &FxHashSet<ResourceId>) -> Vec<&str> {
        let mut ids: Vec<&str> = found.iter().map(ResourceId::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn text(face: &str) -> Command {
        Command::ShowText {
            face: face.into(),
            face_index: 0,
        }
    }

    fn picture(name: &str) -> Command {
        Command::ShowPicture {
            picture_id: 1,
            name: name.into(),
        }
    }

    #[test]
    fn test_hidden_branches_are_discovered() {
        let commands = vec![
            text("Actor1"),
            Command::ConditionalBranch {
                condition: "switch 1".into(),
                then_branch: vec![picture("Sun")],
                else_branch: vec![Command::ShowChoices {
                    choices: vec!["A".into(), "B".into()],
                    arms: vec![vec![], vec![text("Actor2"), picture("Missing")]],
                }],
            },
            Command::MovePicture {
                picture_id: 1,
                name: String::new(),
            },
        ];

        let found = scanner(ScanOptions::default()).scan_commands(&commands, &GameDatabase::new());
        assert_eq!(
            ids(&found),
            vec!["img/faces/Actor1", "img/faces/Actor2", "img/pictures/Sun"]
        );
    }

    #[test]
    fn test_scan_is_deterministic() {
        let commands = vec![text("A"), picture("B"), text("A")];
        let db = GameDatabase::new();
        let mut scanner = scanner(ScanOptions::default());

        let first = scanner.scan_commands(&commands, &db);
        let second = scanner.scan_commands(&commands, &db);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        // Second scan answered from the memo
        assert_eq!(scanner.resolver().probe_count(), 2);
    }

    #[test]
    fn test_deep_nesting() {
        let mut commands = vec![picture("Bottom")];
        for _ in 0..5_000 {
            commands = vec![Command::ConditionalBranch {
                condition: String::new(),
                then_branch: commands,
                else_branch: Vec::new(),
            }];
        }

        let found = scanner(ScanOptions::default()).scan_commands(&commands, &GameDatabase::new());
        assert_eq!(ids(&found), vec!["img/pictures/Bottom"]);

        // Unwind iteratively so the test itself does not overflow on drop
        let mut list = commands;
        while let Some(Command::ConditionalBranch { then_branch, .. }) = list.pop() {
            list = then_branch;
        }
    }

    #[test]
    fn test_move_route_and_battle() {
        let mut db = GameDatabase::new();
        db.enemies.insert(
            1,
            Enemy {
                name: "Bat".into(),
                battler_name: "Bat".into(),
            },
        );
        db.troops.insert(
            4,
            Troop {
                name: "Bats".into(),
                members: vec![TroopMember { enemy_id: 1 }, TroopMember { enemy_id: 9 }],
                pages: Vec::new(),
            },
        );

        let commands = vec![
            Command::SetMoveRoute {
                character_id: 0,
                route: MoveRoute {
                    repeat: false,
                    list: vec![
                        MoveStep::Other,
                        MoveStep::ChangeImage {
                            name: "Monster".into(),
                            index: 2,
                        },
                    ],
                },
            },
            Command::BattleProcessing {
                troop: TroopRef::Direct { troop_id: 4 },
            },
            Command::BattleProcessing {
                troop: TroopRef::Variable { variable_id: 3 },
            },
        ];

        let found = scanner(ScanOptions::default()).scan_commands(&commands, &db);
        assert_eq!(
            ids(&found),
            vec![
                "img/characters/Monster",
                "img/enemies/Bat",
                "img/sv_enemies/Bat"
            ]
        );
    }

    #[test]
    fn test_subroutine_calls_are_cycle_safe() {
        let mut db = GameDatabase::new();
        db.subroutines.insert(
            1,
            Subroutine {
                name: "Ping".into(),
                list: vec![picture("Ping"), Command::CallSubroutine { id: 2 }],
                ..Default::default()
            },
        );
        db.subroutines.insert(
            2,
            Subroutine {
                name: "Pong".into(),
                list: vec![picture("Pong"), Command::CallSubroutine { id: 1 }],
                ..Default::default()
            },
        );
        let commands = vec![Command::CallSubroutine { id: 1 }];

        let options = ScanOptions {
            follow_subroutine_calls: true,
            ..Default::default()
        };
        let found = scanner(options).scan_commands(&commands, &db);
        assert_eq!(ids(&found), vec!["img/pictures/Ping", "img/pictures/Pong"]);

        // Without inlining, only the subroutine's own tree counts
        let mut plain = scanner(ScanOptions::default());
        assert!(plain.scan_commands(&commands, &db).is_empty());
        let own = plain.scan_subroutine(1, &db).unwrap();
        assert_eq!(ids(&own), vec!["img/pictures/Ping"]);
        assert!(plain.scan_subroutine(99, &db).is_none());
    }

    #[test]
    fn test_scripts_only_when_enabled() {
        let commands = vec![
            Command::Script {
                source: "const b = ImageManager.loadBitmap('img/pictures/', 'Moon', 0);".into(),
            },
            Command::PluginCommand {
                source: r#"ImageManager.loadSystem("Balloon"); ImageManager.loadFace(x)"#.into(),
            },
            Command::Script {
                source: "ImageManager.loadBitmap(folder, name)".into(),
            },
        ];
        let db = GameDatabase::new();

        assert!(scanner(ScanOptions::default()).scan_commands(&commands, &db).is_empty());

        let options = ScanOptions {
            check_scripts: true,
            ..Default::default()
        };
        let found = scanner(options).scan_commands(&commands, &db);
        assert_eq!(ids(&found), vec!["img/pictures/Moon", "img/system/Balloon"]);
    }

    #[test]
    fn test_scan_scene_metadata() {
        let mut db = GameDatabase::new();
        db.tilesets.insert(
            2,
            Tileset {
                name: "Town".into(),
                tileset_names: vec!["Outside_A1".into(), String::new(), "Outside_B".into()],
            },
        );

        let mut scene = SceneData::new(7, "Town");
        scene.parallax_name = "Sky".into();
        scene.tileset_id = Some(2);
        scene.add_event(SceneEvent {
            id: 1,
            name: "Elder".into(),
            note: "<characterImage: Elder > <characterImage:Missing>".into(),
            pages: vec![
                EventPage {
                    list: vec![text("Elder")],
                },
                EventPage {
                    list: vec![picture("Map")],
                },
            ],
        });

        let found = scanner(ScanOptions::default()).scan_scene(&scene, &db);
        assert_eq!(
            ids(&found),
            vec![
                "img/characters/Elder",
                "img/faces/Elder",
                "img/parallaxes/Sky",
                "img/pictures/Map",
                "img/tilesets/Outside_A1",
                "img/tilesets/Outside_B",
            ]
        );
    }

    #[test]
    fn test_warm_troops_fills_memo() {
        let mut db = GameDatabase::new();
        db.enemies.insert(
            1,
            Enemy {
                name: "Slime".into(),
                battler_name: "Slime".into(),
            },
        );
        db.troops.insert(
            1,
            Troop {
                name: "Slimes".into(),
                members: vec![TroopMember { enemy_id: 1 }; 3],
                pages: vec![EventPage {
                    list: vec![picture("Boss")],
                }],
            },
        );

        let mut scanner = scanner(ScanOptions::default());
        assert_eq!(scanner.warm_troops(&db), 3);
        let probes = scanner.resolver().probe_count();

        let battle = vec![Command::BattleProcessing {
            troop: TroopRef::Direct { troop_id: 1 },
        }];
        assert_eq!(scanner.scan_commands(&battle, &db).len(), 2);
        assert_eq!(scanner.resolver().probe_count(), probes);
    }

    #[test]
    fn test_string_arguments() {
        assert_eq!(string_arguments(" ( 'a' , \"b\", c)"), vec!["a", "b"]);
        assert_eq!(string_arguments("(`x`)"), vec!["x"]);
        assert!(string_arguments("('unterminated)").is_empty());
        assert!(string_arguments("no call").is_empty());
    }
}
