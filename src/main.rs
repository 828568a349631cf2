//! Preloader demo: walks a game project through a list of scenes
//!
//! Usage: `scene-preload <project dir> [SCENE | call:ID | stop:ID]...`
//!
//! Numbers are scene ids loaded from `data/MapNNN.json`; `call:ID` invokes a
//! subroutine and `stop:ID` stops one. Options are read from `preload.ron` in
//! the project directory when present. Set `RUST_LOG=debug` for detail.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scene_preload::prelude::*;

const FRAME: Duration = Duration::from_millis(16);
const MAX_FRAMES: usize = 3600;

type Manager = PreloadManager<FileImageSource, FsProbe>;

/// One step of the walk
enum Step {
    Scene(u32),
    Call(u32),
    Stop(u32),
}

fn parse_step(arg: &str) -> Result<Step, Box<dyn Error>> {
    let step = if let Some(id) = arg.strip_prefix("call:") {
        Step::Call(id.parse()?)
    } else if let Some(id) = arg.strip_prefix("stop:") {
        Step::Stop(id.parse()?)
    } else {
        Step::Scene(arg.parse()?)
    };
    Ok(step)
}

fn load_config(root: &Path) -> Result<PreloadConfig, ConfigError> {
    let path = root.join("preload.ron");
    if path.is_file() {
        PreloadConfig::load_ron(path)
    } else {
        Ok(PreloadConfig::default())
    }
}

/// Run frames until the preloader is idle, logging what it reports
fn settle(manager: &mut Manager) {
    for _ in 0..MAX_FRAMES {
        manager.update();
        for event in manager.events().iter() {
            match event {
                PreloadEvent::AssetFailed { id, error } => log::warn!("{id}: {error}"),
                other => log::info!("{other:?}"),
            }
        }
        if manager.is_idle() && manager.events().pending_count() == 0 {
            return;
        }
        std::thread::sleep(FRAME);
    }
    log::warn!("Preloader still busy after {MAX_FRAMES} frames");
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let root = PathBuf::from(args.next().ok_or("missing project directory")?);
    let steps = args
        .map(|arg| parse_step(&arg))
        .collect::<Result<Vec<_>, _>>()?;

    let config = load_config(&root)?;
    let database = GameDatabase::load(root.join("data/Database.json"))?;
    let source = FileImageSource::new(&root, config.image_extensions.clone());
    let mut manager = PreloadManager::new(config, source, FsProbe::new(&root), database)?;

    manager.warm_troops();

    for step in steps {
        match step {
            Step::Scene(id) => {
                let scene = SceneData::load(root.join(format!("data/Map{id:03}.json")))?;
                log::info!("Entering scene {id} ({})", scene.name);
                manager.on_scene_loaded(&scene);
            }
            Step::Call(id) => {
                let outcome = manager.on_subroutine_invoke(id);
                log::info!("Invoked subroutine {id}: {outcome:?}");
            }
            Step::Stop(id) => {
                manager.stop_subroutine(id);
            }
        }
        settle(&mut manager);
        log::info!(
            "{} images cached | {}",
            manager.cache().len(),
            manager.stats().format_stats()
        );
    }

    Ok(())
}
