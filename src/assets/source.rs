//! Image load primitive
//!
//! An [`AssetSource`] starts loads and later reports their outcome. The cache
//! only ever talks to the source from its owning thread; a source is free to do
//! the actual reading and decoding elsewhere.

use std::fmt;
use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;

use super::resource::ResourceId;

/// Identifies one load request. A reload of the same id gets a new ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(pub(crate) u64);

impl LoadTicket {
    /// Raw ticket number
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Outcome of a load started with [`AssetSource::begin`].
#[derive(Debug)]
pub struct LoadCompletion {
    /// Ticket passed to `begin`
    pub ticket: LoadTicket,
    /// Resource that was loaded
    pub id: ResourceId,
    /// Decoded pixels or the reason the load failed
    pub result: Result<RgbaImage, LoadError>,
}

/// Errors that can occur while loading an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The file could not be read
    IoError(String),
    /// The file was read but is not a decodable image
    DecodeError(String),
    /// The loader went away before reporting
    Disconnected,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DecodeError(e) => write!(f, "Decode error: {e}"),
            Self::Disconnected => write!(f, "Loader disconnected"),
        }
    }
}

impl std::error::Error for LoadError {}

/// The load primitive consumed by [`AssetCache`](super::AssetCache).
pub trait AssetSource {
    /// Start loading `id`. The outcome must eventually be reported by `drain`.
    fn begin(&mut self, ticket: LoadTicket, id: &ResourceId);

    /// Move every completion that arrived since the last call into `out`.
    fn drain(&mut self, out: &mut Vec<LoadCompletion>);
}

/// Loads images from disk on short-lived worker threads.
///
/// Each request reads and decodes one file off the main loop and sends the
/// result back over a channel, which `drain` empties without blocking.
pub struct FileImageSource {
    root: PathBuf,
    extensions: Vec<String>,
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
}

impl FileImageSource {
    /// Create a source rooted at the game directory
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            root: root.into(),
            extensions,
            sender,
            receiver,
        }
    }

    /// File that will be read for `id`: the first extension that exists,
    /// or the first extension if none does (the read then fails with an IO error).
    #[must_use]
    pub fn resolve_path(&self, id: &ResourceId) -> PathBuf {
        let candidates: Vec<PathBuf> = self
            .extensions
            .iter()
            .map(|ext| self.root.join(id.with_extension(ext)))
            .collect();

        candidates
            .iter()
            .find(|path| path.is_file())
            .or_else(|| candidates.first())
            .cloned()
            .unwrap_or_else(|| self.root.join(id.as_str()))
    }
}

fn read_image(path: &Path) -> Result<RgbaImage, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::IoError(e.to_string()))?;
    let image =
        image::load_from_memory(&bytes).map_err(|e| LoadError::DecodeError(e.to_string()))?;
    Ok(image.to_rgba8())
}

impl AssetSource for FileImageSource {
    fn begin(&mut self, ticket: LoadTicket, id: &ResourceId) {
        let path = self.resolve_path(id);
        let sender = self.sender.clone();
        let worker_id = id.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("image-load-{}", ticket.value()))
            .spawn(move || {
                let result = read_image(&path);
                // The receiver only disappears when the source itself was dropped.
                let _ = sender.send(LoadCompletion {
                    ticket,
                    id: worker_id,
                    result,
                });
            });

        if let Err(e) = spawned {
            let _ = self.sender.send(LoadCompletion {
                ticket,
                id: id.clone(),
                result: Err(LoadError::IoError(e.to_string())),
            });
        }
    }

    fn drain(&mut self, out: &mut Vec<LoadCompletion>) {
        out.extend(self.receiver.try_iter());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for(source: &mut FileImageSource) -> LoadCompletion {
        let mut out = Vec::new();
        for _ in 0..500 {
            source.drain(&mut out);
            if let Some(completion) = out.pop() {
                return completion;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("load never completed");
    }

    #[test]
    fn test_file_source_decodes_png() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("img/pictures")).unwrap();
        RgbaImage::new(3, 2)
            .save(dir.path().join("img/pictures/Sun.png"))
            .unwrap();

        let mut source = FileImageSource::new(dir.path(), vec!["png".to_string()]);
        let id = ResourceId::new("img/pictures/Sun");
        source.begin(LoadTicket(7), &id);

        let completion = wait_for(&mut source);
        assert_eq!(completion.ticket, LoadTicket(7));
        assert_eq!(completion.id, id);
        assert_eq!(completion.result.unwrap().dimensions(), (3, 2));
    }

    #[test]
    fn test_file_source_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();

        let mut source = FileImageSource::new(dir.path(), vec!["png".to_string()]);
        source.begin(LoadTicket(1), &ResourceId::new("missing"));
        let completion = wait_for(&mut source);
        assert!(matches!(completion.result, Err(LoadError::IoError(_))));

        source.begin(LoadTicket(2), &ResourceId::new("broken"));
        let completion = wait_for(&mut source);
        assert!(matches!(completion.result, Err(LoadError::DecodeError(_))));
    }

    #[test]
    fn test_resolve_path_prefers_existing_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"").unwrap();

        let source = FileImageSource::new(dir.path(), vec!["png".into(), "jpg".into()]);
        assert_eq!(
            source.resolve_path(&ResourceId::new("a")),
            dir.path().join("a.jpg")
        );
        assert_eq!(
            source.resolve_path(&ResourceId::new("b")),
            dir.path().join("b.png")
        );
    }
}
