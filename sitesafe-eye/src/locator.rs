//! Output locator
//!
//! The detector does not report where it wrote its annotated media, so the
//! output is found by looking at the run directory: the one keyed by the
//! invocation id, or failing that the newest non-invocation directory that
//! appeared or changed under the output root while the detector ran.

use crate::config::SettleConfig;
use crate::error::{DetectError, Result};
use crate::media::{has_extension, MediaKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on preview frames collected for a video run
pub const MAX_SAMPLE_FRAMES: usize = 3;

/// Media selected from one run directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedOutput {
    pub dir: PathBuf,
    pub media: PathBuf,
    /// Still frames for previews, sorted by file name. Always empty for
    /// image runs.
    pub sample_frames: Vec<PathBuf>,
}

/// Run directories and their modification times at one point in time
pub type RunDirSnapshot = BTreeMap<PathBuf, SystemTime>;

pub struct OutputLocator {
    root: PathBuf,
}

impl OutputLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory reserved for one invocation
    pub fn run_dir(&self, invocation_id: Uuid) -> PathBuf {
        crate::detector::run_dir(&self.root, invocation_id)
    }

    /// Most recently modified subdirectory of the output root. Equal
    /// timestamps resolve to the greatest path so repeated calls agree.
    pub fn latest_run_dir(&self) -> Result<PathBuf> {
        self.list_run_dirs()?
            .into_iter()
            .max()
            .map(|(_, path)| path)
            .ok_or_else(|| {
                DetectError::OutputNotFound(format!("no run directories under {:?}", self.root))
            })
    }

    /// Subdirectories of the output root and their modification times,
    /// taken before a detector runs. A missing root gives an empty snapshot.
    pub fn snapshot_run_dirs(&self) -> Result<RunDirSnapshot> {
        match self.list_run_dirs() {
            Ok(dirs) => Ok(dirs.into_iter().map(|(modified, path)| (path, modified)).collect()),
            Err(DetectError::OutputNotFound(_)) => Ok(RunDirSnapshot::new()),
            Err(e) => Err(e),
        }
    }

    /// Newest directory created or modified since `before` was taken.
    /// Invocation-keyed directories belong to their own runs and are never
    /// returned.
    pub fn latest_changed_run_dir(&self, before: &RunDirSnapshot) -> Result<PathBuf> {
        self.list_run_dirs()?
            .into_iter()
            .filter(|(_, path)| !is_invocation_dir(path))
            .filter(|(modified, path)| before.get(path) != Some(modified))
            .max()
            .map(|(_, path)| path)
            .ok_or_else(|| {
                DetectError::OutputNotFound(format!(
                    "no new run directory under {:?}",
                    self.root
                ))
            })
    }

    fn list_run_dirs(&self) -> Result<Vec<(SystemTime, PathBuf)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DetectError::OutputNotFound(format!(
                    "output root {:?} does not exist",
                    self.root
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                dirs.push((metadata.modified()?, entry.path()));
            }
        }
        Ok(dirs)
    }

    /// Select the annotated media of `kind` in `dir`, plus sample frames
    /// for videos.
    pub fn locate(&self, dir: &Path, kind: MediaKind) -> Result<LocatedOutput> {
        if !dir.is_dir() {
            return Err(DetectError::OutputNotFound(format!("{:?} is not a directory", dir)));
        }

        let media = first_with_preferred_extension(dir, kind.output_extensions())?
            .ok_or_else(|| {
                DetectError::OutputNotFound(format!(
                    "no {} file ({}) in {:?}",
                    kind,
                    kind.output_extensions().join("/"),
                    dir
                ))
            })?;

        let sample_frames = match kind {
            MediaKind::Video => sample_frames(dir)?,
            MediaKind::Image => Vec::new(),
        };

        debug!("Located {:?} with {} sample frames", media, sample_frames.len());
        Ok(LocatedOutput {
            dir: dir.to_path_buf(),
            media,
            sample_frames,
        })
    }

    /// Locate output in the most recently modified run directory
    pub fn locate_latest(&self, kind: MediaKind) -> Result<LocatedOutput> {
        let dir = self.latest_run_dir()?;
        self.locate(&dir, kind)
    }

    /// Wait until the listing of `dir` stops changing. Returns `false` when
    /// the timeout elapsed first; callers go on with whatever is on disk.
    pub async fn wait_until_stable(&self, dir: &Path, settle: &SettleConfig) -> bool {
        let deadline = Instant::now() + settle.timeout();
        let mut previous = snapshot(dir);
        let mut unchanged = 0u32;

        loop {
            if previous.is_some() && unchanged >= settle.stable_polls {
                return true;
            }
            if Instant::now() >= deadline {
                warn!("{:?} did not settle within {:?}", dir, settle.timeout());
                return false;
            }
            tokio::time::sleep(settle.poll_interval()).await;

            let current = snapshot(dir);
            if current.is_some() && current == previous {
                unchanged += 1;
            } else {
                unchanged = 0;
            }
            previous = current;
        }
    }
}

/// Whether `dir` is named after an invocation id
fn is_invocation_dir(dir: &Path) -> bool {
    dir.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| Uuid::parse_str(name).is_ok())
}

/// First file (in path order) carrying the earliest matching extension
fn first_with_preferred_extension(dir: &Path, extensions: &[&str]) -> Result<Option<PathBuf>> {
    for ext in extensions {
        if let Some(path) = files_with_extension(dir, ext)?.into_iter().next() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Up to [`MAX_SAMPLE_FRAMES`] jpg stills, or png stills if there are no jpgs
fn sample_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    for ext in MediaKind::Image.output_extensions() {
        let mut frames = files_with_extension(dir, ext)?;
        if !frames.is_empty() {
            frames.truncate(MAX_SAMPLE_FRAMES);
            return Ok(frames);
        }
    }
    Ok(Vec::new())
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Names and sizes of the entries directly under `dir`
fn snapshot(dir: &Path) -> Option<Vec<(PathBuf, u64)>> {
    let entries = fs::read_dir(dir).ok()?;
    let mut listing: Vec<(PathBuf, u64)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            (entry.path(), len)
        })
        .collect();
    listing.sort();
    Some(listing)
}
