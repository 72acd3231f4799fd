use std::fs;
use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::queue::QueueSender;

use super::OutboundItem;

pub const OUTBOUND_EXTENSION: &str = "email";

pub fn is_outbound_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(OUTBOUND_EXTENSION))
}

/// Regular `.email` files directly inside `dir`, sorted by path.
pub fn list_existing(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_outbound_file(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Feeds the outbound queue from the input directory: everything already
/// there, then every `.email` file written or moved in afterwards.
pub struct OutboundWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl OutboundWatcher {
    /// The watcher is armed before the listing, so a file written in between
    /// may be queued twice; the sender's cache drops the second copy.
    pub fn start(dir: &Path, queue: QueueSender<OutboundItem>) -> AppResult<Self> {
        if !dir.is_dir() {
            return Err(AppError::Startup(format!(
                "input path {} is not a directory",
                dir.display()
            )));
        }

        let events = queue.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => enqueue_completed(event, &events),
                Err(err) => warn!("input directory watch error: {err}"),
            }
        })
        .map_err(|err| AppError::Startup(format!("unable to watch {}: {err}", dir.display())))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|err| AppError::Startup(format!("unable to watch {}: {err}", dir.display())))?;

        let existing = list_existing(dir)?;
        if !existing.is_empty() {
            info!("queueing {} existing outbound files", existing.len());
        }
        for path in existing {
            queue.push(OutboundItem::new(path));
        }

        info!("watching {} for outbound mail", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn stop(self) {
        debug!("no longer watching {}", self.dir.display());
    }
}

/// Files that are complete: closed after writing, or renamed into the
/// directory. A bare create fires before any content is written.
fn completed_paths(event: Event) -> Vec<PathBuf> {
    let mut paths = event.paths;
    match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths,
        // Both the old and the new name; only the new one matters.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => paths.pop().into_iter().collect(),
        _ => Vec::new(),
    }
}

fn enqueue_completed(event: Event, queue: &QueueSender<OutboundItem>) {
    for path in completed_paths(event) {
        if !is_outbound_file(&path) {
            continue;
        }

        debug!("queued outbound file {}", path.display());
        if !queue.push(OutboundItem::new(path)) {
            return;
        }
    }
}
