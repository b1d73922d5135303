//! Filesystem watch keeping a [`TemplateStore`] in sync with its directory

use corral_core::is_package_path;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, StoreError};
use crate::store::TemplateStore;

/// What a filesystem event means for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Load(PathBuf),
    Unload(PathBuf),
}

/// Map a notify event to store changes.
///
/// Creations and renames into the directory load, removals and renames out
/// of it unload. Only package file names are considered.
pub fn changes_for(event: &Event) -> Vec<StoreChange> {
    let packages = || event.paths.iter().filter(|p| is_package_path(p)).cloned();

    match &event.kind {
        EventKind::Create(_)
        | EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            packages().map(StoreChange::Load).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            packages().map(StoreChange::Unload).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first().filter(|p| is_package_path(p)) {
                changes.push(StoreChange::Unload(from.clone()));
            }
            if let Some(to) = event.paths.get(1).filter(|p| is_package_path(p)) {
                changes.push(StoreChange::Load(to.clone()));
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(_)) => packages()
            .map(|p| {
                if p.exists() {
                    StoreChange::Load(p)
                } else {
                    StoreChange::Unload(p)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// A running watch; dropping it stops watching
pub struct TemplateWatcher {
    _watcher: Option<RecommendedWatcher>,
    task: JoinHandle<Result<()>>,
}

impl TemplateWatcher {
    /// Watch the store's directory and apply changes as they arrive.
    ///
    /// Loading runs on the blocking pool. A watcher error ends the watch;
    /// [`TemplateWatcher::finished`] returns it.
    pub fn start(store: Arc<TemplateStore>) -> Result<Self> {
        let directory = store.directory().to_path_buf();
        std::fs::create_dir_all(&directory)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // receiver gone means the watch is shutting down
            let _ = tx.send(event);
        })?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        info!(directory = %directory.display(), "watching template directory");

        let mut this = Self::from_events(store, rx);
        this._watcher = Some(watcher);
        Ok(this)
    }

    /// Apply events from any source to `store`
    pub fn from_events(
        store: Arc<TemplateStore>,
        rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ) -> Self {
        Self {
            _watcher: None,
            task: tokio::spawn(process_events(store, rx)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the watch to end.
    ///
    /// `Ok` means the event source closed, `Err` that it failed.
    pub async fn finished(&mut self) -> Result<()> {
        (&mut self.task).await?
    }
}

impl Drop for TemplateWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Wait until any of `watchers` ends. Pending forever when there are none.
pub async fn first_finished(watchers: &mut [TemplateWatcher]) -> Result<()> {
    if watchers.is_empty() {
        return std::future::pending().await;
    }

    std::future::poll_fn(|cx| {
        for watcher in watchers.iter_mut() {
            if let Poll::Ready(joined) = Pin::new(&mut watcher.task).poll(cx) {
                return Poll::Ready(joined.map_err(StoreError::from).and_then(|r| r));
            }
        }
        Poll::Pending
    })
    .await
}

async fn process_events(
    store: Arc<TemplateStore>,
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
) -> Result<()> {
    while let Some(event) = rx.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!(directory = %store.directory().display(), error = %e, "template watcher failed");
                return Err(e.into());
            }
        };

        for change in changes_for(&event) {
            apply(&store, change).await;
        }
    }
    Ok(())
}

async fn apply(store: &Arc<TemplateStore>, change: StoreChange) {
    match change {
        StoreChange::Load(path) => {
            let target = Arc::clone(store);
            let loading = path.clone();
            match tokio::task::spawn_blocking(move || target.load_one(&loading)).await {
                Ok(Ok(template)) => info!(key = %template.key(), "template loaded from watch"),
                Ok(Err(e)) => warn!(error = %e, "failed to load watched package"),
                Err(e) => warn!(path = %path.display(), error = %e, "load task failed"),
            }
        }
        StoreChange::Unload(path) => {
            if let Some(template) = store.unload_one(&path) {
                info!(key = %template.key(), "template unloaded from watch");
            } else {
                debug!(path = %path.display(), "removed package was not loaded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_create_and_remove() {
        let created = event(EventKind::Create(CreateKind::File), &["/t/demo_v1.0.0.tgz"]);
        assert_eq!(
            changes_for(&created),
            vec![StoreChange::Load(PathBuf::from("/t/demo_v1.0.0.tgz"))]
        );

        let removed = event(EventKind::Remove(RemoveKind::File), &["/t/demo_v1.0.0.tgz"]);
        assert_eq!(
            changes_for(&removed),
            vec![StoreChange::Unload(PathBuf::from("/t/demo_v1.0.0.tgz"))]
        );
    }

    #[test]
    fn test_rename_both() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/t/demo_v1.0.0.tgz", "/t/demo_v1.0.1.tgz"],
        );
        assert_eq!(
            changes_for(&renamed),
            vec![
                StoreChange::Unload(PathBuf::from("/t/demo_v1.0.0.tgz")),
                StoreChange::Load(PathBuf::from("/t/demo_v1.0.1.tgz")),
            ]
        );
    }

    #[test]
    fn test_temp_file_rename_loads_target_only() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/t/.tmpA1b2C3", "/t/demo_v1.0.0.tgz"],
        );
        assert_eq!(
            changes_for(&renamed),
            vec![StoreChange::Load(PathBuf::from("/t/demo_v1.0.0.tgz"))]
        );
    }

    #[test]
    fn test_non_packages_ignored() {
        let created = event(EventKind::Create(CreateKind::File), &["/t/README.md"]);
        assert!(changes_for(&created).is_empty());

        let modified = event(
            EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            &["/t/demo_v1.0.0.tgz"],
        );
        assert!(changes_for(&modified).is_empty());
    }
}
