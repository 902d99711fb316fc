use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};

use orthrus::error::{Chainable, Error, Result};
use orthrus::{Builder, ChangeEvent, ChangeKind};

/// How long to wait for related filesystem events to arrive before acting.
const SETTLE: Duration = Duration::from_millis(150);

fn change_kind(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Other,
    }
}

/// Translates a notify event into one change event per affected path.
pub fn changes(event: &notify::Event) -> impl Iterator<Item = ChangeEvent> + '_ {
    let kind = change_kind(&event.kind);
    event.paths.iter().map(move |path| ChangeEvent::new(path.clone(), kind))
}

/// Watches the builder's content and template directories and dispatches
/// every change to it. Runs until the watcher shuts down.
pub fn run(builder: &mut Builder) -> Result<()> {
    let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |event| {
        let _ = tx.send(event);
    }).map_err(Error::from_std)?;

    let dirs: Vec<_> = builder.watch_dirs().into_iter().map(Path::to_path_buf).collect();
    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::NonRecursive)
            .map_err(Error::from_std)
            .chain_with(|| orthrus::error!("failed to watch directory", "path" => dir.display()))?;

        tracing::info!(path = %dir.display(), "watching");
    }

    while let Ok(first) = rx.recv() {
        std::thread::sleep(SETTLE);
        let mut batch: Vec<ChangeEvent> = vec![];
        for result in std::iter::once(first).chain(rx.try_iter()) {
            match result {
                Ok(event) => for change in changes(&event) {
                    if !batch.contains(&change) {
                        batch.push(change);
                    }
                },
                Err(e) => tracing::warn!("watch error: {e}"),
            }
        }

        for change in &batch {
            match builder.handle(change) {
                Ok(Some(report)) => tracing::info!(path = %change.path.display(), "rebuilt: {report}"),
                Ok(None) => tracing::trace!(path = %change.path.display(), kind = ?change.kind, "ignored"),
                Err(e) => tracing::error!(path = %change.path.display(), "rebuild failed:\n{e}"),
            }
        }
    }

    Ok(())
}
