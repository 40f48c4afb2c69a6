//! Sidecar file watching.
//!
//! Parameter sidecars are edited outside the application. A background thread watches
//! the data directory, debounces bursts of writes, re-parses each changed sidecar and
//! reports the outcome as `Event::SidecarChanged`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::events::Event;
use crate::params::Tool;

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Starts the watcher thread for `data_dir`.
pub fn spawn_sidecar_watcher(data_dir: PathBuf, tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || {
        if let Err(err) = watch_sidecars(&data_dir, tx) {
            log::warn!("sidecar watcher for {} failed: {:#}", data_dir.display(), err);
        }
    });
}

fn watch_sidecars(data_dir: &Path, tx: mpsc::Sender<Event>) -> Result<()> {
    let (raw_tx, raw_rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = raw_tx.send(res);
        },
        notify::Config::default(),
    )
    .context("failed to create watcher")?;
    watcher
        .watch(data_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", data_dir.display()))?;
    log::debug!("watching {} for sidecar edits", data_dir.display());

    loop {
        let event = match raw_rx.recv() {
            Ok(res) => res,
            Err(_) => break,
        };
        let mut changed = changed_tools(&event);
        if changed.is_empty() {
            continue;
        }

        let mut last = Instant::now();
        loop {
            let elapsed = last.elapsed();
            if elapsed >= DEBOUNCE {
                break;
            }
            match raw_rx.recv_timeout(DEBOUNCE - elapsed) {
                Ok(res) => {
                    let more = changed_tools(&res);
                    if !more.is_empty() {
                        changed.extend(more);
                        last = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }

        for tool in changed {
            let error = tool.validate(data_dir).err().map(|err| err.to_string());
            if tx
                .blocking_send(Event::SidecarChanged { tool, error })
                .is_err()
            {
                return Ok(());
            }
        }
    }

    Ok(())
}

/// Sidecars touched by a create or modify event.
fn changed_tools(event: &notify::Result<NotifyEvent>) -> BTreeSet<Tool> {
    let Ok(event) = event else {
        return BTreeSet::new();
    };
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return BTreeSet::new();
    }
    event
        .paths
        .iter()
        .filter_map(|path| path.file_name()?.to_str())
        .filter_map(Tool::from_file_name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> notify::Result<NotifyEvent> {
        let mut event = NotifyEvent::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        Ok(event)
    }

    #[test]
    fn only_sidecar_writes_are_relevant() {
        let changed = changed_tools(&event(
            EventKind::Modify(ModifyKind::Any),
            &["/data/nuitka.json", "/data/setting.json"],
        ));
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec![Tool::Nuitka]);

        let created = changed_tools(&event(
            EventKind::Create(CreateKind::File),
            &["/data/pipreqs.json"],
        ));
        assert!(created.contains(&Tool::Pipreqs));
    }

    #[test]
    fn removals_and_errors_are_ignored() {
        assert!(changed_tools(&event(
            EventKind::Remove(RemoveKind::File),
            &["/data/pyinstaller.json"]
        ))
        .is_empty());
        assert!(changed_tools(&Err(notify::Error::generic("boom"))).is_empty());
    }
}
