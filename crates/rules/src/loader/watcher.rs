//! Filesystem watcher that signals when the rules directory changes.

use std::path::Path;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::error::Result;
use super::repository::is_yaml;

/// Start a recursive watcher on `dir`. `on_change` is called from the
/// watcher thread for every create/modify/remove of a visible YAML file.
/// The returned watcher must be kept alive for events to keep flowing.
pub fn watch_rules<F>(dir: &Path, on_change: F) -> Result<RecommendedWatcher>
where
    F: Fn() + Send + 'static,
{
    let mut watcher = notify::recommended_watcher(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) if is_rule_change(&event) => on_change(),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        },
    )?;

    watcher.watch(dir, RecursiveMode::Recursive)?;
    let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

    info!(path = %dir.display(), "watching rules directory for changes (recursive)");
    Ok(watcher)
}

pub(crate) fn is_rule_change(event: &Event) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Remove(RemoveKind::File)
            | EventKind::Remove(RemoveKind::Any)
    );
    relevant_kind
        && event.paths.iter().any(|path| {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true);
            !hidden && is_yaml(path)
        })
}
