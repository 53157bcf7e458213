use bevy::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::editor::EditorSession;
use crate::game_runtime::{SessionMode, SessionRequest};
use crate::persistence::{parse_script_source, ProjectPath};
use crate::scripting::ActiveScript;

const MAX_EVENTS_PER_FRAME: usize = 16;

/// Watches the script document on disk and reloads it into the editor.
pub struct FileWatcherPlugin {
    pub path: PathBuf,
}

#[derive(Debug, PartialEq)]
pub enum FileWatchEvent {
    ScriptChanged(String),
}

#[derive(Resource)]
pub struct FileWatcherReceiver(pub Receiver<FileWatchEvent>);

impl Plugin for FileWatcherPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = crossbeam_channel::unbounded::<FileWatchEvent>();
        app.insert_resource(FileWatcherReceiver(rx));

        let path = self.path.clone();
        std::thread::spawn(move || {
            run_watcher(path, tx);
        });

        app.add_systems(Update, process_file_watch_events);
    }
}

fn run_watcher(script_path: PathBuf, tx: Sender<FileWatchEvent>) {
    let watched = script_path.clone();
    let mut watcher: RecommendedWatcher =
        match notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                handle_fs_event(event, &tx, &watched);
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("[Blockplay FileWatcher] Failed to create watcher: {e}");
                return;
            }
        };

    // notify needs a directory to catch editors that replace files on save
    let dir = script_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        eprintln!("[Blockplay FileWatcher] Failed to watch {}: {e}", dir.display());
        return;
    }
    println!(
        "[Blockplay FileWatcher] Watching script: {}",
        script_path.display()
    );

    // The watcher stops when dropped.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

fn handle_fs_event(event: NotifyEvent, tx: &Sender<FileWatchEvent>, script_path: &Path) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    if !event.paths.iter().any(|p| path_matches(p, script_path)) {
        return;
    }
    if let Ok(content) = std::fs::read_to_string(script_path) {
        let _ = tx.send(FileWatchEvent::ScriptChanged(content));
    }
}

fn path_matches(a: &Path, b: &Path) -> bool {
    let ca = std::fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let cb = std::fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    ca == cb
}

fn process_file_watch_events(
    watcher: Option<Res<FileWatcherReceiver>>,
    mut editor: Option<ResMut<EditorSession>>,
    project: Option<Res<ProjectPath>>,
    state: Option<Res<State<SessionMode>>>,
    mut active: ResMut<ActiveScript>,
    mut requests: EventWriter<SessionRequest>,
) {
    let Some(watcher) = watcher else { return };

    // Saves often arrive as several modify events; only the newest text matters.
    let Some(FileWatchEvent::ScriptChanged(content)) =
        watcher.0.try_iter().take(MAX_EVENTS_PER_FRAME).last()
    else {
        return;
    };
    if project
        .as_ref()
        .and_then(|p| p.last_written.as_deref())
        .is_some_and(|written| written == content)
    {
        return;
    }

    let doc = match parse_script_source(&content) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("[Blockplay FileWatcher] Script reload failed: {e}");
            return;
        }
    };
    info!(
        "[Blockplay FileWatcher] Reloading script ({} blocks)",
        doc.block_count()
    );
    if let Some(editor) = editor.as_mut() {
        editor.load(&doc);
    }
    active.0 = Some(doc);

    if state.is_some_and(|s| *s.get() == SessionMode::Playing) {
        requests.send(SessionRequest::Restart);
    }
}
