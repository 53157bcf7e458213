use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::blocks::ScriptDocument;
use crate::editor::EditorSession;

pub const PROJECT_VERSION: u32 = 1;

/// On-disk wrapper around a script document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectFile {
    pub version: u32,
    pub document: ScriptDocument,
}

impl ProjectFile {
    pub fn new(document: ScriptDocument) -> Self {
        Self {
            version: PROJECT_VERSION,
            document,
        }
    }
}

/// Accepts either a `ProjectFile` or a bare `ScriptDocument`.
pub fn parse_script_source(source: &str) -> Result<ScriptDocument, String> {
    let value: serde_json::Value =
        serde_json::from_str(source).map_err(|e| format!("Invalid JSON: {}", e))?;
    if !value.is_object() {
        return Err("Script file must contain a JSON object".to_string());
    }
    if value.get("document").is_some() {
        let project: ProjectFile = serde_json::from_value(value)
            .map_err(|e| format!("Invalid project file: {}", e))?;
        if project.version > PROJECT_VERSION {
            return Err(format!(
                "Project version {} is newer than supported version {}",
                project.version, PROJECT_VERSION
            ));
        }
        return Ok(project.document);
    }
    serde_json::from_value(value).map_err(|e| format!("Invalid script document: {}", e))
}

pub fn load_project(path: &Path) -> Result<ScriptDocument, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_script_source(&source)
}

/// Writes `doc` as a pretty-printed `ProjectFile` and returns the written text.
pub fn save_project(path: &Path, doc: &ScriptDocument) -> Result<String, String> {
    let text = serde_json::to_string_pretty(&ProjectFile::new(doc.clone()))
        .map_err(|e| format!("Failed to encode project: {}", e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    std::fs::write(path, &text)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(text)
}

/// Where the editor's document is saved, and the last text written there so
/// the file watcher can ignore our own writes.
#[derive(Resource, Clone, Debug, Default)]
pub struct ProjectPath {
    pub path: Option<PathBuf>,
    pub last_written: Option<String>,
}

pub struct PersistencePlugin {
    pub path: Option<PathBuf>,
}

impl Plugin for PersistencePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ProjectPath {
            path: self.path.clone(),
            last_written: None,
        })
        .add_systems(
            Update,
            save_on_shortcut
                .run_if(resource_exists::<ButtonInput<KeyCode>>)
                .run_if(resource_exists::<EditorSession>),
        );
    }
}

fn save_on_shortcut(
    keyboard: Res<ButtonInput<KeyCode>>,
    editor: Res<EditorSession>,
    mut project: ResMut<ProjectPath>,
) {
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    if !(ctrl && keyboard.just_pressed(KeyCode::KeyS)) {
        return;
    }
    let Some(path) = project.path.clone() else {
        warn!("[Blockplay persistence] No script path configured; nothing saved");
        return;
    };
    match save_project(&path, &editor.serialize()) {
        Ok(text) => {
            project.last_written = Some(text);
            info!("[Blockplay persistence] Saved {}", path.display());
        }
        Err(e) => warn!("[Blockplay persistence] {}", e),
    }
}
