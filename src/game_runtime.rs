use bevy::prelude::*;
use bevy::utils::Instant;
use serde::Serialize;

use crate::blocks::ScriptDocument;
use crate::editor::EditorSession;
use crate::events::GameEventBus;
use crate::game_host::{GameContext, ObjectTable};
use crate::scripting::{ActiveScript, ScriptHost, ScriptRuntime};

#[derive(States, Default, Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize)]
pub enum SessionMode {
    #[default]
    Editing,
    Playing,
    GameOver,
}

/// Host-side requests to start or stop a play session (toolbar buttons,
/// hot reload, keyboard shortcut).
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionRequest {
    Play,
    Stop,
    Restart,
}

#[derive(Resource, Clone)]
pub struct SessionInfo {
    pub plays: u64,
    entered_at: Instant,
    restart_pending: bool,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            plays: 0,
            entered_at: Instant::now(),
            restart_pending: false,
        }
    }
}

#[derive(Serialize, Clone)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub plays: u64,
    pub time_in_mode_seconds: f32,
}

impl SessionInfo {
    pub fn snapshot(&self, mode: SessionMode) -> SessionSnapshot {
        SessionSnapshot {
            mode,
            plays: self.plays,
            time_in_mode_seconds: self.entered_at.elapsed().as_secs_f32(),
        }
    }
}

pub fn gameplay_systems_enabled(state: Option<Res<State<SessionMode>>>) -> bool {
    state
        .map(|s| *s.get() == SessionMode::Playing)
        .unwrap_or(false)
}

/// True while the canvas accepts edits. Without a session flow the editor is
/// always live.
pub fn editing_enabled(state: Option<Res<State<SessionMode>>>) -> bool {
    state
        .map(|s| *s.get() == SessionMode::Editing)
        .unwrap_or(true)
}

fn start_session(
    editor: Option<Res<EditorSession>>,
    mut active: ResMut<ActiveScript>,
    mut runtime: ResMut<ScriptRuntime>,
    mut game: ResMut<GameContext>,
    mut objects: ResMut<ObjectTable>,
    mut events: ResMut<GameEventBus>,
    mut info: ResMut<SessionInfo>,
) {
    let doc: ScriptDocument = match editor {
        Some(editor) => editor.serialize(),
        None => active.0.clone().unwrap_or_default(),
    };
    game.ended = false;
    let mut host = ScriptHost {
        game: &mut game,
        objects: &mut objects,
        events: &mut events,
    };
    runtime.init(&doc, &mut host);
    active.0 = Some(doc);
    info.plays = info.plays.saturating_add(1);
    info.entered_at = Instant::now();
    info!("[Blockplay session] Play session #{} started", info.plays);
}

fn stop_session(mut runtime: ResMut<ScriptRuntime>, mut info: ResMut<SessionInfo>) {
    runtime.destroy();
    info.entered_at = Instant::now();
    info!("[Blockplay session] Play session stopped");
}

fn finish_on_game_end(game: Res<GameContext>, mut next: ResMut<NextState<SessionMode>>) {
    if game.ended {
        info!("[Blockplay session] Game ended");
        next.set(SessionMode::GameOver);
    }
}

fn apply_session_requests(
    mut requests: EventReader<SessionRequest>,
    state: Res<State<SessionMode>>,
    mut next: ResMut<NextState<SessionMode>>,
    mut info: ResMut<SessionInfo>,
) {
    for request in requests.read() {
        match (request, state.get()) {
            (SessionRequest::Play, SessionMode::Editing | SessionMode::GameOver) => {
                next.set(SessionMode::Playing);
            }
            (SessionRequest::Stop, SessionMode::Playing | SessionMode::GameOver) => {
                next.set(SessionMode::Editing);
            }
            (SessionRequest::Restart, SessionMode::Playing) => {
                // Leave for one frame so OnExit/OnEnter both run.
                info.restart_pending = true;
                next.set(SessionMode::Editing);
            }
            (SessionRequest::Restart, _) => next.set(SessionMode::Playing),
            _ => {}
        }
    }
}

fn resume_pending_restart(
    mut info: ResMut<SessionInfo>,
    mut next: ResMut<NextState<SessionMode>>,
) {
    if info.restart_pending {
        info.restart_pending = false;
        next.set(SessionMode::Playing);
    }
}

fn keyboard_session_toggle(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<SessionMode>>,
    mut requests: EventWriter<SessionRequest>,
) {
    if keyboard.just_pressed(KeyCode::F5) {
        requests.send(match state.get() {
            SessionMode::Editing => SessionRequest::Play,
            SessionMode::Playing | SessionMode::GameOver => SessionRequest::Stop,
        });
    }
}

pub struct SessionFlowPlugin;

impl Plugin for SessionFlowPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionInfo>()
            .init_resource::<ActiveScript>()
            .add_event::<SessionRequest>()
            .init_state::<SessionMode>()
            .add_systems(OnEnter(SessionMode::Playing), start_session)
            .add_systems(OnExit(SessionMode::Playing), stop_session)
            .add_systems(OnEnter(SessionMode::Editing), resume_pending_restart)
            .add_systems(
                Update,
                (
                    keyboard_session_toggle.run_if(resource_exists::<ButtonInput<KeyCode>>),
                    apply_session_requests,
                    finish_on_game_end.run_if(in_state(SessionMode::Playing)),
                )
                    .chain(),
            );
    }
}
