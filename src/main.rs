#![cfg_attr(target_arch = "wasm32", allow(dead_code))]

mod blocks;
mod config;
mod editor;
mod events;
#[cfg(not(target_arch = "wasm32"))]
mod file_watcher;
mod game_host;
mod game_runtime;
mod input;
mod persistence;
mod render;
mod scripting;

use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;

use config::{SceneConfig, StartupConfig};
use game_host::{GameContext, ObjectTable};
use game_runtime::{SessionInfo, SessionMode, SessionRequest};
use scripting::{ActiveScript, ScriptRuntime};

const HEADLESS_HZ: f64 = 60.0;
const DEFAULT_HEADLESS_FRAMES: u64 = 600;
const PLAYER_SPEED: f32 = 180.0;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");
    let startup_config = config::load_startup_config();
    let script_path = arg_value(&args, "--script")
        .map(str::to_string)
        .or_else(|| startup_config.script.clone())
        .map(PathBuf::from);

    if headless {
        let frames = arg_value(&args, "--frames")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HEADLESS_FRAMES);
        let seed = arg_value(&args, "--seed").and_then(|v| v.parse::<u64>().ok());
        if let Err(e) = run_headless(script_path.as_deref(), frames, seed, &startup_config) {
            eprintln!("[Blockplay] {}", e);
            std::process::exit(2);
        }
        return;
    }

    run_windowed(startup_config, script_path);
}

fn run_windowed(startup_config: StartupConfig, script_path: Option<PathBuf>) {
    let window_title = startup_config
        .window_title
        .clone()
        .unwrap_or_else(|| "Blockplay".to_string());
    let window_width = startup_config.window_width.unwrap_or(1280.0);
    let window_height = startup_config.window_height.unwrap_or(720.0);

    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: window_title,
            resolution: (window_width, window_height).into(),
            present_mode: bevy::window::PresentMode::AutoVsync,
            ..default()
        }),
        ..default()
    }));
    let bg = startup_config.background_color.unwrap_or([0.1, 0.11, 0.14]);
    app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])))
        .insert_resource(startup_config.scene.clone())
        .add_plugins(input::InputPlugin)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(scripting::ScriptingPlugin)
        .add_plugins(editor::EditorPlugin)
        .add_plugins(game_runtime::SessionFlowPlugin)
        .add_plugins(persistence::PersistencePlugin {
            path: script_path.clone(),
        })
        .add_plugins(render::RenderPlugin)
        .add_systems(Startup, reset_scene)
        .add_systems(OnExit(SessionMode::Playing), reset_scene)
        .add_systems(
            Update,
            steer_player.run_if(game_runtime::gameplay_systems_enabled),
        );

    if let Some(path) = script_path.as_deref() {
        match persistence::load_project(path) {
            Ok(doc) => {
                println!("[Blockplay] Loaded script {}", path.display());
                app.world_mut()
                    .resource_mut::<editor::EditorSession>()
                    .load(&doc);
            }
            Err(e) => eprintln!("[Blockplay] {}", e),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    if startup_config.watch {
        if let Some(path) = script_path {
            app.add_plugins(file_watcher::FileWatcherPlugin { path });
        }
    }

    println!("[Blockplay] Starting editor");
    app.run();
}

fn reset_scene(
    scene: Res<SceneConfig>,
    mut game: ResMut<GameContext>,
    mut objects: ResMut<ObjectTable>,
) {
    config::apply_scene(&scene, &mut game, &mut objects);
}

fn steer_player(time: Res<Time>, mut game: ResMut<GameContext>) {
    let step = PLAYER_SPEED * time.delta_secs();
    let mut delta = Vec2::ZERO;
    for (keys, dir) in [
        (["left", "a"], Vec2::NEG_X),
        (["right", "d"], Vec2::X),
        (["up", "w"], Vec2::NEG_Y),
        (["down", "s"], Vec2::Y),
    ] {
        if keys.iter().any(|k| game.is_key_down(k)) {
            delta += dir;
        }
    }
    if delta != Vec2::ZERO {
        let delta = delta.normalize() * step;
        game.player.x += delta.x;
        game.player.y += delta.y;
    }
}

/// Runs a script document without a window at a fixed 60 Hz and prints the
/// final runtime state as JSON.
fn run_headless(
    script: Option<&Path>,
    frames: u64,
    seed: Option<u64>,
    startup_config: &StartupConfig,
) -> Result<(), String> {
    let path = script.ok_or_else(|| "--headless needs --script <file>".to_string())?;
    let doc = persistence::load_project(path)?;
    println!(
        "[Blockplay] Starting in HEADLESS mode: {} ({} blocks, {} frames)",
        path.display(),
        doc.block_count(),
        frames
    );

    let mut game = GameContext::default();
    let mut objects = ObjectTable::default();
    config::apply_scene(&startup_config.scene, &mut game, &mut objects);

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(bevy::state::app::StatesPlugin)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / HEADLESS_HZ,
        )))
        .insert_resource(ActiveScript(Some(doc)))
        .insert_resource(game)
        .insert_resource(objects)
        .add_plugins(events::GameEventsPlugin)
        .add_plugins(scripting::ScriptingPlugin)
        .add_plugins(game_runtime::SessionFlowPlugin);
    if let Some(seed) = seed {
        app.insert_resource(ScriptRuntime::with_seed(*scripting::runtime_limits(), seed));
    }

    app.world_mut().send_event(SessionRequest::Play);
    // One extra update: the play request is applied on the first one.
    let mut last_stats = None;
    for _ in 0..=frames {
        app.update();
        let runtime = app.world().resource::<ScriptRuntime>();
        if runtime.is_running() {
            last_stats = Some(runtime.stats());
        }
    }

    let world = app.world();
    let stats = last_stats.unwrap_or_else(|| world.resource::<ScriptRuntime>().stats());
    let mode = *world.resource::<State<SessionMode>>().get();
    let report = serde_json::json!({
        "session": world.resource::<SessionInfo>().snapshot(mode),
        "score": world.resource::<GameContext>().score,
        "events": world.resource::<events::GameEventBus>().summary(),
        "runtime": stats,
    });
    let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
