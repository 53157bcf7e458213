use bevy::prelude::*;
use serde::Deserialize;

use crate::game_host::{Aabb, GameContext, GameObject, ObjectTable, TrackedCollection};

/// Contents of `blockplay.json` (or `$BLOCKPLAY_CONFIG`). Every field is optional.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct StartupConfig {
    pub window_title: Option<String>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub background_color: Option<[f32; 3]>,
    /// Script document loaded into the editor at startup and saved by Ctrl+S.
    pub script: Option<String>,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub scene: SceneConfig,
}

/// Objects the host game exposes to scripts.
#[derive(Resource, Deserialize, Default, Clone, Debug)]
pub struct SceneConfig {
    #[serde(default)]
    pub player: Option<[f32; 4]>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SceneObject {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_size")]
    pub width: f32,
    #[serde(default = "default_size")]
    pub height: f32,
    #[serde(default)]
    pub color: Option<String>,
    /// platform, hazard, collectible, enemy, bounce_pad, checkpoint or goal.
    #[serde(default)]
    pub role: Option<String>,
}

fn default_size() -> f32 {
    32.0
}

pub fn config_path() -> String {
    std::env::var("BLOCKPLAY_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "blockplay.json".to_string())
}

pub fn parse_startup_config(contents: &str) -> Result<StartupConfig, String> {
    serde_json::from_str::<StartupConfig>(contents).map_err(|e| e.to_string())
}

pub fn load_startup_config() -> StartupConfig {
    let path = config_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => match parse_startup_config(&contents) {
            Ok(cfg) => {
                println!("[Blockplay] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Blockplay] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

fn role_collection(role: &str) -> Option<TrackedCollection> {
    match role.trim().to_ascii_lowercase().as_str() {
        "platform" => Some(TrackedCollection::Platforms),
        "hazard" => Some(TrackedCollection::Hazards),
        "collectible" => Some(TrackedCollection::Collectibles),
        "enemy" => Some(TrackedCollection::Enemies),
        "bounce_pad" | "bouncepad" => Some(TrackedCollection::BouncePads),
        "checkpoint" => Some(TrackedCollection::Checkpoints),
        _ => None,
    }
}

/// Replaces the host's objects, collections and player box with the scene's.
pub fn apply_scene(scene: &SceneConfig, game: &mut GameContext, objects: &mut ObjectTable) {
    for id in objects.ids() {
        objects.remove(&id);
    }
    for which in TrackedCollection::ORDER {
        game.collection_mut(which).clear();
    }
    game.goal = None;
    game.ended = false;
    game.score = 0.0;
    if let Some([x, y, w, h]) = scene.player {
        game.player = Aabb::new(x, y, w, h);
    }

    for obj in &scene.objects {
        let mut object = GameObject::new(obj.x, obj.y, obj.width, obj.height);
        if let Some(hex) = obj.color.as_deref() {
            match Srgba::hex(hex) {
                Ok(c) => object.color = Color::Srgba(c),
                Err(_) => warn!("[Blockplay] Object '{}' has invalid color '{}'", obj.id, hex),
            }
        }
        match obj.role.as_deref() {
            Some(role) if role.eq_ignore_ascii_case("goal") => game.goal = Some(obj.id.clone()),
            Some(role) => match role_collection(role) {
                Some(which) => game.collection_mut(which).push(obj.id.clone()),
                None => warn!("[Blockplay] Object '{}' has unknown role '{}'", obj.id, role),
            },
            None => {}
        }
        objects.insert(obj.id.clone(), object);
    }
}
