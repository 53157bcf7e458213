use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
use serde::Serialize;

pub type ObjectId = String;

/// Axis-aligned box in world units, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Touching edges do not count as overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }
}

/// A live, script-addressable object owned by the host game.
#[derive(Clone, Debug, PartialEq)]
pub struct GameObject {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
    pub color: Color,
}

impl GameObject {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            visible: true,
            color: Color::WHITE,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }
}

/// Host-maintained id → object lookup. Scripts may remove entries but never add them.
#[derive(Resource, Default, Clone, Debug)]
pub struct ObjectTable {
    objects: HashMap<ObjectId, GameObject>,
}

impl ObjectTable {
    pub fn insert(&mut self, id: impl Into<ObjectId>, object: GameObject) {
        self.objects.insert(id.into(), object);
    }

    pub fn get(&self, id: &str) -> Option<&GameObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<GameObject> {
        self.objects.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Sorted ids, for populating object pickers.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedCollection {
    Platforms,
    Hazards,
    Collectibles,
    Enemies,
    BouncePads,
    Checkpoints,
}

impl TrackedCollection {
    /// Scan order used when an object is destroyed.
    pub const ORDER: [TrackedCollection; 6] = [
        Self::Platforms,
        Self::Hazards,
        Self::Collectibles,
        Self::Enemies,
        Self::BouncePads,
        Self::Checkpoints,
    ];
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedSlot {
    Collection(TrackedCollection),
    Goal,
}

/// The game state a running script reads and mutates.
#[derive(Resource, Default, Clone, Debug)]
pub struct GameContext {
    pub score: f64,
    pub player: Aabb,
    /// Normalized names of the keys currently held down.
    pub keys: HashSet<String>,
    pub ended: bool,
    pub platforms: Vec<ObjectId>,
    pub hazards: Vec<ObjectId>,
    pub collectibles: Vec<ObjectId>,
    pub enemies: Vec<ObjectId>,
    pub bounce_pads: Vec<ObjectId>,
    pub checkpoints: Vec<ObjectId>,
    pub goal: Option<ObjectId>,
}

impl GameContext {
    pub fn end_game(&mut self) {
        self.ended = true;
    }

    pub fn collection(&self, which: TrackedCollection) -> &Vec<ObjectId> {
        match which {
            TrackedCollection::Platforms => &self.platforms,
            TrackedCollection::Hazards => &self.hazards,
            TrackedCollection::Collectibles => &self.collectibles,
            TrackedCollection::Enemies => &self.enemies,
            TrackedCollection::BouncePads => &self.bounce_pads,
            TrackedCollection::Checkpoints => &self.checkpoints,
        }
    }

    pub fn collection_mut(&mut self, which: TrackedCollection) -> &mut Vec<ObjectId> {
        match which {
            TrackedCollection::Platforms => &mut self.platforms,
            TrackedCollection::Hazards => &mut self.hazards,
            TrackedCollection::Collectibles => &mut self.collectibles,
            TrackedCollection::Enemies => &mut self.enemies,
            TrackedCollection::BouncePads => &mut self.bounce_pads,
            TrackedCollection::Checkpoints => &mut self.checkpoints,
        }
    }

    /// Removes `id` from the first tracked collection holding it, falling back
    /// to the goal reference. Returns where it was found.
    pub fn untrack(&mut self, id: &str) -> Option<TrackedSlot> {
        for which in TrackedCollection::ORDER {
            let list = self.collection_mut(which);
            if let Some(pos) = list.iter().position(|o| o == id) {
                list.remove(pos);
                return Some(TrackedSlot::Collection(which));
            }
        }
        if self.goal.as_deref() == Some(id) {
            self.goal = None;
            return Some(TrackedSlot::Goal);
        }
        None
    }

    pub fn press_key(&mut self, raw: &str) {
        self.keys.insert(normalize_key(raw));
    }

    pub fn release_key(&mut self, raw: &str) {
        self.keys.remove(&normalize_key(raw));
    }

    pub fn is_key_down(&self, normalized: &str) -> bool {
        self.keys.contains(normalized)
    }
}

/// Canonical key name: lowercase, arrows without the `arrow` prefix, and
/// the space bar as `space`.
pub fn normalize_key(raw: &str) -> String {
    if raw == " " {
        return "space".to_string();
    }
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "spacebar" | "space" => "space".to_string(),
        "return" => "enter".to_string(),
        other => other
            .strip_prefix("arrow")
            .filter(|rest| !rest.is_empty())
            .unwrap_or(other)
            .to_string(),
    }
}
