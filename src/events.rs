use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::*;
use serde::Serialize;

use crate::game_host::{ObjectId, TrackedSlot};

const MAX_EVENTS: usize = 500;

/// Something a running script did that the host may want to react to
/// (sound cues, particle bursts, UI toasts).
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptEvent {
    TriggerFired { trigger: String },
    ObjectDestroyed {
        id: ObjectId,
        tracked: Option<TrackedSlot>,
    },
    Message { text: String },
    GameEnded { trigger: String },
}

impl ScriptEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TriggerFired { .. } => "trigger_fired",
            Self::ObjectDestroyed { .. } => "object_destroyed",
            Self::Message { .. } => "message",
            Self::GameEnded { .. } => "game_ended",
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    #[serde(flatten)]
    pub event: ScriptEvent,
    pub frame: u64,
}

#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(&mut self, event: ScriptEvent) {
        self.recent.push_back(GameEvent {
            event,
            frame: self.frame,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Blockplay events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn count(&self, kind: &str) -> usize {
        self.recent.iter().filter(|e| e.event.kind() == kind).count()
    }

    /// Buffered events per kind, for reports.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for e in &self.recent {
            *out.entry(e.event.kind()).or_insert(0) += 1;
        }
        out
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default()).add_systems(
            Update,
            tick_event_frame.run_if(crate::game_runtime::gameplay_systems_enabled),
        );
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}
