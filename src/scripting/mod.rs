pub mod action;
pub mod runtime;
pub mod scheduler;
#[cfg(test)]
mod tests;

use std::sync::OnceLock;

use bevy::prelude::*;
use serde::Serialize;

use crate::blocks::ScriptDocument;
use crate::events::GameEventBus;
use crate::game_host::{GameContext, ObjectTable};

pub use runtime::{Overlay, ScriptHost, ScriptRuntime, SCORE_VAR};

pub const DEFAULT_LOOP_CEILING: u64 = 10_000;
pub const DEFAULT_LOOP_YIELD_INTERVAL: u64 = 100;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

const MAX_SCRIPT_FAULTS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeLimits {
    /// Hard cap on iterations of any single `repeat_n` / `repeat_while`.
    pub loop_ceiling: u64,
    /// Loops hand control back to the frame loop after this many iterations.
    pub loop_yield_interval: u64,
    /// Bound on nested `call_func` frames and synchronous watcher cascades.
    pub max_call_depth: usize,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            loop_ceiling: env_u64("BLOCKPLAY_LOOP_CEILING", DEFAULT_LOOP_CEILING).max(1),
            loop_yield_interval: env_u64(
                "BLOCKPLAY_LOOP_YIELD_INTERVAL",
                DEFAULT_LOOP_YIELD_INTERVAL,
            )
            .clamp(1, 1_000_000),
            max_call_depth: env_u64("BLOCKPLAY_MAX_CALL_DEPTH", DEFAULT_MAX_CALL_DEPTH as u64)
                .clamp(1, 1024) as usize,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub fn runtime_limits() -> &'static RuntimeLimits {
    static LIMITS: OnceLock<RuntimeLimits> = OnceLock::new();
    LIMITS.get_or_init(RuntimeLimits::default)
}

/// An action that failed at runtime. Execution continued past it.
#[derive(Serialize, Clone, Debug)]
pub struct ScriptFault {
    pub origin: String,
    pub action: &'static str,
    pub message: String,
    pub frame: u64,
}

#[derive(Default, Clone, Debug)]
pub struct ScriptFaults {
    pub entries: Vec<ScriptFault>,
    pub dropped: u64,
}

impl ScriptFaults {
    pub fn push(&mut self, entry: ScriptFault) {
        self.entries.push(entry);
        if self.entries.len() > MAX_SCRIPT_FAULTS {
            let excess = self.entries.len() - MAX_SCRIPT_FAULTS;
            self.entries.drain(0..excess);
            self.dropped = self.dropped.saturating_add(excess as u64);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The document the next play session runs.
#[derive(Resource, Default, Clone)]
pub struct ActiveScript(pub Option<ScriptDocument>);

#[derive(Serialize, Clone, Debug)]
pub struct ScriptStats {
    pub running: bool,
    pub frame: u64,
    pub seconds: f64,
    pub pending_tasks: usize,
    pub variables: Vec<(String, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
    pub faults: Vec<ScriptFault>,
}

impl ScriptRuntime {
    pub fn stats(&self) -> ScriptStats {
        ScriptStats {
            running: self.is_running(),
            frame: self.frame(),
            seconds: self.clock(),
            pending_tasks: self.pending_tasks(),
            variables: self.variables(),
            overlay: self.overlay().map(|o| o.text.clone()),
            faults: self.faults().entries.clone(),
        }
    }
}

pub struct ScriptingPlugin;

impl Plugin for ScriptingPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ScriptRuntime::default())
            .init_resource::<ActiveScript>()
            .init_resource::<GameContext>()
            .init_resource::<ObjectTable>()
            .init_resource::<GameEventBus>()
            .add_systems(
                Update,
                tick_script_runtime.run_if(crate::game_runtime::gameplay_systems_enabled),
            );
    }
}

fn tick_script_runtime(
    time: Res<Time>,
    mut runtime: ResMut<ScriptRuntime>,
    mut game: ResMut<GameContext>,
    mut objects: ResMut<ObjectTable>,
    mut events: ResMut<GameEventBus>,
) {
    let mut host = ScriptHost {
        game: &mut game,
        objects: &mut objects,
        events: &mut events,
    };
    runtime.update(time.delta_secs_f64(), &mut host);
}
