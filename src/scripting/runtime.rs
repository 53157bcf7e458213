use std::collections::{BTreeMap, HashMap};

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};

use super::action::{compile_list, Action, ActionList, CompareOp, Condition, Trigger};
use super::scheduler::{should_yield, Frame, StepOutcome, Task, TaskState, Wake};
use super::{runtime_limits, RuntimeLimits, ScriptFault, ScriptFaults};
use crate::blocks::ScriptDocument;
use crate::events::{GameEventBus, ScriptEvent};
use crate::game_host::{GameContext, ObjectId, ObjectTable};

/// Variable that mirrors the host score every frame.
pub const SCORE_VAR: &str = "score";

/// Mutable host state a script acts on for the duration of one call.
pub struct ScriptHost<'a> {
    pub game: &'a mut GameContext,
    pub objects: &'a mut ObjectTable,
    pub events: &'a mut GameEventBus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub text: String,
    pub remaining: f64,
}

/// Edge-triggered binding: fires on the false→true transition of its state.
struct EdgeBinding {
    origin: String,
    lists: Vec<ActionList>,
    active: bool,
}

impl EdgeBinding {
    fn new(origin: String) -> Self {
        Self {
            origin,
            lists: Vec::new(),
            active: false,
        }
    }
}

struct ScoreTrigger {
    origin: String,
    op: Option<CompareOp>,
    threshold: f64,
    actions: ActionList,
    fired: bool,
}

/// Interpreter state for one play session.
#[derive(Resource)]
pub struct ScriptRuntime {
    limits: RuntimeLimits,
    running: bool,
    clock: f64,
    frame: u64,
    variables: HashMap<String, f64>,
    functions: HashMap<String, ActionList>,
    touch_triggers: BTreeMap<ObjectId, EdgeBinding>,
    key_triggers: BTreeMap<String, EdgeBinding>,
    watchers: HashMap<String, Vec<ActionList>>,
    score_triggers: Vec<ScoreTrigger>,
    tasks: Vec<Task>,
    next_task_id: u64,
    cascade_depth: usize,
    overlay: Option<Overlay>,
    faults: ScriptFaults,
    rng: SmallRng,
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new(*runtime_limits(), SmallRng::from_entropy())
    }
}

impl ScriptRuntime {
    pub fn new(limits: RuntimeLimits, rng: SmallRng) -> Self {
        Self {
            limits,
            running: false,
            clock: 0.0,
            frame: 0,
            variables: HashMap::new(),
            functions: HashMap::new(),
            touch_triggers: BTreeMap::new(),
            key_triggers: BTreeMap::new(),
            watchers: HashMap::new(),
            score_triggers: Vec::new(),
            tasks: Vec::new(),
            next_task_id: 0,
            cascade_depth: 0,
            overlay: None,
            faults: ScriptFaults::default(),
            rng,
        }
    }

    pub fn with_seed(limits: RuntimeLimits, seed: u64) -> Self {
        Self::new(limits, SmallRng::seed_from_u64(seed))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn variable(&self, name: &str) -> Option<f64> {
        self.variables.get(name).copied()
    }

    /// Variables sorted by name.
    pub fn variables(&self) -> Vec<(String, f64)> {
        let mut out: Vec<_> = self.variables.iter().map(|(k, v)| (k.clone(), *v)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn faults(&self) -> &ScriptFaults {
        &self.faults
    }

    /// Suspended continuations, including timer triggers that have not started.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Loads `doc` and runs every immediate chain up to its first suspension.
    pub fn init(&mut self, doc: &ScriptDocument, host: &mut ScriptHost<'_>) {
        self.reset();
        self.faults = ScriptFaults::default();
        self.running = true;

        for name in &doc.variables {
            self.variables.insert(name.clone(), 0.0);
        }
        self.variables.insert(SCORE_VAR.to_string(), host.game.score);

        let classified: Vec<(Trigger, ActionList)> = doc
            .chains
            .iter()
            .filter_map(|chain| {
                let head = chain.blocks.first()?;
                match Trigger::classify(head) {
                    Some(trigger) => Some((trigger, compile_list(&chain.blocks[1..]))),
                    None => {
                        debug!(
                            "[Blockplay script] Ignoring chain {} headed by '{}'",
                            chain.id, head.block_type
                        );
                        None
                    }
                }
            })
            .collect();

        // Functions register first so any chain may call any function.
        for (trigger, actions) in &classified {
            if let Trigger::Function(name) = trigger {
                if self.functions.insert(name.clone(), actions.clone()).is_some() {
                    warn!(
                        "[Blockplay script] Function '{}' defined more than once; last definition wins",
                        name
                    );
                }
            }
        }

        let mut immediate = Vec::new();
        for (trigger, actions) in classified {
            let origin = trigger.label();
            match trigger {
                Trigger::Start => immediate.push((origin, actions)),
                Trigger::Timer(delay) => {
                    let id = self.alloc_task_id();
                    let mut task = Task::new(id, origin, actions);
                    task.wake = Some(Wake::AtTime(self.clock + delay));
                    self.tasks.push(task);
                }
                Trigger::Touch(object) => self
                    .touch_triggers
                    .entry(object)
                    .or_insert_with(|| EdgeBinding::new(origin))
                    .lists
                    .push(actions),
                Trigger::Key(key) => self
                    .key_triggers
                    .entry(key)
                    .or_insert_with(|| EdgeBinding::new(origin))
                    .lists
                    .push(actions),
                Trigger::VariableChanged(var) => {
                    self.watchers.entry(var).or_default().push(actions)
                }
                Trigger::Score { op, threshold } => self.score_triggers.push(ScoreTrigger {
                    origin,
                    op,
                    threshold,
                    actions,
                    fired: false,
                }),
                Trigger::Function(_) => {}
            }
        }

        info!(
            "[Blockplay script] Session started: {} chains, {} variables, {} functions, {} timers",
            doc.chains.len(),
            doc.variables.len(),
            self.functions.len(),
            self.tasks.len()
        );

        for (origin, actions) in immediate {
            self.spawn(origin, actions, host);
        }
    }

    /// Advances the session by one host frame.
    pub fn update(&mut self, dt: f64, host: &mut ScriptHost<'_>) {
        if !self.running {
            return;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.frame = self.frame.saturating_add(1);
        self.clock += dt;

        if let Some(overlay) = self.overlay.as_mut() {
            overlay.remaining -= dt;
            if overlay.remaining <= 0.0 {
                self.overlay = None;
            }
        }

        self.variables.insert(SCORE_VAR.to_string(), host.game.score);

        let score = host.game.score;
        let mut fired = Vec::new();
        for trigger in self.score_triggers.iter_mut() {
            if !trigger.fired && trigger.op.map_or(false, |op| op.eval(score, trigger.threshold)) {
                trigger.fired = true;
                fired.push((trigger.origin.clone(), trigger.actions.clone()));
            }
        }
        self.fire_all(fired, host);

        let player = host.game.player;
        let mut fired = Vec::new();
        for (object, binding) in self.touch_triggers.iter_mut() {
            let touching = host
                .objects
                .get(object)
                .map_or(false, |o| o.aabb().overlaps(&player));
            if touching && !binding.active {
                fired.extend(binding.lists.iter().map(|l| (binding.origin.clone(), l.clone())));
            }
            binding.active = touching;
        }
        self.fire_all(fired, host);

        let mut fired = Vec::new();
        for (key, binding) in self.key_triggers.iter_mut() {
            let down = host.game.is_key_down(key);
            if down && !binding.active {
                fired.extend(binding.lists.iter().map(|l| (binding.origin.clone(), l.clone())));
            }
            binding.active = down;
        }
        self.fire_all(fired, host);

        self.resume_due(host);
    }

    /// Ends the session: cancels every pending continuation and timer and
    /// drops all registrations.
    pub fn destroy(&mut self) {
        if !self.running && self.tasks.is_empty() {
            return;
        }
        let cancelled = self.tasks.len();
        self.reset();
        info!(
            "[Blockplay script] Session stopped ({} pending tasks cancelled)",
            cancelled
        );
    }

    fn reset(&mut self) {
        self.running = false;
        self.clock = 0.0;
        self.frame = 0;
        self.tasks.clear();
        self.variables.clear();
        self.functions.clear();
        self.touch_triggers.clear();
        self.key_triggers.clear();
        self.watchers.clear();
        self.score_triggers.clear();
        self.cascade_depth = 0;
        self.overlay = None;
    }

    fn alloc_task_id(&mut self) -> u64 {
        self.next_task_id = self.next_task_id.saturating_add(1);
        self.next_task_id
    }

    fn fire_all(&mut self, fired: Vec<(String, ActionList)>, host: &mut ScriptHost<'_>) {
        for (origin, actions) in fired {
            debug!("[Blockplay script] Trigger {} fired", origin);
            host.events.emit(ScriptEvent::TriggerFired {
                trigger: origin.clone(),
            });
            self.spawn(origin, actions, host);
        }
    }

    fn spawn(&mut self, origin: String, actions: ActionList, host: &mut ScriptHost<'_>) {
        let id = self.alloc_task_id();
        let mut task = Task::new(id, origin, actions);
        if let TaskState::Suspended = self.run_task(&mut task, host) {
            self.tasks.push(task);
        }
    }

    fn resume_due(&mut self, host: &mut ScriptHost<'_>) {
        let pending = std::mem::take(&mut self.tasks);
        let mut kept = Vec::with_capacity(pending.len());
        for mut task in pending {
            if !task.is_due(self.clock, self.frame) {
                kept.push(task);
                continue;
            }
            if let TaskState::Suspended = self.run_task(&mut task, host) {
                kept.push(task);
            }
        }
        kept.append(&mut self.tasks);
        kept.sort_by_key(|t| t.id);
        self.tasks = kept;
    }

    fn run_task(&mut self, task: &mut Task, host: &mut ScriptHost<'_>) -> TaskState {
        task.wake = None;
        loop {
            if !self.running {
                task.frames.clear();
                return TaskState::Finished;
            }
            let Some(frame) = task.frames.last_mut() else {
                return TaskState::Finished;
            };
            match frame {
                Frame::Sequence { actions, pc, .. } => {
                    if *pc >= actions.len() {
                        task.frames.pop();
                        continue;
                    }
                    let list = actions.clone();
                    let index = *pc;
                    *pc += 1;
                    if let StepOutcome::Suspend(wake) = self.step(&list[index], task, host) {
                        task.wake = Some(wake);
                        return TaskState::Suspended;
                    }
                }
                Frame::Repeat {
                    body,
                    times,
                    done,
                    yielded_at,
                } => {
                    if *done >= *times {
                        task.frames.pop();
                        continue;
                    }
                    if should_yield(*done, yielded_at, self.limits.loop_yield_interval) {
                        task.wake = Some(Wake::AtFrame(self.frame + 1));
                        return TaskState::Suspended;
                    }
                    *done += 1;
                    let body = body.clone();
                    task.frames.push(Frame::sequence(body));
                }
                Frame::RepeatWhile {
                    cond,
                    body,
                    done,
                    yielded_at,
                } => {
                    if *done >= self.limits.loop_ceiling || !self.condition_holds(cond) {
                        task.frames.pop();
                        continue;
                    }
                    if should_yield(*done, yielded_at, self.limits.loop_yield_interval) {
                        task.wake = Some(Wake::AtFrame(self.frame + 1));
                        return TaskState::Suspended;
                    }
                    *done += 1;
                    let body = body.clone();
                    task.frames.push(Frame::sequence(body));
                }
            }
        }
    }

    fn step(&mut self, action: &Action, task: &mut Task, host: &mut ScriptHost<'_>) -> StepOutcome {
        match action {
            Action::Wait(seconds) => {
                return StepOutcome::Suspend(Wake::AtTime(self.clock + seconds));
            }
            Action::CallFunction(name) => {
                let Some(body) = self.functions.get(name).cloned() else {
                    return StepOutcome::Continue;
                };
                if task.call_depth() >= self.limits.max_call_depth {
                    self.record_fault(
                        &task.origin,
                        action,
                        format!("call depth limit reached calling '{}'", name),
                    );
                    return StepOutcome::Continue;
                }
                task.frames.push(Frame::Sequence {
                    actions: body,
                    pc: 0,
                    call: true,
                });
            }
            Action::If { cond, then } => {
                if self.condition_holds(cond) {
                    task.frames.push(Frame::sequence(then.clone()));
                }
            }
            Action::IfElse {
                cond,
                then,
                otherwise,
            } => {
                let branch = if self.condition_holds(cond) { then } else { otherwise };
                task.frames.push(Frame::sequence(branch.clone()));
            }
            Action::IfRandom { chance, then } => {
                let sample: f64 = self.rng.gen();
                if sample < chance / 100.0 {
                    task.frames.push(Frame::sequence(then.clone()));
                }
            }
            Action::Repeat { times, body } => task.frames.push(Frame::Repeat {
                body: body.clone(),
                times: (*times).min(self.limits.loop_ceiling),
                done: 0,
                yielded_at: 0,
            }),
            Action::RepeatWhile { cond, body } => task.frames.push(Frame::RepeatWhile {
                cond: cond.clone(),
                body: body.clone(),
                done: 0,
                yielded_at: 0,
            }),
            other => {
                if let Err(message) = self.apply(other, &task.origin, host) {
                    self.record_fault(&task.origin, other, message);
                }
            }
        }
        StepOutcome::Continue
    }

    /// Effects that complete synchronously. Unknown object ids are a silent no-op.
    fn apply(
        &mut self,
        action: &Action,
        origin: &str,
        host: &mut ScriptHost<'_>,
    ) -> Result<(), String> {
        match action {
            Action::MoveObject { object, dx, dy } => {
                if let Some(obj) = host.objects.get_mut(object) {
                    obj.x += *dx as f32;
                    obj.y += *dy as f32;
                }
            }
            Action::Teleport { object, x, y } => {
                if let Some(obj) = host.objects.get_mut(object) {
                    obj.x = *x as f32;
                    obj.y = *y as f32;
                }
            }
            Action::SetVisible { object, visible } => {
                if let Some(obj) = host.objects.get_mut(object) {
                    obj.visible = *visible;
                }
            }
            Action::Destroy { object } => {
                if host.objects.remove(object).is_some() {
                    let slot = host.game.untrack(object);
                    host.events.emit(ScriptEvent::ObjectDestroyed {
                        id: object.clone(),
                        tracked: slot,
                    });
                }
            }
            Action::SetColor { object, color } => {
                if let Some(obj) = host.objects.get_mut(object) {
                    let parsed = Srgba::hex(color)
                        .map_err(|e| format!("invalid color '{}': {:?}", color, e))?;
                    obj.color = Color::Srgba(parsed);
                }
            }
            Action::SetVar { var, value } => {
                if !var.is_empty() {
                    self.write_var(var, *value, origin, host);
                }
            }
            Action::ChangeVar { var, delta } => {
                if !var.is_empty() {
                    let current = self.variables.get(var).copied().unwrap_or(0.0);
                    self.write_var(var, current + delta, origin, host);
                }
            }
            Action::AddScore(amount) => {
                host.game.score += amount;
                self.variables.insert(SCORE_VAR.to_string(), host.game.score);
            }
            Action::SetScore(value) => {
                host.game.score = *value;
                self.variables.insert(SCORE_VAR.to_string(), host.game.score);
            }
            Action::ShowMessage { text, seconds } => {
                self.overlay = Some(Overlay {
                    text: text.clone(),
                    remaining: *seconds,
                });
                host.events.emit(ScriptEvent::Message { text: text.clone() });
            }
            Action::EndGame => {
                host.game.end_game();
                host.events.emit(ScriptEvent::GameEnded {
                    trigger: origin.to_string(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn write_var(&mut self, name: &str, value: f64, origin: &str, host: &mut ScriptHost<'_>) {
        self.variables.insert(name.to_string(), value);
        if name == SCORE_VAR {
            host.game.score = value;
        }

        let Some(lists) = self.watchers.get(name).cloned() else {
            return;
        };
        if self.cascade_depth >= self.limits.max_call_depth {
            let message = format!("watcher cascade limit reached on '{}'", name);
            warn!("[Blockplay script] {}: {}", origin, message);
            self.faults.push(ScriptFault {
                origin: origin.to_string(),
                action: "set_var",
                message,
                frame: self.frame,
            });
            return;
        }
        self.cascade_depth += 1;
        for actions in lists {
            self.spawn(format!("on_var_change({})", name), actions, host);
        }
        self.cascade_depth -= 1;
    }

    fn condition_holds(&self, cond: &Condition) -> bool {
        cond.holds(self.variables.get(&cond.var).copied().unwrap_or(0.0))
    }

    fn record_fault(&mut self, origin: &str, action: &Action, message: String) {
        warn!(
            "[Blockplay script] {} in {} failed: {}",
            action.name(),
            origin,
            message
        );
        self.faults.push(ScriptFault {
            origin: origin.to_string(),
            action: action.name(),
            message,
            frame: self.frame,
        });
    }
}
