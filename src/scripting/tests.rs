use super::*;
use crate::blocks::{BlockNode, ChainNode};
use crate::game_host::{Aabb, GameObject};

fn test_limits() -> RuntimeLimits {
    RuntimeLimits {
        loop_ceiling: 1_000,
        loop_yield_interval: 100,
        max_call_depth: 8,
    }
}

fn chain(blocks: Vec<BlockNode>) -> ChainNode {
    ChainNode {
        id: 0,
        x: 0.0,
        y: 0.0,
        blocks,
    }
}

fn document(variables: &[&str], chains: Vec<ChainNode>) -> ScriptDocument {
    ScriptDocument {
        chains,
        variables: variables.iter().map(|v| v.to_string()).collect(),
    }
}

fn set_var(var: &str, value: f64) -> BlockNode {
    BlockNode::new("set_var").with("var", var).with("value", value)
}

fn change_var(var: &str, delta: f64) -> BlockNode {
    BlockNode::new("change_var").with("var", var).with("delta", delta)
}

struct Harness {
    runtime: ScriptRuntime,
    game: GameContext,
    objects: ObjectTable,
    events: GameEventBus,
}

impl Harness {
    fn new() -> Self {
        Self {
            runtime: ScriptRuntime::with_seed(test_limits(), 7),
            game: GameContext::default(),
            objects: ObjectTable::default(),
            events: GameEventBus::default(),
        }
    }

    fn init(&mut self, doc: &ScriptDocument) {
        let mut host = ScriptHost {
            game: &mut self.game,
            objects: &mut self.objects,
            events: &mut self.events,
        };
        self.runtime.init(doc, &mut host);
    }

    fn step(&mut self, dt: f64) {
        let mut host = ScriptHost {
            game: &mut self.game,
            objects: &mut self.objects,
            events: &mut self.events,
        };
        self.runtime.update(dt, &mut host);
    }

    fn var(&self, name: &str) -> f64 {
        self.runtime.variable(name).unwrap_or(0.0)
    }
}

#[test]
fn immediate_chain_with_loop_completes_during_init() {
    let mut h = Harness::new();
    h.init(&document(
        &["x"],
        vec![chain(vec![
            BlockNode::new("on_start"),
            set_var("x", 0.0),
            BlockNode::new("repeat_n")
                .with("times", 5)
                .with_children(vec![change_var("x", 1.0)]),
        ])],
    ));
    assert_eq!(h.var("x"), 5.0);
    assert_eq!(h.runtime.pending_tasks(), 0);
}

#[test]
fn score_trigger_fires_once_when_threshold_first_reached() {
    let mut h = Harness::new();
    h.init(&document(
        &[],
        vec![chain(vec![
            BlockNode::new("on_score").with("op", ">=").with("value", 50),
            BlockNode::new("add_score").with("amount", 10),
        ])],
    ));

    // Independent growth of +10 per second, sampled every quarter second.
    for frame in 1..=40 {
        h.game.score += 2.5;
        h.step(0.25);
        if frame == 19 {
            assert_eq!(h.game.score, 47.5);
        }
        if frame == 20 {
            assert_eq!(h.game.score, 60.0);
        }
    }
    assert_eq!(h.game.score, 110.0);
    assert_eq!(h.events.count("trigger_fired"), 1);
}

#[test]
fn score_trigger_does_not_refire_while_condition_holds() {
    let mut h = Harness::new();
    h.init(&document(
        &["fired"],
        vec![chain(vec![
            BlockNode::new("on_score").with("op", ">=").with("value", 100),
            change_var("fired", 1.0),
        ])],
    ));
    h.game.score = 100.0;
    for _ in 0..10 {
        h.step(1.0 / 60.0);
    }
    h.game.score = 0.0;
    h.step(1.0 / 60.0);
    h.game.score = 150.0;
    h.step(1.0 / 60.0);
    assert_eq!(h.var("fired"), 1.0);
}

#[test]
fn overlapping_score_triggers_fire_in_registration_order() {
    let mut h = Harness::new();
    h.init(&document(
        &["order"],
        vec![
            chain(vec![
                BlockNode::new("on_score").with("op", ">=").with("value", 10),
                set_var("order", 1.0),
            ]),
            chain(vec![
                BlockNode::new("on_score").with("op", ">=").with("value", 5),
                change_var("order", 10.0),
            ]),
        ],
    ));
    h.game.score = 20.0;
    h.step(0.1);
    assert_eq!(h.var("order"), 11.0);
}

#[test]
fn touch_trigger_fires_once_per_entry() {
    let mut h = Harness::new();
    h.objects.insert("door", GameObject::new(100.0, 0.0, 20.0, 20.0));
    h.game.player = Aabb::new(0.0, 0.0, 10.0, 10.0);
    h.init(&document(
        &["hits"],
        vec![chain(vec![
            BlockNode::new("on_touch").with("object", "door"),
            change_var("hits", 1.0),
        ])],
    ));

    h.step(0.1);
    assert_eq!(h.var("hits"), 0.0);

    h.game.player.x = 105.0;
    for _ in 0..5 {
        h.step(0.1);
    }
    assert_eq!(h.var("hits"), 1.0);

    h.game.player.x = 0.0;
    h.step(0.1);
    assert_eq!(h.var("hits"), 1.0);

    h.game.player.x = 110.0;
    h.step(0.1);
    assert_eq!(h.var("hits"), 2.0);
}

#[test]
fn key_trigger_fires_on_press_and_rearms_on_release() {
    let mut h = Harness::new();
    h.init(&document(
        &["presses"],
        vec![chain(vec![
            BlockNode::new("on_key").with("key", "space"),
            change_var("presses", 1.0),
        ])],
    ));

    h.game.press_key(" ");
    for _ in 0..30 {
        h.step(1.0 / 60.0);
    }
    assert_eq!(h.var("presses"), 1.0);

    h.game.release_key(" ");
    h.step(1.0 / 60.0);
    assert_eq!(h.var("presses"), 1.0);

    h.game.press_key("Space");
    h.step(1.0 / 60.0);
    assert_eq!(h.var("presses"), 2.0);
}

#[test]
fn repeat_is_capped_by_ceiling_and_yields_every_hundred_iterations() {
    let mut h = Harness::new();
    h.init(&document(
        &["n"],
        vec![chain(vec![
            BlockNode::new("on_start"),
            BlockNode::new("repeat_n")
                .with("times", 1_000_000)
                .with_children(vec![change_var("n", 1.0)]),
        ])],
    ));
    assert_eq!(h.var("n"), 100.0);
    assert_eq!(h.runtime.pending_tasks(), 1);

    h.step(0.016);
    assert_eq!(h.var("n"), 200.0);

    for _ in 0..8 {
        h.step(0.016);
    }
    assert_eq!(h.var("n"), 1_000.0);
    assert_eq!(h.runtime.pending_tasks(), 0);

    for _ in 0..20 {
        h.step(0.016);
    }
    assert_eq!(h.var("n"), 1_000.0);
}

#[test]
fn repeat_while_stops_on_condition_or_ceiling() {
    let mut h = Harness::new();
    h.init(&document(
        &["i", "spins"],
        vec![
            chain(vec![
                BlockNode::new("on_start"),
                BlockNode::new("repeat_while")
                    .with("var", "i")
                    .with("op", "<=")
                    .with("value", 10)
                    .with_children(vec![change_var("i", 1.0)]),
            ]),
            chain(vec![
                BlockNode::new("on_start"),
                BlockNode::new("repeat_while")
                    .with("var", "spins")
                    .with("op", ">=")
                    .with("value", 0)
                    .with_children(vec![change_var("spins", 1.0)]),
            ]),
        ],
    ));
    assert_eq!(h.var("i"), 11.0);
    for _ in 0..20 {
        h.step(0.016);
    }
    assert_eq!(h.var("spins"), 1_000.0);
    assert_eq!(h.runtime.pending_tasks(), 0);
}

#[test]
fn destroy_removes_object_from_one_collection_and_lookup() {
    let mut h = Harness::new();
    for id in ["coin", "p1", "flag"] {
        h.objects.insert(id, GameObject::new(0.0, 0.0, 8.0, 8.0));
    }
    h.game.collectibles = vec!["coin".to_string()];
    h.game.platforms = vec!["p1".to_string()];
    h.game.goal = Some("flag".to_string());

    h.init(&document(
        &[],
        vec![chain(vec![
            BlockNode::new("on_start"),
            BlockNode::new("destroy_obj").with("object", "coin"),
            BlockNode::new("destroy_obj").with("object", "flag"),
            BlockNode::new("move_obj")
                .with("object", "coin")
                .with("dx", 5)
                .with("dy", 5),
            BlockNode::new("destroy_obj").with("object", "coin"),
        ])],
    ));

    assert!(h.game.collectibles.is_empty());
    assert_eq!(h.game.platforms, vec!["p1".to_string()]);
    assert!(h.game.goal.is_none());
    assert!(!h.objects.contains("coin"));
    assert!(h.objects.contains("p1"));
    assert_eq!(h.events.count("object_destroyed"), 2);
    assert!(h.runtime.faults().is_empty());
}

#[test]
fn object_actions_mutate_referenced_objects() {
    let mut h = Harness::new();
    h.objects.insert("box", GameObject::new(10.0, 10.0, 8.0, 8.0));
    h.init(&document(
        &[],
        vec![chain(vec![
            BlockNode::new("on_start"),
            BlockNode::new("move_obj")
                .with("object", "box")
                .with("dx", 5)
                .with("dy", -2),
            BlockNode::new("hide_obj").with("object", "box"),
            BlockNode::new("set_color")
                .with("object", "box")
                .with("color", "#00ff00"),
            BlockNode::new("move_obj").with("object", "ghost").with("dx", 5),
        ])],
    ));
    let obj = h.objects.get("box").expect("box");
    assert_eq!((obj.x, obj.y), (15.0, 8.0));
    assert!(!obj.visible);
    assert_eq!(obj.color, Color::srgb(0.0, 1.0, 0.0));

    h.init(&document(
        &[],
        vec![chain(vec![
            BlockNode::new("on_start"),
            BlockNode::new("teleport_obj")
                .with("object", "box")
                .with("x", 1)
                .with("y", 2),
            BlockNode::new("show_obj").with("object", "box"),
        ])],
    ));
    let obj = h.objects.get("box").expect("box");
    assert_eq!((obj.x, obj.y), (1.0, 2.0));
    assert!(obj.visible);
}

#[test]
fn failing_action_is_logged_and_list_continues() {
    let mut h = Harness::new();
    h.objects.insert("box", GameObject::new(0.0, 0.0, 8.0, 8.0));
    h.init(&document(
        &["after"],
        vec![chain(vec![
            BlockNode::new("on_start"),
            BlockNode::new("set_color")
                .with("object", "box")
                .with("color", "not-a-color"),
            BlockNode::new("set_color")
                .with("object", "missing")
                .with("color", "not-a-color"),
            set_var("after", 1.0),
        ])],
    ));
    assert_eq!(h.var("after"), 1.0);
    assert_eq!(h.runtime.faults().len(), 1);
    assert_eq!(h.runtime.faults().entries[0].action, "set_color");
}

#[test]
fn wait_suspends_only_its_own_list() {
    let mut h = Harness::new();
    h.init(&document(
        &["a", "b"],
        vec![
            chain(vec![
                BlockNode::new("on_start"),
                set_var("a", 1.0),
                BlockNode::new("wait").with("seconds", 1),
                set_var("a", 2.0),
            ]),
            chain(vec![BlockNode::new("on_start"), set_var("b", 1.0)]),
        ],
    ));
    assert_eq!((h.var("a"), h.var("b")), (1.0, 1.0));
    assert_eq!(h.runtime.pending_tasks(), 1);

    h.step(0.5);
    assert_eq!(h.var("a"), 1.0);
    h.step(0.5);
    assert_eq!(h.var("a"), 2.0);
    assert_eq!(h.runtime.pending_tasks(), 0);
}

#[test]
fn timer_trigger_starts_after_delay() {
    let mut h = Harness::new();
    h.init(&document(
        &["t"],
        vec![chain(vec![
            BlockNode::new("on_timer").with("seconds", 2),
            set_var("t", 1.0),
        ])],
    ));
    assert_eq!(h.runtime.pending_tasks(), 1);
    for _ in 0..3 {
        h.step(0.5);
    }
    assert_eq!(h.var("t"), 0.0);
    h.step(0.5);
    assert_eq!(h.var("t"), 1.0);
}

#[test]
fn call_func_runs_to_completion_before_caller_continues() {
    let mut h = Harness::new();
    h.init(&document(
        &["x", "y", "z"],
        vec![
            chain(vec![
                BlockNode::new("on_start"),
                BlockNode::new("call_func").with("name", "bump"),
                change_var("y", 1.0),
                BlockNode::new("call_func").with("name", "nobody"),
                change_var("z", 1.0),
            ]),
            chain(vec![
                BlockNode::new("define_func").with("name", "bump"),
                change_var("x", 1.0),
                BlockNode::new("wait").with("seconds", 0.5),
                change_var("x", 10.0),
            ]),
        ],
    ));
    assert!(h.runtime.has_function("bump"));
    assert_eq!((h.var("x"), h.var("y"), h.var("z")), (1.0, 0.0, 0.0));
    h.step(0.5);
    assert_eq!((h.var("x"), h.var("y"), h.var("z")), (11.0, 1.0, 1.0));
}

#[test]
fn recursive_function_is_bounded_by_call_depth() {
    let mut h = Harness::new();
    h.init(&document(
        &["depth", "done"],
        vec![
            chain(vec![
                BlockNode::new("define_func").with("name", "dive"),
                change_var("depth", 1.0),
                BlockNode::new("call_func").with("name", "dive"),
            ]),
            chain(vec![
                BlockNode::new("on_start"),
                BlockNode::new("call_func").with("name", "dive"),
                set_var("done", 1.0),
            ]),
        ],
    ));
    assert_eq!(h.var("depth"), 8.0);
    assert_eq!(h.var("done"), 1.0);
    assert_eq!(h.runtime.faults().len(), 1);
}

#[test]
fn conditionals_pick_the_matching_branch() {
    let mut h = Harness::new();
    h.init(&document(
        &["x", "r", "lucky", "unlucky"],
        vec![chain(vec![
            BlockNode::new("on_start"),
            set_var("x", 3.0),
            BlockNode::new("if_else")
                .with("var", "x")
                .with("op", ">=")
                .with("value", 3)
                .with_children(vec![set_var("r", 1.0)])
                .with_else(vec![set_var("r", 2.0)]),
            BlockNode::new("if_cond")
                .with("var", "missing")
                .with("op", "==")
                .with("value", 0)
                .with_children(vec![change_var("r", 10.0)]),
            BlockNode::new("if_random")
                .with("chance", 100)
                .with_children(vec![set_var("lucky", 1.0)]),
            BlockNode::new("if_random")
                .with("chance", 0)
                .with_children(vec![set_var("unlucky", 1.0)]),
        ])],
    ));
    assert_eq!(h.var("r"), 11.0);
    assert_eq!(h.var("lucky"), 1.0);
    assert_eq!(h.var("unlucky"), 0.0);
}

#[test]
fn watchers_run_on_every_write() {
    let mut h = Harness::new();
    h.init(&document(
        &["hp", "changes"],
        vec![
            chain(vec![
                BlockNode::new("on_var_change").with("var", "hp"),
                change_var("changes", 1.0),
            ]),
            chain(vec![
                BlockNode::new("on_start"),
                set_var("hp", 5.0),
                set_var("hp", 5.0),
                change_var("hp", -1.0),
            ]),
        ],
    ));
    assert_eq!(h.var("hp"), 4.0);
    assert_eq!(h.var("changes"), 3.0);
}

#[test]
fn self_feeding_watcher_is_cut_off() {
    let mut h = Harness::new();
    h.init(&document(
        &["a"],
        vec![
            chain(vec![
                BlockNode::new("on_var_change").with("var", "a"),
                change_var("a", 1.0),
            ]),
            chain(vec![BlockNode::new("on_start"), set_var("a", 0.0)]),
        ],
    ));
    assert_eq!(h.var("a"), 8.0);
    assert!(!h.runtime.faults().is_empty());
}

#[test]
fn score_variable_is_mirrored_and_writable() {
    let mut h = Harness::new();
    h.game.score = 7.0;
    h.init(&document(
        &[],
        vec![chain(vec![
            BlockNode::new("on_key").with("key", "a"),
            set_var(SCORE_VAR, 42.0),
        ])],
    ));
    assert_eq!(h.var(SCORE_VAR), 7.0);
    h.game.score = 9.0;
    h.step(0.1);
    assert_eq!(h.var(SCORE_VAR), 9.0);
    h.game.press_key("a");
    h.step(0.1);
    assert_eq!(h.game.score, 42.0);
}

#[test]
fn message_overlay_expires() {
    let mut h = Harness::new();
    h.init(&document(
        &[],
        vec![chain(vec![
            BlockNode::new("on_start"),
            BlockNode::new("show_message")
                .with("text", "Go!")
                .with("seconds", 1),
            BlockNode::new("end_game"),
        ])],
    ));
    assert_eq!(h.runtime.overlay().map(|o| o.text.as_str()), Some("Go!"));
    assert!(h.game.ended);
    h.step(0.5);
    assert!(h.runtime.overlay().is_some());
    h.step(0.5);
    assert!(h.runtime.overlay().is_none());
}

#[test]
fn teardown_cancels_timers_and_registrations() {
    let mut h = Harness::new();
    h.init(&document(
        &["late"],
        vec![
            chain(vec![
                BlockNode::new("on_start"),
                BlockNode::new("show_message").with("text", "hi").with("seconds", 10),
                BlockNode::new("wait").with("seconds", 1),
                set_var("late", 1.0),
            ]),
            chain(vec![
                BlockNode::new("on_timer").with("seconds", 1),
                set_var("late", 2.0),
            ]),
            chain(vec![BlockNode::new("on_key").with("key", "space"), set_var("late", 3.0)]),
        ],
    ));
    assert_eq!(h.runtime.pending_tasks(), 2);

    h.runtime.destroy();
    assert!(!h.runtime.is_running());
    assert_eq!(h.runtime.pending_tasks(), 0);
    assert!(h.runtime.overlay().is_none());

    h.game.press_key("space");
    for _ in 0..10 {
        h.step(0.5);
    }
    assert_eq!(h.runtime.variable("late"), None);
    assert_eq!(h.runtime.frame(), 0);
}

#[test]
fn loose_chains_without_trigger_are_ignored() {
    let mut h = Harness::new();
    h.init(&document(&["x"], vec![chain(vec![set_var("x", 9.0)])]));
    assert_eq!(h.var("x"), 0.0);
}

#[test]
fn stats_snapshot_reports_session_state() {
    let mut h = Harness::new();
    h.init(&document(
        &["x"],
        vec![chain(vec![
            BlockNode::new("on_start"),
            set_var("x", 2.0),
            BlockNode::new("wait").with("seconds", 3),
        ])],
    ));
    let stats = h.runtime.stats();
    assert!(stats.running);
    assert_eq!(stats.pending_tasks, 1);
    assert!(stats.variables.contains(&("x".to_string(), 2.0)));
    let json = serde_json::to_value(&stats).expect("encode stats");
    assert!(json.get("overlay").is_none());
}
