use std::sync::Arc;

use bevy::log::warn;

use crate::blocks::{catalog, BlockNode};
use crate::game_host::{normalize_key, ObjectId};

pub type ActionList = Arc<[Action]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Ge,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            "==" | "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    pub fn eval(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

/// `{variable} {op} {literal}`. An unparsable operator never holds.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub var: String,
    pub op: Option<CompareOp>,
    pub value: f64,
}

impl Condition {
    fn from_node(node: &BlockNode) -> Self {
        Self {
            var: node.value("var").trim().to_string(),
            op: CompareOp::parse(node.value("op")),
            value: number(node, "value"),
        }
    }

    pub fn holds(&self, current: f64) -> bool {
        self.op.map_or(false, |op| op.eval(current, self.value))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    MoveObject { object: ObjectId, dx: f64, dy: f64 },
    Teleport { object: ObjectId, x: f64, y: f64 },
    SetVisible { object: ObjectId, visible: bool },
    Destroy { object: ObjectId },
    SetColor { object: ObjectId, color: String },
    SetVar { var: String, value: f64 },
    ChangeVar { var: String, delta: f64 },
    AddScore(f64),
    SetScore(f64),
    ShowMessage { text: String, seconds: f64 },
    EndGame,
    Wait(f64),
    CallFunction(String),
    If { cond: Condition, then: ActionList },
    IfElse { cond: Condition, then: ActionList, otherwise: ActionList },
    IfRandom { chance: f64, then: ActionList },
    Repeat { times: u64, body: ActionList },
    RepeatWhile { cond: Condition, body: ActionList },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveObject { .. } => "move_obj",
            Self::Teleport { .. } => "teleport_obj",
            Self::SetVisible { visible: true, .. } => "show_obj",
            Self::SetVisible { visible: false, .. } => "hide_obj",
            Self::Destroy { .. } => "destroy_obj",
            Self::SetColor { .. } => "set_color",
            Self::SetVar { .. } => "set_var",
            Self::ChangeVar { .. } => "change_var",
            Self::AddScore(_) => "add_score",
            Self::SetScore(_) => "set_score",
            Self::ShowMessage { .. } => "show_message",
            Self::EndGame => "end_game",
            Self::Wait(_) => "wait",
            Self::CallFunction(_) => "call_func",
            Self::If { .. } => "if_cond",
            Self::IfElse { .. } => "if_else",
            Self::IfRandom { .. } => "if_random",
            Self::Repeat { .. } => "repeat_n",
            Self::RepeatWhile { .. } => "repeat_while",
        }
    }
}

/// How a chain's head block decides when its action list runs.
#[derive(Clone, Debug, PartialEq)]
pub enum Trigger {
    Start,
    Timer(f64),
    Touch(ObjectId),
    Key(String),
    VariableChanged(String),
    Score { op: Option<CompareOp>, threshold: f64 },
    Function(String),
}

impl Trigger {
    pub fn classify(head: &BlockNode) -> Option<Self> {
        let trigger = match head.block_type.as_str() {
            "on_start" => Self::Start,
            "on_timer" => Self::Timer(number(head, "seconds").max(0.0)),
            "on_touch" => Self::Touch(head.value("object").trim().to_string()),
            "on_key" => Self::Key(normalize_key(head.value("key"))),
            "on_var_change" => Self::VariableChanged(head.value("var").trim().to_string()),
            "on_score" => Self::Score {
                op: CompareOp::parse(head.value("op")),
                threshold: number(head, "value"),
            },
            "define_func" => Self::Function(head.value("name").trim().to_string()),
            _ => return None,
        };
        Some(trigger)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Start => "on_start".to_string(),
            Self::Timer(s) => format!("on_timer({})", s),
            Self::Touch(id) => format!("on_touch({})", id),
            Self::Key(k) => format!("on_key({})", k),
            Self::VariableChanged(v) => format!("on_var_change({})", v),
            Self::Score { threshold, .. } => format!("on_score({})", threshold),
            Self::Function(name) => format!("define_func({})", name),
        }
    }
}

/// Numeric field value; anything unparsable or non-finite reads as 0.
pub fn number(node: &BlockNode, key: &str) -> f64 {
    node.value(key)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn object(node: &BlockNode) -> ObjectId {
    node.value("object").trim().to_string()
}

fn nested(nodes: Option<&Vec<BlockNode>>) -> ActionList {
    nodes.map_or_else(|| Arc::from(Vec::new()), |n| compile_list(n))
}

pub fn compile_list(nodes: &[BlockNode]) -> ActionList {
    nodes.iter().filter_map(compile_action).collect::<Vec<_>>().into()
}

pub fn compile_action(node: &BlockNode) -> Option<Action> {
    let action = match node.block_type.as_str() {
        "move_obj" => Action::MoveObject {
            object: object(node),
            dx: number(node, "dx"),
            dy: number(node, "dy"),
        },
        "teleport_obj" => Action::Teleport {
            object: object(node),
            x: number(node, "x"),
            y: number(node, "y"),
        },
        "show_obj" => Action::SetVisible {
            object: object(node),
            visible: true,
        },
        "hide_obj" => Action::SetVisible {
            object: object(node),
            visible: false,
        },
        "destroy_obj" => Action::Destroy {
            object: object(node),
        },
        "set_color" => Action::SetColor {
            object: object(node),
            color: node.value("color").trim().to_string(),
        },
        "set_var" => Action::SetVar {
            var: node.value("var").trim().to_string(),
            value: number(node, "value"),
        },
        "change_var" => Action::ChangeVar {
            var: node.value("var").trim().to_string(),
            delta: number(node, "delta"),
        },
        "add_score" => Action::AddScore(number(node, "amount")),
        "set_score" => Action::SetScore(number(node, "value")),
        "show_message" => Action::ShowMessage {
            text: node.value("text").to_string(),
            seconds: number(node, "seconds"),
        },
        "end_game" => Action::EndGame,
        "wait" => Action::Wait(number(node, "seconds").max(0.0)),
        "call_func" => Action::CallFunction(node.value("name").trim().to_string()),
        "if_cond" => Action::If {
            cond: Condition::from_node(node),
            then: nested(node.children.as_ref()),
        },
        "if_else" => Action::IfElse {
            cond: Condition::from_node(node),
            then: nested(node.children.as_ref()),
            otherwise: nested(node.else_children.as_ref()),
        },
        "if_random" => Action::IfRandom {
            chance: number(node, "chance"),
            then: nested(node.children.as_ref()),
        },
        "repeat_n" => Action::Repeat {
            times: number(node, "times").max(0.0).floor() as u64,
            body: nested(node.children.as_ref()),
        },
        "repeat_while" => Action::RepeatWhile {
            cond: Condition::from_node(node),
            body: nested(node.children.as_ref()),
        },
        other => {
            if catalog().is_hat(other) {
                warn!("[Blockplay script] Ignoring trigger block '{}' inside an action list", other);
            } else {
                warn!("[Blockplay script] Skipping unknown block type '{}'", other);
            }
            return None;
        }
    };
    Some(action)
}
