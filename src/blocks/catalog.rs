use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

pub const COMPARE_OPS: &[&str] = &[">=", "<=", "==", "!="];
pub const KEY_OPTIONS: &[&str] = &[
    "space", "up", "down", "left", "right", "w", "a", "s", "d", "e", "q", "enter",
];

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    Events,
    Motion,
    Looks,
    Variables,
    Control,
    Game,
    Functions,
}

impl BlockCategory {
    pub const ALL: [BlockCategory; 7] = [
        Self::Events,
        Self::Motion,
        Self::Looks,
        Self::Variables,
        Self::Control,
        Self::Game,
        Self::Functions,
    ];
}

/// Editing widget and value domain of a single block field.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    Dropdown { options: Vec<String> },
    Color,
    /// Id of a placeable object supplied by the host.
    ObjectRef,
    /// Name of a declared script variable.
    VariableRef,
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
}

impl FieldSpec {
    fn number(key: &'static str, default: &'static str) -> Self {
        Self { key, kind: FieldKind::Number, default }
    }

    fn text(key: &'static str, default: &'static str) -> Self {
        Self { key, kind: FieldKind::Text, default }
    }

    fn color(key: &'static str, default: &'static str) -> Self {
        Self { key, kind: FieldKind::Color, default }
    }

    fn object(key: &'static str) -> Self {
        Self { key, kind: FieldKind::ObjectRef, default: "" }
    }

    fn variable(key: &'static str) -> Self {
        Self { key, kind: FieldKind::VariableRef, default: "" }
    }

    fn dropdown(key: &'static str, options: &[&str], default: &'static str) -> Self {
        Self {
            key,
            kind: FieldKind::Dropdown {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            default,
        }
    }

    /// Whether `value` is acceptable for this field, given the live editor context.
    pub fn accepts(&self, value: &str, objects: &[String], variables: &[String]) -> bool {
        match &self.kind {
            FieldKind::Number => value.trim().parse::<f64>().map_or(false, f64::is_finite),
            FieldKind::Text => true,
            FieldKind::Dropdown { options } => options.iter().any(|o| o == value),
            FieldKind::Color => bevy::color::Srgba::hex(value).is_ok(),
            FieldKind::ObjectRef => value.is_empty() || objects.iter().any(|o| o == value),
            FieldKind::VariableRef => value.is_empty() || variables.iter().any(|v| v == value),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BlockDefinition {
    pub block_type: &'static str,
    pub category: BlockCategory,
    pub label: &'static str,
    pub fields: Vec<FieldSpec>,
    pub is_hat: bool,
    pub is_c: bool,
    pub has_else: bool,
}

impl BlockDefinition {
    fn new(
        block_type: &'static str,
        category: BlockCategory,
        label: &'static str,
        fields: Vec<FieldSpec>,
    ) -> Self {
        Self {
            block_type,
            category,
            label,
            fields,
            is_hat: false,
            is_c: false,
            has_else: false,
        }
    }

    fn hat(mut self) -> Self {
        self.is_hat = true;
        self
    }

    fn c_block(mut self) -> Self {
        self.is_c = true;
        self
    }

    fn with_else(mut self) -> Self {
        self.is_c = true;
        self.has_else = true;
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn slot_count(&self) -> usize {
        match (self.is_c, self.has_else) {
            (true, true) => 2,
            (true, false) => 1,
            _ => 0,
        }
    }

    /// Substitutes `{key}` placeholders in the label with the given values.
    /// Unknown placeholders are left untouched.
    pub fn render_label(&self, values: &std::collections::BTreeMap<String, String>) -> String {
        let mut out = String::with_capacity(self.label.len() + 16);
        let mut rest = self.label;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match values.get(key) {
                        Some(v) => out.push_str(v),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Process-wide registry of every block kind the editor can place.
pub struct BlockCatalog {
    definitions: Vec<BlockDefinition>,
    by_type: HashMap<&'static str, usize>,
}

impl BlockCatalog {
    fn build() -> Self {
        use BlockCategory::*;

        let definitions = vec![
            // Events
            BlockDefinition::new("on_start", Events, "when game starts", vec![]).hat(),
            BlockDefinition::new(
                "on_timer",
                Events,
                "after {seconds} seconds",
                vec![FieldSpec::number("seconds", "1")],
            )
            .hat(),
            BlockDefinition::new(
                "on_touch",
                Events,
                "when player touches {object}",
                vec![FieldSpec::object("object")],
            )
            .hat(),
            BlockDefinition::new(
                "on_key",
                Events,
                "when {key} key pressed",
                vec![FieldSpec::dropdown("key", KEY_OPTIONS, "space")],
            )
            .hat(),
            BlockDefinition::new(
                "on_var_change",
                Events,
                "when {var} changes",
                vec![FieldSpec::variable("var")],
            )
            .hat(),
            BlockDefinition::new(
                "on_score",
                Events,
                "when score {op} {value}",
                vec![
                    FieldSpec::dropdown("op", COMPARE_OPS, ">="),
                    FieldSpec::number("value", "10"),
                ],
            )
            .hat(),
            // Motion
            BlockDefinition::new(
                "move_obj",
                Motion,
                "move {object} by x: {dx} y: {dy}",
                vec![
                    FieldSpec::object("object"),
                    FieldSpec::number("dx", "10"),
                    FieldSpec::number("dy", "0"),
                ],
            ),
            BlockDefinition::new(
                "teleport_obj",
                Motion,
                "teleport {object} to x: {x} y: {y}",
                vec![
                    FieldSpec::object("object"),
                    FieldSpec::number("x", "0"),
                    FieldSpec::number("y", "0"),
                ],
            ),
            // Looks
            BlockDefinition::new("show_obj", Looks, "show {object}", vec![FieldSpec::object("object")]),
            BlockDefinition::new("hide_obj", Looks, "hide {object}", vec![FieldSpec::object("object")]),
            BlockDefinition::new(
                "set_color",
                Looks,
                "set color of {object} to {color}",
                vec![FieldSpec::object("object"), FieldSpec::color("color", "#ff0000")],
            ),
            BlockDefinition::new(
                "show_message",
                Looks,
                "say {text} for {seconds} seconds",
                vec![FieldSpec::text("text", "Hello!"), FieldSpec::number("seconds", "2")],
            ),
            // Variables
            BlockDefinition::new(
                "set_var",
                Variables,
                "set {var} to {value}",
                vec![FieldSpec::variable("var"), FieldSpec::number("value", "0")],
            ),
            BlockDefinition::new(
                "change_var",
                Variables,
                "change {var} by {delta}",
                vec![FieldSpec::variable("var"), FieldSpec::number("delta", "1")],
            ),
            // Control
            BlockDefinition::new("wait", Control, "wait {seconds} seconds", vec![FieldSpec::number("seconds", "1")]),
            BlockDefinition::new(
                "if_cond",
                Control,
                "if {var} {op} {value}",
                vec![
                    FieldSpec::variable("var"),
                    FieldSpec::dropdown("op", COMPARE_OPS, "=="),
                    FieldSpec::number("value", "0"),
                ],
            )
            .c_block(),
            BlockDefinition::new(
                "if_else",
                Control,
                "if {var} {op} {value} else",
                vec![
                    FieldSpec::variable("var"),
                    FieldSpec::dropdown("op", COMPARE_OPS, "=="),
                    FieldSpec::number("value", "0"),
                ],
            )
            .with_else(),
            BlockDefinition::new(
                "if_random",
                Control,
                "with {chance}% chance",
                vec![FieldSpec::number("chance", "50")],
            )
            .c_block(),
            BlockDefinition::new(
                "repeat_n",
                Control,
                "repeat {times} times",
                vec![FieldSpec::number("times", "10")],
            )
            .c_block(),
            BlockDefinition::new(
                "repeat_while",
                Control,
                "repeat while {var} {op} {value}",
                vec![
                    FieldSpec::variable("var"),
                    FieldSpec::dropdown("op", COMPARE_OPS, "<="),
                    FieldSpec::number("value", "10"),
                ],
            )
            .c_block(),
            // Game
            BlockDefinition::new("destroy_obj", Game, "destroy {object}", vec![FieldSpec::object("object")]),
            BlockDefinition::new(
                "add_score",
                Game,
                "add {amount} to score",
                vec![FieldSpec::number("amount", "10")],
            ),
            BlockDefinition::new("set_score", Game, "set score to {value}", vec![FieldSpec::number("value", "0")]),
            BlockDefinition::new("end_game", Game, "end game", vec![]),
            // Functions
            BlockDefinition::new(
                "define_func",
                Functions,
                "define {name}",
                vec![FieldSpec::text("name", "myFunction")],
            )
            .hat(),
            BlockDefinition::new(
                "call_func",
                Functions,
                "call {name}",
                vec![FieldSpec::text("name", "myFunction")],
            ),
        ];

        let by_type = definitions
            .iter()
            .enumerate()
            .map(|(i, def)| (def.block_type, i))
            .collect();

        Self { definitions, by_type }
    }

    pub fn get(&self, block_type: &str) -> Option<&BlockDefinition> {
        self.by_type.get(block_type).map(|&i| &self.definitions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.definitions.iter()
    }

    pub fn in_category(&self, category: BlockCategory) -> impl Iterator<Item = &BlockDefinition> {
        self.definitions.iter().filter(move |d| d.category == category)
    }

    pub fn is_hat(&self, block_type: &str) -> bool {
        self.get(block_type).map_or(false, |d| d.is_hat)
    }
}

pub fn catalog() -> &'static BlockCatalog {
    static CATALOG: OnceLock<BlockCatalog> = OnceLock::new();
    CATALOG.get_or_init(BlockCatalog::build)
}
