use std::collections::BTreeMap;

use bevy::log::warn;
use bevy::math::Vec2;
use serde::{Deserialize, Deserializer, Serialize};

use super::catalog::catalog;
use super::graph::{BlockGraph, PlacedBlock};

/// Canonical interchange format between the editor and the runtime.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ScriptDocument {
    #[serde(default)]
    pub chains: Vec<ChainNode>,
    #[serde(default)]
    pub variables: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChainNode {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub blocks: Vec<BlockNode>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlockNode {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, deserialize_with = "field_values")]
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BlockNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_children: Option<Vec<BlockNode>>,
}

impl BlockNode {
    pub fn new(block_type: &str) -> Self {
        Self {
            block_type: block_type.to_string(),
            values: BTreeMap::new(),
            children: None,
            else_children: None,
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<BlockNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_else(mut self, children: Vec<BlockNode>) -> Self {
        self.else_children = Some(children);
        self
    }

    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Hand-written documents may carry numbers or booleans as field values; the
/// graph stores every value as text.
fn field_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (k, text)
        })
        .collect())
}

impl ScriptDocument {
    pub fn from_json(source: &str) -> Result<Self, String> {
        serde_json::from_str(source).map_err(|e| format!("Invalid script document: {}", e))
    }

    pub fn to_json_pretty(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn block_count(&self) -> usize {
        fn count(nodes: &[BlockNode]) -> usize {
            nodes
                .iter()
                .map(|n| {
                    1 + n.children.as_deref().map_or(0, count)
                        + n.else_children.as_deref().map_or(0, count)
                })
                .sum()
        }
        self.chains.iter().map(|c| count(&c.blocks)).sum()
    }
}

pub fn serialize(graph: &BlockGraph) -> ScriptDocument {
    ScriptDocument {
        chains: graph
            .chains
            .iter()
            .filter(|c| !c.blocks.is_empty())
            .map(|c| ChainNode {
                id: c.id,
                x: c.position.x,
                y: c.position.y,
                blocks: serialize_blocks(&c.blocks),
            })
            .collect(),
        variables: graph.variables.clone(),
    }
}

fn serialize_blocks(blocks: &[PlacedBlock]) -> Vec<BlockNode> {
    blocks
        .iter()
        .map(|b| BlockNode {
            block_type: b.block_type.clone(),
            values: b.values.clone(),
            children: b.children.as_deref().map(serialize_blocks),
            else_children: b.else_children.as_deref().map(serialize_blocks),
        })
        .collect()
}

/// Rebuilds a graph from a document. Ids are regenerated; blocks whose type is
/// not in the catalog are dropped with a warning.
pub fn deserialize(doc: &ScriptDocument) -> BlockGraph {
    let mut graph = BlockGraph::default();
    deserialize_into(doc, &mut graph);
    graph
}

/// Replaces the contents of `graph` with the document. The graph's id counters
/// keep running, so ids handed out before the load are never reused.
pub fn deserialize_into(doc: &ScriptDocument, graph: &mut BlockGraph) {
    graph.clear();
    for name in &doc.variables {
        if let Err(e) = graph.declare_variable(name) {
            warn!("[Blockplay editor] Skipping variable: {}", e);
        }
    }
    for chain in &doc.chains {
        let blocks = rebuild_blocks(graph, &chain.blocks);
        graph.add_chain(Vec2::new(chain.x, chain.y), blocks);
    }
}

fn rebuild_blocks(graph: &mut BlockGraph, nodes: &[BlockNode]) -> Vec<PlacedBlock> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Some(def) = catalog().get(&node.block_type) else {
            warn!(
                "[Blockplay editor] Dropping unknown block type '{}'",
                node.block_type
            );
            continue;
        };
        let mut values = node.values.clone();
        for field in &def.fields {
            values
                .entry(field.key.to_string())
                .or_insert_with(|| field.default.to_string());
        }
        let slots = def.slot_count();
        let children = (slots >= 1)
            .then(|| rebuild_blocks(graph, node.children.as_deref().unwrap_or(&[])));
        let else_children = (slots >= 2)
            .then(|| rebuild_blocks(graph, node.else_children.as_deref().unwrap_or(&[])));
        out.push(PlacedBlock {
            id: graph.alloc_block_id(),
            block_type: node.block_type.clone(),
            values,
            children,
            else_children,
        });
    }
    out
}
