pub mod catalog;
pub mod document;
pub mod graph;

pub use catalog::{catalog, BlockCategory, BlockDefinition, FieldKind, FieldSpec};
pub use document::{deserialize, deserialize_into, serialize, BlockNode, ChainNode, ScriptDocument};
pub use graph::{
    BlockGraph, BlockId, BlockLocation, Chain, ChainId, ContainerRef, PlacedBlock, SlotKind,
};
