use std::collections::BTreeMap;

use bevy::math::Vec2;

use super::catalog::catalog;

pub type BlockId = u64;
pub type ChainId = u64;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum SlotKind {
    Then,
    Else,
}

/// A block instance living in a chain or in a parent block's slot.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedBlock {
    pub id: BlockId,
    pub block_type: String,
    pub values: BTreeMap<String, String>,
    pub children: Option<Vec<PlacedBlock>>,
    pub else_children: Option<Vec<PlacedBlock>>,
}

impl PlacedBlock {
    pub fn slot(&self, slot: SlotKind) -> Option<&Vec<PlacedBlock>> {
        match slot {
            SlotKind::Then => self.children.as_ref(),
            SlotKind::Else => self.else_children.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: SlotKind) -> Option<&mut Vec<PlacedBlock>> {
        match slot {
            SlotKind::Then => self.children.as_mut(),
            SlotKind::Else => self.else_children.as_mut(),
        }
    }

    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn is_hat(&self) -> bool {
        catalog().is_hat(&self.block_type)
    }

    /// Number of blocks in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + [&self.children, &self.else_children]
            .into_iter()
            .flatten()
            .flat_map(|slot| slot.iter())
            .map(PlacedBlock::subtree_len)
            .sum::<usize>()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    pub id: ChainId,
    pub position: Vec2,
    pub blocks: Vec<PlacedBlock>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ContainerRef {
    Chain(ChainId),
    Slot { owner: BlockId, slot: SlotKind },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockLocation {
    pub container: ContainerRef,
    pub index: usize,
}

/// The editable program: top-level chains plus the declared variable list.
#[derive(Clone, Debug, Default)]
pub struct BlockGraph {
    pub chains: Vec<Chain>,
    pub variables: Vec<String>,
    next_block_id: BlockId,
    next_chain_id: ChainId,
}

impl BlockGraph {
    pub fn alloc_block_id(&mut self) -> BlockId {
        self.next_block_id = self.next_block_id.saturating_add(1);
        self.next_block_id
    }

    fn alloc_chain_id(&mut self) -> ChainId {
        self.next_chain_id = self.next_chain_id.saturating_add(1);
        self.next_chain_id
    }

    /// Instantiates a catalog block with default field values. Reference fields
    /// default to the first known object / variable.
    pub fn new_block(
        &mut self,
        block_type: &str,
        objects: &[String],
        variables: &[String],
    ) -> Result<PlacedBlock, String> {
        let def = catalog()
            .get(block_type)
            .ok_or_else(|| format!("Unknown block type '{}'", block_type))?;
        let values = def
            .fields
            .iter()
            .map(|f| {
                let value = match f.kind {
                    super::FieldKind::ObjectRef => objects.first().cloned().unwrap_or_default(),
                    super::FieldKind::VariableRef => {
                        variables.first().cloned().unwrap_or_default()
                    }
                    _ => f.default.to_string(),
                };
                (f.key.to_string(), value)
            })
            .collect();
        let slots = def.slot_count();
        Ok(PlacedBlock {
            id: self.alloc_block_id(),
            block_type: block_type.to_string(),
            values,
            children: (slots >= 1).then(Vec::new),
            else_children: (slots >= 2).then(Vec::new),
        })
    }

    pub fn add_chain(&mut self, position: Vec2, blocks: Vec<PlacedBlock>) -> Option<ChainId> {
        if blocks.is_empty() {
            return None;
        }
        let id = self.alloc_chain_id();
        self.chains.push(Chain { id, position, blocks });
        Some(id)
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn chain_mut(&mut self, id: ChainId) -> Option<&mut Chain> {
        self.chains.iter_mut().find(|c| c.id == id)
    }

    pub fn find_block(&self, id: BlockId) -> Option<&PlacedBlock> {
        self.chains.iter().find_map(|c| find_in(&c.blocks, id))
    }

    pub fn find_block_mut(&mut self, id: BlockId) -> Option<&mut PlacedBlock> {
        self.chains
            .iter_mut()
            .find_map(|c| find_in_mut(&mut c.blocks, id))
    }

    pub fn locate(&self, id: BlockId) -> Option<BlockLocation> {
        self.chains
            .iter()
            .find_map(|c| locate_in(&c.blocks, ContainerRef::Chain(c.id), id))
    }

    pub fn container(&self, container: ContainerRef) -> Option<&Vec<PlacedBlock>> {
        match container {
            ContainerRef::Chain(id) => self.chain(id).map(|c| &c.blocks),
            ContainerRef::Slot { owner, slot } => self.find_block(owner)?.slot(slot),
        }
    }

    pub fn container_mut(&mut self, container: ContainerRef) -> Option<&mut Vec<PlacedBlock>> {
        match container {
            ContainerRef::Chain(id) => self.chain_mut(id).map(|c| &mut c.blocks),
            ContainerRef::Slot { owner, slot } => self.find_block_mut(owner)?.slot_mut(slot),
        }
    }

    /// Removes `id` and every block after it in its container. Chains left
    /// empty are deleted.
    pub fn detach_from(&mut self, id: BlockId) -> Option<Vec<PlacedBlock>> {
        let location = self.locate(id)?;
        let detached = self
            .container_mut(location.container)?
            .split_off(location.index);
        self.prune_empty_chains();
        Some(detached)
    }

    pub fn insert_at(
        &mut self,
        container: ContainerRef,
        index: usize,
        blocks: Vec<PlacedBlock>,
    ) -> Result<(), String> {
        let list = self
            .container_mut(container)
            .ok_or_else(|| format!("Container {:?} no longer exists", container))?;
        let index = index.min(list.len());
        list.splice(index..index, blocks);
        Ok(())
    }

    pub fn prune_empty_chains(&mut self) {
        self.chains.retain(|c| !c.blocks.is_empty());
    }

    pub fn block_count(&self) -> usize {
        self.chains
            .iter()
            .flat_map(|c| c.blocks.iter())
            .map(PlacedBlock::subtree_len)
            .sum()
    }

    pub fn declare_variable(&mut self, name: &str) -> Result<(), String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Variable name must not be empty".to_string());
        }
        if self.variables.iter().any(|v| v == name) {
            return Err(format!("Variable '{}' already exists", name));
        }
        self.variables.push(name.to_string());
        Ok(())
    }

    pub fn clear(&mut self) {
        self.chains.clear();
        self.variables.clear();
    }
}

fn find_in(list: &[PlacedBlock], id: BlockId) -> Option<&PlacedBlock> {
    for block in list {
        if block.id == id {
            return Some(block);
        }
        let nested = [&block.children, &block.else_children]
            .into_iter()
            .flatten()
            .find_map(|slot| find_in(slot, id));
        if nested.is_some() {
            return nested;
        }
    }
    None
}

fn find_in_mut(list: &mut [PlacedBlock], id: BlockId) -> Option<&mut PlacedBlock> {
    for block in list.iter_mut() {
        if block.id == id {
            return Some(block);
        }
        let PlacedBlock {
            children,
            else_children,
            ..
        } = block;
        if let Some(found) = children.as_deref_mut().and_then(|c| find_in_mut(c, id)) {
            return Some(found);
        }
        if let Some(found) = else_children.as_deref_mut().and_then(|c| find_in_mut(c, id)) {
            return Some(found);
        }
    }
    None
}

fn locate_in(list: &[PlacedBlock], container: ContainerRef, id: BlockId) -> Option<BlockLocation> {
    for (index, block) in list.iter().enumerate() {
        if block.id == id {
            return Some(BlockLocation { container, index });
        }
        for slot in [SlotKind::Then, SlotKind::Else] {
            if let Some(children) = block.slot(slot) {
                let nested = ContainerRef::Slot {
                    owner: block.id,
                    slot,
                };
                if let Some(found) = locate_in(children, nested, id) {
                    return Some(found);
                }
            }
        }
    }
    None
}
