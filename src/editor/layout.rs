use bevy::math::{Rect, Vec2};

use crate::blocks::{
    catalog, BlockGraph, BlockId, BlockLocation, ContainerRef, PlacedBlock, SlotKind,
};

pub const BLOCK_WIDTH: f32 = 200.0;
pub const BLOCK_HEIGHT: f32 = 36.0;
pub const SLOT_INDENT: f32 = 20.0;
pub const EMPTY_SLOT_HEIGHT: f32 = 24.0;
pub const ELSE_BAR_HEIGHT: f32 = 28.0;
pub const C_FOOTER_HEIGHT: f32 = 16.0;

#[derive(Clone, Debug)]
pub struct BlockBox {
    pub id: BlockId,
    pub rect: Rect,
    pub location: BlockLocation,
    pub is_hat: bool,
    pub depth: usize,
}

impl BlockBox {
    pub fn top_center(&self) -> Vec2 {
        Vec2::new(self.rect.center().x, self.rect.min.y)
    }

    pub fn bottom_center(&self) -> Vec2 {
        Vec2::new(self.rect.center().x, self.rect.max.y)
    }

    pub fn first_in_container(&self) -> bool {
        self.location.index == 0
    }
}

#[derive(Clone, Debug)]
pub struct SlotBox {
    pub owner: BlockId,
    pub slot: SlotKind,
    pub rect: Rect,
}

/// Canvas-space geometry of every placed block and slot, in document order
/// (parents before their children).
#[derive(Clone, Debug, Default)]
pub struct Layout {
    pub blocks: Vec<BlockBox>,
    pub slots: Vec<SlotBox>,
}

impl Layout {
    pub fn block(&self, id: BlockId) -> Option<&BlockBox> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Deepest block whose shape contains `point`.
    pub fn hit(&self, point: Vec2) -> Option<&BlockBox> {
        self.blocks.iter().filter(|b| b.rect.contains(point)).last()
    }

    pub fn slots_of(&self, owner: BlockId) -> impl Iterator<Item = &SlotBox> {
        self.slots.iter().filter(move |s| s.owner == owner)
    }
}

pub fn block_height(block: &PlacedBlock) -> f32 {
    let Some(children) = block.children.as_ref() else {
        return BLOCK_HEIGHT;
    };
    let mut height = BLOCK_HEIGHT + slot_height(children) + C_FOOTER_HEIGHT;
    if let Some(otherwise) = block.else_children.as_ref() {
        height += ELSE_BAR_HEIGHT + slot_height(otherwise);
    }
    height
}

pub fn list_height(blocks: &[PlacedBlock]) -> f32 {
    blocks.iter().map(block_height).sum()
}

fn slot_height(blocks: &[PlacedBlock]) -> f32 {
    if blocks.is_empty() {
        EMPTY_SLOT_HEIGHT
    } else {
        list_height(blocks)
    }
}

pub fn layout_graph(graph: &BlockGraph) -> Layout {
    let mut layout = Layout::default();
    for chain in &graph.chains {
        layout_list(
            &chain.blocks,
            chain.position,
            ContainerRef::Chain(chain.id),
            0,
            &mut layout,
        );
    }
    layout
}

fn layout_list(
    blocks: &[PlacedBlock],
    origin: Vec2,
    container: ContainerRef,
    depth: usize,
    layout: &mut Layout,
) {
    let mut y = origin.y;
    for (index, block) in blocks.iter().enumerate() {
        let height = block_height(block);
        layout.blocks.push(BlockBox {
            id: block.id,
            rect: Rect::new(origin.x, y, origin.x + BLOCK_WIDTH, y + height),
            location: BlockLocation { container, index },
            is_hat: catalog().is_hat(&block.block_type),
            depth,
        });

        let mut slot_y = y + BLOCK_HEIGHT;
        for slot in [SlotKind::Then, SlotKind::Else] {
            let Some(children) = block.slot(slot) else {
                continue;
            };
            if slot == SlotKind::Else {
                slot_y += ELSE_BAR_HEIGHT;
            }
            let slot_x = origin.x + SLOT_INDENT;
            let h = slot_height(children);
            layout.slots.push(SlotBox {
                owner: block.id,
                slot,
                rect: Rect::new(slot_x, slot_y, origin.x + BLOCK_WIDTH, slot_y + h),
            });
            layout_list(
                children,
                Vec2::new(slot_x, slot_y),
                ContainerRef::Slot {
                    owner: block.id,
                    slot,
                },
                depth + 1,
                layout,
            );
            slot_y += h;
        }

        y += height;
    }
}
