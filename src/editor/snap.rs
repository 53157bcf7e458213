use bevy::math::Vec2;

use crate::blocks::{BlockId, SlotKind};

use super::layout::{Layout, BLOCK_WIDTH};

/// Where a dropped group attaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapTarget {
    /// Insert right after the block, inside the same container.
    AppendAfter(BlockId),
    /// Insert in front of a block that heads its container.
    PrependBefore(BlockId),
    /// Insert at the front of a C-block slot.
    Nest { owner: BlockId, slot: SlotKind },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapCandidate {
    pub target: SnapTarget,
    pub distance: f32,
}

/// Geometry of the group being dragged, in canvas space.
#[derive(Clone, Copy, Debug)]
pub struct Payload {
    pub top_left: Vec2,
    pub height: f32,
    pub head_is_hat: bool,
}

impl Payload {
    pub fn top_center(&self) -> Vec2 {
        self.top_left + Vec2::new(BLOCK_WIDTH * 0.5, 0.0)
    }

    pub fn bottom_center(&self) -> Vec2 {
        self.top_left + Vec2::new(BLOCK_WIDTH * 0.5, self.height)
    }
}

/// Closest legal attachment point within `threshold`, scanning the layout in
/// document order. On equal distance the first candidate found wins.
///
/// A group headed by a hat block never snaps anywhere; hats only start chains.
/// Nothing is ever prepended in front of a hat.
pub fn resolve_snap(layout: &Layout, payload: &Payload, threshold: f32) -> Option<SnapCandidate> {
    if payload.head_is_hat || !threshold.is_finite() {
        return None;
    }
    let top = payload.top_center();
    let bottom = payload.bottom_center();
    let mut best: Option<SnapCandidate> = None;
    let mut consider = |target: SnapTarget, distance: f32| {
        if distance > threshold {
            return;
        }
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(SnapCandidate { target, distance });
        }
    };

    for block in &layout.blocks {
        consider(
            SnapTarget::AppendAfter(block.id),
            top.distance(block.bottom_center()),
        );
        if block.first_in_container() && !block.is_hat {
            consider(
                SnapTarget::PrependBefore(block.id),
                bottom.distance(block.top_center()),
            );
        }
        for slot in layout.slots_of(block.id) {
            consider(
                SnapTarget::Nest {
                    owner: slot.owner,
                    slot: slot.slot,
                },
                top.distance(slot.rect.center()),
            );
        }
    }
    best
}
