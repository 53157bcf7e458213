pub mod layout;
pub mod snap;
pub mod viewport;

use bevy::input::mouse::MouseWheel;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::blocks::{
    self, catalog, BlockCategory, BlockGraph, BlockId, ChainId, ContainerRef, PlacedBlock,
    ScriptDocument,
};
use crate::game_host::ObjectTable;

use layout::{block_height, layout_graph, list_height, Layout, BLOCK_HEIGHT, BLOCK_WIDTH};
use snap::{resolve_snap, Payload, SnapCandidate, SnapTarget};
use viewport::Viewport;

const PALETTE_PADDING: f32 = 10.0;
const PALETTE_GAP: f32 = 6.0;
const PALETTE_CATEGORY_GAP: f32 = 18.0;
const WHEEL_ZOOM_STEP: f32 = 0.1;

#[derive(Clone, Debug)]
pub struct EditorConfig {
    /// Maximum on-screen distance, in pixels, between a payload and a snap point.
    pub snap_threshold: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Screen-space regions.
    pub palette: Rect,
    pub canvas: Rect,
    pub trash: Rect,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_threshold: 40.0,
            min_zoom: 0.25,
            max_zoom: 3.0,
            palette: Rect::new(0.0, 0.0, 230.0, 720.0),
            canvas: Rect::new(230.0, 0.0, 1280.0, 720.0),
            trash: Rect::new(1180.0, 620.0, 1270.0, 710.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragSource {
    Palette(&'static str),
    Placed(BlockId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    Discarded,
    Snapped(SnapTarget),
    NewChain(ChainId),
}

#[derive(Clone, Debug)]
struct DragState {
    blocks: Vec<PlacedBlock>,
    /// Pointer position relative to the payload's top-left, in canvas units.
    grab_offset: Vec2,
    pointer: Vec2,
    snap: Option<SnapCandidate>,
}

#[derive(Clone, Debug)]
pub struct PaletteEntry {
    pub block_type: &'static str,
    pub category: BlockCategory,
    pub label: String,
    pub rect: Rect,
}

#[derive(Clone, Debug)]
pub struct BlockView {
    pub id: BlockId,
    pub block_type: String,
    pub category: Option<BlockCategory>,
    pub label: String,
    /// Screen-space rectangle.
    pub rect: Rect,
    pub depth: usize,
}

/// Everything a renderer needs to draw one editor frame.
#[derive(Clone, Debug, Default)]
pub struct EditorView {
    pub palette: Vec<PaletteEntry>,
    pub blocks: Vec<BlockView>,
    pub slots: Vec<Rect>,
    pub dragging: Vec<BlockView>,
    pub snap_marker: Option<Vec2>,
    pub variables: Vec<String>,
    pub zoom: f32,
}

/// The block canvas: program graph, viewport, palette and the in-flight drag.
#[derive(Resource)]
pub struct EditorSession {
    pub config: EditorConfig,
    graph: BlockGraph,
    viewport: Viewport,
    objects: Vec<String>,
    drag: Option<DragState>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let viewport = Viewport::new(config.canvas.min, config.min_zoom, config.max_zoom);
        Self {
            config,
            graph: BlockGraph::default(),
            viewport,
            objects: Vec::new(),
            drag: None,
        }
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn snap_target(&self) -> Option<SnapTarget> {
        self.drag.as_ref()?.snap.map(|c| c.target)
    }

    pub fn layout(&self) -> Layout {
        layout_graph(&self.graph)
    }

    pub fn palette_entries(&self) -> Vec<PaletteEntry> {
        let left = self.config.palette.min.x + PALETTE_PADDING;
        let width = (self.config.palette.width() - 2.0 * PALETTE_PADDING).max(1.0);
        let mut y = self.config.palette.min.y + PALETTE_PADDING;
        let mut entries = Vec::new();
        for category in BlockCategory::ALL {
            for def in catalog().in_category(category) {
                let defaults = def
                    .fields
                    .iter()
                    .map(|f| (f.key.to_string(), f.default.to_string()))
                    .collect();
                entries.push(PaletteEntry {
                    block_type: def.block_type,
                    category,
                    label: def.render_label(&defaults),
                    rect: Rect::new(left, y, left + width, y + BLOCK_HEIGHT),
                });
                y += BLOCK_HEIGHT + PALETTE_GAP;
            }
            y += PALETTE_CATEGORY_GAP;
        }
        entries
    }

    /// What a press at `screen` would pick up: a palette prototype, or the
    /// deepest placed block under the pointer.
    pub fn pick(&self, screen: Vec2) -> Option<DragSource> {
        if self.config.palette.contains(screen) {
            return self
                .palette_entries()
                .into_iter()
                .find(|e| e.rect.contains(screen))
                .map(|e| DragSource::Palette(e.block_type));
        }
        if !self.config.canvas.contains(screen) {
            return None;
        }
        let point = self.viewport.screen_to_canvas(screen);
        self.layout().hit(point).map(|b| DragSource::Placed(b.id))
    }

    pub fn begin_drag(&mut self, source: DragSource, pointer: Vec2) -> Result<(), String> {
        if self.drag.is_some() {
            return Err("A drag is already in progress".to_string());
        }
        let (blocks, grab_offset) = match source {
            DragSource::Palette(block_type) => {
                let entry_min = self
                    .palette_entries()
                    .into_iter()
                    .find(|e| e.block_type == block_type)
                    .map(|e| e.rect.min)
                    .unwrap_or(pointer);
                let variables = self.graph.variables.clone();
                let block = self.graph.new_block(block_type, &self.objects, &variables)?;
                (vec![block], (pointer - entry_min) / self.viewport.zoom)
            }
            DragSource::Placed(id) => {
                let top_left = self
                    .layout()
                    .block(id)
                    .map(|b| b.rect.min)
                    .ok_or_else(|| format!("Block {} is not on the canvas", id))?;
                let blocks = self
                    .graph
                    .detach_from(id)
                    .ok_or_else(|| format!("Block {} could not be detached", id))?;
                (blocks, self.viewport.screen_to_canvas(pointer) - top_left)
            }
        };
        self.drag = Some(DragState {
            blocks,
            grab_offset,
            pointer,
            snap: None,
        });
        self.update_drag(pointer);
        Ok(())
    }

    /// Moves the floating group and recomputes the highlighted snap target.
    pub fn update_drag(&mut self, pointer: Vec2) -> Option<SnapTarget> {
        let layout = layout_graph(&self.graph);
        let threshold = self.config.snap_threshold / self.viewport.zoom;
        let top_left = self.payload_top_left(pointer)?;
        let drag = self.drag.as_mut()?;
        drag.pointer = pointer;
        let payload = Payload {
            top_left,
            height: list_height(&drag.blocks),
            head_is_hat: drag.blocks.first().is_some_and(PlacedBlock::is_hat),
        };
        drag.snap = resolve_snap(&layout, &payload, threshold);
        drag.snap.map(|c| c.target)
    }

    pub fn end_drag(&mut self, pointer: Vec2) -> Option<DropOutcome> {
        self.update_drag(pointer);
        let top_left = self.payload_top_left(pointer)?;
        let drag = self.drag.take()?;

        if self.config.trash.contains(pointer) || !self.config.canvas.contains(pointer) {
            info!(
                "[Blockplay editor] Discarded {} block(s)",
                drag.blocks.iter().map(PlacedBlock::subtree_len).sum::<usize>()
            );
            return Some(DropOutcome::Discarded);
        }

        let height = list_height(&drag.blocks);
        if let Some(candidate) = drag.snap {
            match self.splice(candidate.target, drag.blocks.clone(), height) {
                Ok(()) => return Some(DropOutcome::Snapped(candidate.target)),
                Err(e) => warn!("[Blockplay editor] Snap failed, placing freely: {}", e),
            }
        }
        self.graph
            .add_chain(top_left, drag.blocks)
            .map(DropOutcome::NewChain)
    }

    fn splice(
        &mut self,
        target: SnapTarget,
        blocks: Vec<PlacedBlock>,
        height: f32,
    ) -> Result<(), String> {
        match target {
            SnapTarget::AppendAfter(id) => {
                let at = self
                    .graph
                    .locate(id)
                    .ok_or_else(|| format!("Block {} vanished", id))?;
                self.graph.insert_at(at.container, at.index + 1, blocks)
            }
            SnapTarget::PrependBefore(id) => {
                let at = self
                    .graph
                    .locate(id)
                    .ok_or_else(|| format!("Block {} vanished", id))?;
                self.graph.insert_at(at.container, 0, blocks)?;
                if let ContainerRef::Chain(chain) = at.container {
                    if let Some(chain) = self.graph.chain_mut(chain) {
                        chain.position.y -= height;
                    }
                }
                Ok(())
            }
            SnapTarget::Nest { owner, slot } => {
                self.graph
                    .insert_at(ContainerRef::Slot { owner, slot }, 0, blocks)
            }
        }
    }

    fn payload_top_left(&self, pointer: Vec2) -> Option<Vec2> {
        let drag = self.drag.as_ref()?;
        Some(self.viewport.screen_to_canvas(pointer) - drag.grab_offset)
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.viewport.pan_by(dx, dy);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.viewport.zoom_by(delta);
    }

    pub fn set_field(&mut self, id: BlockId, key: &str, value: &str) -> Result<(), String> {
        let variables = self.graph.variables.clone();
        let block = self
            .graph
            .find_block_mut(id)
            .ok_or_else(|| format!("Unknown block {}", id))?;
        let def = catalog()
            .get(&block.block_type)
            .ok_or_else(|| format!("Unknown block type '{}'", block.block_type))?;
        let field = def
            .field(key)
            .ok_or_else(|| format!("Block '{}' has no field '{}'", def.block_type, key))?;
        if !field.accepts(value, &self.objects, &variables) {
            return Err(format!(
                "Value '{}' is not valid for {}.{}",
                value, def.block_type, key
            ));
        }
        block.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn declare_variable(&mut self, name: &str) -> Result<(), String> {
        self.graph.declare_variable(name)
    }

    /// Blocks still naming the variable keep the name; at runtime it reads as 0.
    pub fn remove_variable(&mut self, name: &str) -> bool {
        let before = self.graph.variables.len();
        self.graph.variables.retain(|v| v != name);
        self.graph.variables.len() != before
    }

    pub fn set_objects(&mut self, mut ids: Vec<String>) {
        ids.sort();
        ids.dedup();
        self.objects = ids;
    }

    pub fn serialize(&self) -> ScriptDocument {
        blocks::serialize(&self.graph)
    }

    pub fn load(&mut self, doc: &ScriptDocument) {
        self.drag = None;
        blocks::deserialize_into(doc, &mut self.graph);
        info!(
            "[Blockplay editor] Loaded {} chain(s), {} block(s), {} variable(s)",
            self.graph.chains.len(),
            self.graph.block_count(),
            self.graph.variables.len()
        );
    }

    pub fn destroy(&mut self) {
        self.drag = None;
        self.graph.clear();
    }

    pub fn view(&self) -> EditorView {
        let layout = self.layout();
        let mut blocks = Vec::with_capacity(layout.blocks.len());
        for b in &layout.blocks {
            if let Some(block) = self.graph.find_block(b.id) {
                blocks.push(self.block_view(block, b.rect, b.depth));
            }
        }
        let slots = layout
            .slots
            .iter()
            .map(|s| self.screen_rect(s.rect))
            .collect();

        let mut dragging = Vec::new();
        let mut snap_marker = None;
        if let Some(drag) = &self.drag {
            if let Some(top_left) = self.payload_top_left(drag.pointer) {
                let mut y = top_left.y;
                for block in &drag.blocks {
                    let h = block_height(block);
                    let rect = Rect::new(top_left.x, y, top_left.x + BLOCK_WIDTH, y + h);
                    dragging.push(self.block_view(block, rect, 0));
                    y += h;
                }
            }
            snap_marker = drag
                .snap
                .and_then(|c| self.snap_point(&layout, c.target))
                .map(|p| self.viewport.canvas_to_screen(p));
        }

        EditorView {
            palette: self.palette_entries(),
            blocks,
            slots,
            dragging,
            snap_marker,
            variables: self.graph.variables.clone(),
            zoom: self.viewport.zoom,
        }
    }

    fn block_view(&self, block: &PlacedBlock, canvas: Rect, depth: usize) -> BlockView {
        let def = catalog().get(&block.block_type);
        BlockView {
            id: block.id,
            block_type: block.block_type.clone(),
            category: def.map(|d| d.category),
            label: def
                .map(|d| d.render_label(&block.values))
                .unwrap_or_else(|| block.block_type.clone()),
            rect: self.screen_rect(canvas),
            depth,
        }
    }

    fn screen_rect(&self, canvas: Rect) -> Rect {
        Rect::from_corners(
            self.viewport.canvas_to_screen(canvas.min),
            self.viewport.canvas_to_screen(canvas.max),
        )
    }

    fn snap_point(&self, layout: &Layout, target: SnapTarget) -> Option<Vec2> {
        match target {
            SnapTarget::AppendAfter(id) => layout.block(id).map(|b| b.bottom_center()),
            SnapTarget::PrependBefore(id) => layout.block(id).map(|b| b.top_center()),
            SnapTarget::Nest { owner, slot } => layout
                .slots_of(owner)
                .find(|s| s.slot == slot)
                .map(|s| s.rect.center()),
        }
    }
}

pub struct EditorPlugin;

impl Plugin for EditorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EditorSession>().add_systems(
            Update,
            (
                sync_editor_objects.run_if(resource_exists::<ObjectTable>),
                drive_editor_from_pointer
                    .run_if(resource_exists::<ButtonInput<MouseButton>>)
                    .run_if(crate::game_runtime::editing_enabled),
            ),
        );
    }
}

fn sync_editor_objects(objects: Res<ObjectTable>, mut editor: ResMut<EditorSession>) {
    if objects.is_changed() {
        editor.set_objects(objects.ids());
    }
}

fn drive_editor_from_pointer(
    windows: Query<&Window, With<PrimaryWindow>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut wheel: EventReader<MouseWheel>,
    mut editor: ResMut<EditorSession>,
    mut last_cursor: Local<Option<Vec2>>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        *last_cursor = None;
        return;
    };

    if buttons.just_pressed(MouseButton::Left) && !editor.is_dragging() {
        if let Some(source) = editor.pick(cursor) {
            if let Err(e) = editor.begin_drag(source, cursor) {
                warn!("[Blockplay editor] {}", e);
            }
        }
    }
    if editor.is_dragging() {
        editor.update_drag(cursor);
        if buttons.just_released(MouseButton::Left) {
            if let Some(outcome) = editor.end_drag(cursor) {
                debug!("[Blockplay editor] Drop: {:?}", outcome);
            }
        }
    }

    if buttons.pressed(MouseButton::Right) || buttons.pressed(MouseButton::Middle) {
        if let Some(previous) = *last_cursor {
            let delta = cursor - previous;
            editor.pan(delta.x, delta.y);
        }
    }
    *last_cursor = Some(cursor);

    for event in wheel.read() {
        editor.zoom(event.y.signum() * WHEEL_ZOOM_STEP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockNode, ChainNode, SlotKind};

    fn palette_point(editor: &EditorSession, block_type: &str) -> Vec2 {
        editor
            .palette_entries()
            .into_iter()
            .find(|e| e.block_type == block_type)
            .map(|e| e.rect.min + Vec2::splat(4.0))
            .expect("palette entry")
    }

    fn canvas_point(editor: &EditorSession, x: f32, y: f32) -> Vec2 {
        editor.viewport().canvas_to_screen(Vec2::new(x, y))
    }

    /// Drags a palette block and drops it so its top-left lands at canvas (x, y).
    fn drop_new(editor: &mut EditorSession, block_type: &'static str, x: f32, y: f32) -> DropOutcome {
        let grab = palette_point(editor, block_type);
        editor
            .begin_drag(DragSource::Palette(block_type), grab)
            .expect("begin");
        // Grab offset is 4px in from the corner.
        let target = canvas_point(editor, x + 4.0, y + 4.0);
        editor.end_drag(target).expect("drop")
    }

    #[test]
    fn palette_lists_every_catalog_block_grouped_by_category() {
        let editor = EditorSession::default();
        let entries = editor.palette_entries();
        assert_eq!(entries.len(), catalog().iter().count());
        let firsts: Vec<_> = entries.iter().map(|e| e.category).collect();
        let mut seen = Vec::new();
        for c in firsts {
            if seen.last() != Some(&c) {
                assert!(!seen.contains(&c), "category {:?} split", c);
                seen.push(c);
            }
        }
        assert_eq!(
            editor.pick(palette_point(&editor, "on_start")),
            Some(DragSource::Palette("on_start"))
        );
    }

    #[test]
    fn building_a_chain_through_drags() {
        let mut editor = EditorSession::default();
        let outcome = drop_new(&mut editor, "on_start", 100.0, 100.0);
        assert!(matches!(outcome, DropOutcome::NewChain(_)));
        let start_id = editor.graph().chains[0].blocks[0].id;

        let outcome = drop_new(&mut editor, "set_var", 102.0, 100.0 + BLOCK_HEIGHT + 6.0);
        assert_eq!(outcome, DropOutcome::Snapped(SnapTarget::AppendAfter(start_id)));
        assert_eq!(editor.graph().chains.len(), 1);
        assert_eq!(editor.graph().chains[0].blocks.len(), 2);

        let outcome = drop_new(&mut editor, "wait", 700.0, 400.0);
        assert!(matches!(outcome, DropOutcome::NewChain(_)));
        assert_eq!(editor.graph().chains.len(), 2);
    }

    #[test]
    fn hat_payload_never_snaps() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        let outcome = drop_new(&mut editor, "on_key", 100.0, 100.0 + BLOCK_HEIGHT);
        assert!(matches!(outcome, DropOutcome::NewChain(_)));
        assert_eq!(editor.graph().chains.len(), 2);
        assert!(editor.graph().chains.iter().all(|c| c.blocks.len() == 1));
    }

    #[test]
    fn prepend_moves_chain_up() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "wait", 100.0, 200.0);
        let head = editor.graph().chains[0].blocks[0].id;
        let outcome = drop_new(&mut editor, "hide_obj", 100.0, 200.0 - BLOCK_HEIGHT - 2.0);
        assert_eq!(outcome, DropOutcome::Snapped(SnapTarget::PrependBefore(head)));
        let chain = &editor.graph().chains[0];
        assert_eq!(chain.blocks[0].block_type, "hide_obj");
        assert_eq!(chain.position.y, 200.0 - BLOCK_HEIGHT);
    }

    #[test]
    fn dragging_a_placed_block_carries_the_blocks_below() {
        let mut editor = EditorSession::default();
        editor.load(&ScriptDocument {
            chains: vec![ChainNode {
                id: 1,
                x: 0.0,
                y: 0.0,
                blocks: vec![
                    BlockNode::new("on_start"),
                    BlockNode::new("wait").with("seconds", 1),
                    BlockNode::new("end_game"),
                ],
            }],
            variables: vec![],
        });
        let second = editor.graph().chains[0].blocks[1].id;
        let grab = canvas_point(&editor, 10.0, BLOCK_HEIGHT + 10.0);
        assert_eq!(editor.pick(grab), Some(DragSource::Placed(second)));
        editor
            .begin_drag(DragSource::Placed(second), grab)
            .expect("begin");
        assert_eq!(editor.graph().chains[0].blocks.len(), 1);

        let outcome = editor
            .end_drag(canvas_point(&editor, 510.0, 310.0))
            .expect("drop");
        assert!(matches!(outcome, DropOutcome::NewChain(_)));
        let moved = &editor.graph().chains[1];
        assert_eq!(moved.position, Vec2::new(500.0, 300.0));
        let types: Vec<_> = moved.blocks.iter().map(|b| b.block_type.as_str()).collect();
        assert_eq!(types, ["wait", "end_game"]);
    }

    #[test]
    fn dropping_on_trash_or_outside_canvas_discards() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        let id = editor.graph().chains[0].blocks[0].id;
        let grab = canvas_point(&editor, 110.0, 110.0);
        editor.begin_drag(DragSource::Placed(id), grab).expect("begin");
        assert!(editor.graph().chains.is_empty());
        let trash = editor.config.trash.center();
        assert_eq!(editor.end_drag(trash), Some(DropOutcome::Discarded));
        assert!(editor.graph().chains.is_empty());

        let grab = palette_point(&editor, "wait");
        editor.begin_drag(DragSource::Palette("wait"), grab).expect("begin");
        assert_eq!(editor.end_drag(grab), Some(DropOutcome::Discarded));
        assert_eq!(editor.graph().block_count(), 0);
    }

    #[test]
    fn nesting_into_c_block_slot() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "if_else", 100.0, 100.0);
        let owner = editor.graph().chains[0].blocks[0].id;
        let slot = editor
            .layout()
            .slots_of(owner)
            .find(|s| s.slot == SlotKind::Else)
            .map(|s| s.rect)
            .expect("else slot");
        let outcome = drop_new(&mut editor, "end_game", slot.min.x, slot.min.y);
        assert_eq!(
            outcome,
            DropOutcome::Snapped(SnapTarget::Nest {
                owner,
                slot: SlotKind::Else
            })
        );
        let block = editor.graph().find_block(owner).expect("owner");
        assert_eq!(block.else_children.as_ref().map(Vec::len), Some(1));
        assert_eq!(block.children.as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn pan_and_zoom_leave_graph_untouched() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        let before = editor.serialize();
        editor.pan(40.0, -25.0);
        editor.zoom(0.5);
        editor.zoom(100.0);
        assert_eq!(editor.viewport().zoom, editor.config.max_zoom);
        assert_eq!(editor.serialize(), before);
    }

    #[test]
    fn field_edits_are_validated() {
        let mut editor = EditorSession::default();
        editor.set_objects(vec!["door".into(), "coin".into(), "door".into()]);
        assert_eq!(editor.objects(), ["coin", "door"]);
        editor.declare_variable("hp").expect("declare");
        assert!(editor.declare_variable("hp").is_err());

        drop_new(&mut editor, "move_obj", 100.0, 100.0);
        let id = editor.graph().chains[0].blocks[0].id;
        let block = editor.graph().find_block(id).expect("block");
        assert_eq!(block.value("object"), "coin");

        editor.set_field(id, "dx", "12.5").expect("number");
        assert!(editor.set_field(id, "dx", "fast").is_err());
        assert!(editor.set_field(id, "object", "ghost").is_err());
        editor.set_field(id, "object", "door").expect("object");
        assert!(editor.set_field(id, "nope", "1").is_err());
        assert!(editor.set_field(9999, "dx", "1").is_err());

        let block = editor.graph().find_block(id).expect("block");
        assert_eq!(block.value("dx"), "12.5");
        assert_eq!(block.value("object"), "door");

        assert!(editor.remove_variable("hp"));
        assert!(!editor.remove_variable("hp"));
    }

    #[test]
    fn editor_round_trip_and_view_labels() {
        let mut editor = EditorSession::default();
        editor.declare_variable("x").expect("declare");
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        drop_new(&mut editor, "repeat_n", 100.0, 100.0 + BLOCK_HEIGHT);
        let repeat = editor.graph().chains[0].blocks[1].id;
        let slot = editor.layout().slots_of(repeat).next().map(|s| s.rect).expect("slot");
        drop_new(&mut editor, "change_var", slot.min.x, slot.min.y);
        editor.set_field(repeat, "times", "3").expect("times");

        let doc = editor.serialize();
        assert_eq!(doc.block_count(), 3);
        assert_eq!(doc.variables, vec!["x".to_string()]);

        let mut other = EditorSession::default();
        other.load(&doc);
        assert_eq!(other.serialize().block_count(), 3);
        assert_eq!(other.serialize().chains[0].blocks, doc.chains[0].blocks);

        let view = other.view();
        assert_eq!(view.blocks.len(), 3);
        assert!(view.blocks.iter().any(|b| b.label.contains('3')));
        assert_eq!(view.slots.len(), 1);
        assert!(view.dragging.is_empty());

        other.destroy();
        assert_eq!(other.graph().block_count(), 0);
        assert!(other.serialize().variables.is_empty());
    }

    #[test]
    fn load_never_reuses_earlier_block_ids() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        drop_new(&mut editor, "wait", 100.0, 100.0 + BLOCK_HEIGHT);
        let before: Vec<BlockId> = editor.layout().blocks.iter().map(|b| b.id).collect();
        assert_eq!(before.len(), 2);

        let doc = editor.serialize();
        editor.load(&doc);
        let after: Vec<BlockId> = editor.layout().blocks.iter().map(|b| b.id).collect();
        assert_eq!(after.len(), 2);
        assert!(after.iter().all(|id| !before.contains(id)));

        // A stale id no longer names any block.
        assert!(editor.set_field(before[1], "seconds", "2").is_err());
        assert_eq!(editor.serialize().chains[0].blocks, doc.chains[0].blocks);
    }

    #[test]
    fn snap_radius_is_measured_on_screen() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        editor.zoom(1.0);
        assert_eq!(editor.viewport().zoom, 2.0);

        // Grab offset scales with zoom: 4 screen px is 2 canvas units.
        let grab = palette_point(&editor, "wait");
        editor.begin_drag(DragSource::Palette("wait"), grab).expect("begin");
        // 30 canvas units below the append point is 60 px on screen.
        let far = canvas_point(&editor, 102.0, 102.0 + BLOCK_HEIGHT + 30.0);
        assert_eq!(editor.update_drag(far), None);
        // 15 canvas units is 30 px, inside the 40 px radius.
        let near = canvas_point(&editor, 102.0, 102.0 + BLOCK_HEIGHT + 15.0);
        assert!(matches!(
            editor.update_drag(near),
            Some(SnapTarget::AppendAfter(_))
        ));
    }

    #[test]
    fn view_exposes_drag_highlight() {
        let mut editor = EditorSession::default();
        drop_new(&mut editor, "on_start", 100.0, 100.0);
        let grab = palette_point(&editor, "wait");
        editor.begin_drag(DragSource::Palette("wait"), grab).expect("begin");
        editor.update_drag(canvas_point(&editor, 104.0, 104.0 + BLOCK_HEIGHT));
        assert!(editor.snap_target().is_some());
        let view = editor.view();
        assert_eq!(view.dragging.len(), 1);
        assert!(view.snap_marker.is_some());
        assert!(editor.begin_drag(DragSource::Palette("wait"), grab).is_err());
    }
}
