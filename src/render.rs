use bevy::gizmos::config::GizmoConfigStore;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::blocks::BlockCategory;
use crate::editor::{BlockView, EditorSession};
use crate::game_host::{GameContext, ObjectTable};
use crate::game_runtime::SessionMode;
use crate::scripting::ScriptRuntime;

const LABEL_FONT_SIZE: f32 = 13.0;
const MAX_FAULT_LINES: usize = 5;

/// Draws the editor view model and the play field with gizmos, plus text
/// labels and a status line.
pub struct RenderPlugin;

#[derive(Component)]
struct StatusText;

/// Pooled block label; index into the frame's label list.
#[derive(Component)]
struct BlockLabel(usize);

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_render)
            .add_systems(Update, update_status_text)
            .add_systems(
                Update,
                (draw_editor, sync_block_labels)
                    .run_if(resource_exists::<GizmoConfigStore>)
                    .run_if(crate::game_runtime::editing_enabled),
            )
            .add_systems(
                Update,
                draw_play_field
                    .run_if(resource_exists::<GizmoConfigStore>)
                    .run_if(not(crate::game_runtime::editing_enabled)),
            );
    }
}

fn setup_render(mut commands: Commands) {
    commands.spawn(Camera2d);
    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(Color::srgba(0.95, 1.0, 0.98, 0.95)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            top: Val::Px(8.0),
            ..default()
        },
        StatusText,
    ));
}

/// Screen space is top-left origin, y down; the 2D camera is centered, y up.
fn to_world(window: &Window, screen: Vec2) -> Vec2 {
    Vec2::new(screen.x - window.width() * 0.5, window.height() * 0.5 - screen.y)
}

fn category_color(category: Option<BlockCategory>) -> Color {
    let hex = match category {
        Some(BlockCategory::Events) => "#f2b134",
        Some(BlockCategory::Motion) => "#4c97ff",
        Some(BlockCategory::Looks) => "#9966ff",
        Some(BlockCategory::Variables) => "#ff8c1a",
        Some(BlockCategory::Control) => "#ffab19",
        Some(BlockCategory::Game) => "#59c059",
        Some(BlockCategory::Functions) => "#ff6680",
        None => "#888888",
    };
    Srgba::hex(hex).map(Color::Srgba).unwrap_or(Color::WHITE)
}

fn draw_rect(gizmos: &mut Gizmos, window: &Window, rect: Rect, color: Color) {
    gizmos.rect_2d(to_world(window, rect.center()), rect.size(), color);
}

fn draw_editor(
    windows: Query<&Window, With<PrimaryWindow>>,
    editor: Res<EditorSession>,
    mut gizmos: Gizmos,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let view = editor.view();

    draw_rect(&mut gizmos, window, editor.config.palette, Color::srgba(1.0, 1.0, 1.0, 0.2));
    draw_rect(&mut gizmos, window, editor.config.trash, Color::srgba(1.0, 0.25, 0.2, 0.8));
    for entry in &view.palette {
        draw_rect(&mut gizmos, window, entry.rect, category_color(Some(entry.category)));
    }
    for block in &view.blocks {
        draw_rect(&mut gizmos, window, block.rect, category_color(block.category));
    }
    for slot in &view.slots {
        draw_rect(&mut gizmos, window, *slot, Color::srgba(1.0, 1.0, 1.0, 0.25));
    }
    for block in &view.dragging {
        draw_rect(&mut gizmos, window, block.rect, Color::srgba(1.0, 1.0, 1.0, 0.9));
    }
    if let Some(marker) = view.snap_marker {
        gizmos.circle_2d(
            to_world(window, marker),
            6.0,
            Color::srgba(1.0, 0.95, 0.2, 1.0),
        );
    }
}

fn sync_block_labels(
    mut commands: Commands,
    windows: Query<&Window, With<PrimaryWindow>>,
    editor: Res<EditorSession>,
    mut labels: Query<(&BlockLabel, &mut Text2d, &mut Transform, &mut Visibility)>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let view = editor.view();
    let wanted: Vec<(String, Vec2)> = view
        .palette
        .iter()
        .map(|e| (e.label.clone(), e.rect.min))
        .chain(
            view.blocks
                .iter()
                .chain(view.dragging.iter())
                .map(|b: &BlockView| (b.label.clone(), b.rect.min)),
        )
        .map(|(text, top_left)| (text, to_world(window, top_left + Vec2::new(6.0, 12.0))))
        .collect();

    let mut seen = vec![false; wanted.len()];
    for (label, mut text, mut transform, mut visibility) in labels.iter_mut() {
        match wanted.get(label.0) {
            Some((content, at)) => {
                if text.0 != *content {
                    text.0 = content.clone();
                }
                transform.translation = at.extend(1.0);
                *visibility = Visibility::Visible;
                seen[label.0] = true;
            }
            None => *visibility = Visibility::Hidden,
        }
    }
    for (index, (content, at)) in wanted.into_iter().enumerate() {
        if seen[index] {
            continue;
        }
        commands.spawn((
            Text2d::new(content),
            TextFont {
                font_size: LABEL_FONT_SIZE,
                ..default()
            },
            TextColor(Color::BLACK),
            bevy::sprite::Anchor::TopLeft,
            Transform::from_translation(at.extend(1.0)),
            BlockLabel(index),
        ));
    }
}

fn draw_play_field(
    windows: Query<&Window, With<PrimaryWindow>>,
    game: Res<GameContext>,
    objects: Res<ObjectTable>,
    mut gizmos: Gizmos,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    for id in objects.ids() {
        let Some(object) = objects.get(&id) else {
            continue;
        };
        if !object.visible {
            continue;
        }
        let bb = object.aabb();
        let rect = Rect::new(bb.x, bb.y, bb.x + bb.w, bb.y + bb.h);
        draw_rect(&mut gizmos, window, rect, object.color);
    }
    let p = game.player;
    draw_rect(
        &mut gizmos,
        window,
        Rect::new(p.x, p.y, p.x + p.w, p.y + p.h),
        Color::srgba(0.2, 0.9, 1.0, 1.0),
    );
}

fn update_status_text(
    state: Option<Res<State<SessionMode>>>,
    runtime: Res<ScriptRuntime>,
    game: Res<GameContext>,
    mut query: Query<&mut Text, With<StatusText>>,
) {
    let Ok(mut text) = query.get_single_mut() else {
        return;
    };
    let mode = state.map(|s| *s.get()).unwrap_or_default();
    let mut output = match mode {
        SessionMode::Editing => "EDITING  [F5 play, Ctrl+S save]".to_string(),
        SessionMode::Playing => format!("PLAYING  score {:.0}  [F5 stop]", game.score),
        SessionMode::GameOver => format!("GAME OVER  score {:.0}  [F5 edit]", game.score),
    };
    if let Some(overlay) = runtime.overlay() {
        output.push_str(&format!("\n{}", overlay.text));
    }
    let faults = &runtime.faults().entries;
    let start = faults.len().saturating_sub(MAX_FAULT_LINES);
    for fault in &faults[start..] {
        output.push_str(&format!("\n[{}] {}: {}", fault.origin, fault.action, fault.message));
    }
    if text.0 != output {
        text.0 = output;
    }
}
