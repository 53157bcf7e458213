use bevy::prelude::*;

use crate::game_host::GameContext;

/// Mirrors the physical keyboard into `GameContext::keys` using the same
/// normalized names scripts bind against.
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            PreUpdate,
            keyboard_to_game_keys
                .run_if(resource_exists::<ButtonInput<KeyCode>>)
                .run_if(resource_exists::<GameContext>),
        );
    }
}

fn keyboard_to_game_keys(keyboard: Res<ButtonInput<KeyCode>>, mut game: ResMut<GameContext>) {
    game.keys.clear();
    for code in keyboard.get_pressed() {
        if let Some(name) = key_code_name(*code) {
            game.keys.insert(name.to_string());
        }
    }
}

pub fn key_code_name(code: KeyCode) -> Option<&'static str> {
    let name = match code {
        KeyCode::Space => "space",
        KeyCode::ArrowUp => "up",
        KeyCode::ArrowDown => "down",
        KeyCode::ArrowLeft => "left",
        KeyCode::ArrowRight => "right",
        KeyCode::Enter | KeyCode::NumpadEnter => "enter",
        KeyCode::Escape => "escape",
        KeyCode::ShiftLeft | KeyCode::ShiftRight => "shift",
        KeyCode::KeyA => "a",
        KeyCode::KeyB => "b",
        KeyCode::KeyC => "c",
        KeyCode::KeyD => "d",
        KeyCode::KeyE => "e",
        KeyCode::KeyF => "f",
        KeyCode::KeyG => "g",
        KeyCode::KeyH => "h",
        KeyCode::KeyI => "i",
        KeyCode::KeyJ => "j",
        KeyCode::KeyK => "k",
        KeyCode::KeyL => "l",
        KeyCode::KeyM => "m",
        KeyCode::KeyN => "n",
        KeyCode::KeyO => "o",
        KeyCode::KeyP => "p",
        KeyCode::KeyQ => "q",
        KeyCode::KeyR => "r",
        KeyCode::KeyS => "s",
        KeyCode::KeyT => "t",
        KeyCode::KeyU => "u",
        KeyCode::KeyV => "v",
        KeyCode::KeyW => "w",
        KeyCode::KeyX => "x",
        KeyCode::KeyY => "y",
        KeyCode::KeyZ => "z",
        KeyCode::Digit0 => "0",
        KeyCode::Digit1 => "1",
        KeyCode::Digit2 => "2",
        KeyCode::Digit3 => "3",
        KeyCode::Digit4 => "4",
        KeyCode::Digit5 => "5",
        KeyCode::Digit6 => "6",
        KeyCode::Digit7 => "7",
        KeyCode::Digit8 => "8",
        KeyCode::Digit9 => "9",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_match_normalized_form() {
        for code in [KeyCode::Space, KeyCode::ArrowLeft, KeyCode::KeyW, KeyCode::Enter] {
            let name = key_code_name(code).expect("mapped");
            assert_eq!(crate::game_host::normalize_key(name), name);
        }
        assert_eq!(key_code_name(KeyCode::F12), None);
    }

    #[test]
    fn plugin_mirrors_held_keys() {
        let mut app = App::new();
        app.insert_resource(GameContext::default())
            .insert_resource(ButtonInput::<KeyCode>::default())
            .add_plugins(InputPlugin);

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::Space);
        app.update();
        assert!(app.world().resource::<GameContext>().is_key_down("space"));

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .release(KeyCode::Space);
        app.update();
        assert!(!app.world().resource::<GameContext>().is_key_down("space"));
    }
}
