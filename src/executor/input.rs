//! Physical input injection via enigo.

use std::thread;
use std::time::Duration;

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::action::{Action, BoxCoords, ScrollDirection};
use crate::executor::ActionExecutor;

/// Pause after positioning the cursor before pressing a button, so the
/// target application sees the hover first.
const SETTLE: Duration = Duration::from_millis(150);

/// Executes actions by injecting OS-level mouse and keyboard input.
///
/// Holds no enigo handle; a fresh connection is opened per action, which
/// keeps the type `Send` and survives display reconfiguration mid-run.
pub struct EnigoExecutor;

impl ActionExecutor for EnigoExecutor {
    fn execute(&mut self, action: &Action, width: u32, height: u32) -> String {
        match action {
            Action::Click { target, region }
            | Action::DoubleClick { target, region }
            | Action::RightClick { target, region } => {
                let name = action.name();
                let Some(region) = region else {
                    return format!("ERROR: {name} action missing <box> coordinates");
                };
                let (cx, cy) = region.center(width, height);
                let target = target.as_deref().unwrap_or("element");
                match click_at(action, cx, cy) {
                    Ok(()) => format!("{name} on '{target}' at ({cx}, {cy})"),
                    Err(e) => format!("ERROR: {name} failed: {e}"),
                }
            }

            Action::Type { text } => {
                if text.is_empty() {
                    return "ERROR: type action missing <text>".to_string();
                }
                match type_text(text) {
                    Ok(()) => {
                        let shown: String = text.chars().take(50).collect();
                        let ellipsis = if text.chars().count() > 50 { "..." } else { "" };
                        format!("typed '{shown}{ellipsis}'")
                    }
                    Err(e) => format!("ERROR: type failed: {e}"),
                }
            }

            Action::Hotkey { keys } => {
                if keys.is_empty() {
                    return "ERROR: hotkey action missing <keys>".to_string();
                }
                match press_hotkey(keys) {
                    Ok(()) => format!("hotkey {}", keys.join("+")),
                    Err(e) => format!("ERROR: hotkey failed: {e}"),
                }
            }

            Action::Scroll { direction, amount } => match scroll(*direction, *amount) {
                Ok(()) => format!("scroll {} {amount}", direction.as_str()),
                Err(e) => format!("ERROR: scroll failed: {e}"),
            },

            Action::Drag { from, to } => {
                let (Some(from), Some(to)) = (from, to) else {
                    return "ERROR: drag action missing <from> or <to> boxes".to_string();
                };
                let (fx, fy) = from.center(width, height);
                let (tx, ty) = to.center(width, height);
                match drag(fx, fy, tx, ty) {
                    Ok(()) => format!("drag from ({fx},{fy}) to ({tx},{ty})"),
                    Err(e) => format!("ERROR: drag failed: {e}"),
                }
            }

            Action::Wait { seconds } => {
                let seconds = seconds.clamp(0.0, 300.0);
                thread::sleep(Duration::from_secs_f64(seconds));
                format!("waited {seconds}s")
            }

            // The engine handles these before execution; reaching here is
            // still safe.
            Action::Done { .. } | Action::Unknown { .. } => {
                format!("unknown action: {}", action.name())
            }
        }
    }
}

fn connect() -> Result<Enigo, String> {
    Enigo::new(&Settings::default()).map_err(|e| e.to_string())
}

fn click_at(action: &Action, x: i32, y: i32) -> Result<(), String> {
    let mut enigo = connect()?;
    enigo
        .move_mouse(x, y, Coordinate::Abs)
        .map_err(|e| e.to_string())?;
    thread::sleep(SETTLE);
    let press = |enigo: &mut Enigo, button: Button| {
        enigo.button(button, Direction::Click).map_err(|e| e.to_string())
    };
    match action {
        Action::DoubleClick { .. } => {
            press(&mut enigo, Button::Left)?;
            thread::sleep(Duration::from_millis(60));
            press(&mut enigo, Button::Left)
        }
        Action::RightClick { .. } => press(&mut enigo, Button::Right),
        _ => press(&mut enigo, Button::Left),
    }
}

fn type_text(text: &str) -> Result<(), String> {
    let mut enigo = connect()?;
    enigo.text(text).map_err(|e| e.to_string())
}

fn press_hotkey(keys: &[String]) -> Result<(), String> {
    let mut enigo = connect()?;
    let mapped: Vec<Key> = keys
        .iter()
        .map(|k| key_from_name(k).ok_or_else(|| format!("unrecognized key '{k}'")))
        .collect::<Result<_, _>>()?;

    // Press in the given order, release in reverse, so modifier chords like
    // ctrl+shift+s land the way a human would press them.
    for key in &mapped {
        enigo.key(*key, Direction::Press).map_err(|e| e.to_string())?;
    }
    for key in mapped.iter().rev() {
        enigo
            .key(*key, Direction::Release)
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn scroll(direction: ScrollDirection, amount: i64) -> Result<(), String> {
    let mut enigo = connect()?;
    let amount = amount.clamp(1, 100) as i32;
    // enigo: positive = down / right.
    let (length, axis) = match direction {
        ScrollDirection::Down => (amount, Axis::Vertical),
        ScrollDirection::Up => (-amount, Axis::Vertical),
        ScrollDirection::Right => (amount, Axis::Horizontal),
        ScrollDirection::Left => (-amount, Axis::Horizontal),
    };
    enigo.scroll(length, axis).map_err(|e| e.to_string())
}

fn drag(fx: i32, fy: i32, tx: i32, ty: i32) -> Result<(), String> {
    let mut enigo = connect()?;
    enigo
        .move_mouse(fx, fy, Coordinate::Abs)
        .map_err(|e| e.to_string())?;
    thread::sleep(SETTLE);
    enigo
        .button(Button::Left, Direction::Press)
        .map_err(|e| e.to_string())?;
    let result = (|| {
        thread::sleep(SETTLE);
        enigo
            .move_mouse(tx, ty, Coordinate::Abs)
            .map_err(|e| e.to_string())
    })();
    // Always release the button, even if the move failed mid-drag.
    let release = enigo
        .button(Button::Left, Direction::Release)
        .map_err(|e| e.to_string());
    result.and(release)
}

fn key_from_name(name: &str) -> Option<Key> {
    let lower = name.to_ascii_lowercase();
    let key = match lower.as_str() {
        "ctrl" | "control" => Key::Control,
        "shift" => Key::Shift,
        "alt" => Key::Alt,
        "win" | "meta" | "cmd" | "super" => Key::Meta,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => {
            let mut chars = lower.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            Key::Unicode(c)
        }
    };
    Some(key)
}
