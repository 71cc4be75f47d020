//! Keyboard Module
//!
//! Transport-independent key model, modifier masks and the shortcut table.
//! The X11 transport translates keysyms into [`Key`] before events reach the core.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wm::error::Error;

/// A key the window manager cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Tab,
    Escape,
    Return,
    Space,
    Left,
    Right,
    Up,
    Down,
    /// Function keys F1..F12
    F(u8),
    /// Printable key, lowercase
    Char(char),
    /// Any modifier key (Alt, Control, Shift, Super) going up or down
    Modifier,
    /// Keysym we do not model
    Other(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Tab => write!(f, "Tab"),
            Key::Escape => write!(f, "Escape"),
            Key::Return => write!(f, "Return"),
            Key::Space => write!(f, "Space"),
            Key::Left => write!(f, "Left"),
            Key::Right => write!(f, "Right"),
            Key::Up => write!(f, "Up"),
            Key::Down => write!(f, "Down"),
            Key::F(n) => write!(f, "F{n}"),
            Key::Char(c) => write!(f, "{c}"),
            Key::Modifier => write!(f, "Modifier"),
            Key::Other(sym) => write!(f, "0x{sym:x}"),
        }
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.to_ascii_lowercase().as_str() {
            "tab" => Key::Tab,
            "escape" | "esc" => Key::Escape,
            "return" | "enter" => Key::Return,
            "space" => Key::Space,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_graphic() => Key::Char(c),
                    (Some('f'), Some(_)) => match other[1..].parse::<u8>() {
                        Ok(n) if (1..=12).contains(&n) => Key::F(n),
                        _ => return Err(Error::InvalidBinding(s.to_string())),
                    },
                    _ => return Err(Error::InvalidBinding(s.to_string())),
                }
            }
        };

        Ok(key)
    }
}

bitflags! {
    /// Modifier state relevant to bindings; lock modifiers are stripped by the transport
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u8 {
        const SHIFT   = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT     = 1 << 2;
        const SUPER   = 1 << 3;
    }
}

/// A modifier set plus a key, parsed from strings such as `"Alt+Shift+Tab"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub mods: ModMask,
    pub key: Key,
}

impl KeyCombo {
    pub fn new(mods: ModMask, key: Key) -> Self {
        Self { mods, key }
    }
}

impl FromStr for KeyCombo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = match parts.pop() {
            Some(k) if !k.is_empty() => k.parse()?,
            _ => return Err(Error::InvalidBinding(s.to_string())),
        };

        let mut mods = ModMask::empty();
        for part in parts {
            mods |= match part.to_ascii_lowercase().as_str() {
                "shift" => ModMask::SHIFT,
                "ctrl" | "control" => ModMask::CONTROL,
                "alt" | "mod1" => ModMask::ALT,
                "super" | "mod4" | "logo" => ModMask::SUPER,
                _ => return Err(Error::InvalidBinding(s.to_string())),
            };
        }

        Ok(Self { mods, key })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (ModMask::CONTROL, "Ctrl"),
            (ModMask::ALT, "Alt"),
            (ModMask::SUPER, "Super"),
            (ModMask::SHIFT, "Shift"),
        ] {
            if self.mods.contains(flag) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// Keyboard shortcut action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardAction {
    CycleForward,
    CycleBackward,
    MoveWindow,
    ResizeWindow,
    CloseWindow,
    KillWindow,
    RaiseWindow,
    LowerWindow,
    ToggleMaximize,
    PreviousWorkspace,
    NextWorkspace,
    SwitchWorkspace(u32),
    MoveToWorkspace(u32),
}

/// Shortcut table
#[derive(Debug, Clone, Default)]
pub struct KeyboardManager {
    bindings: HashMap<KeyCombo, KeyboardAction>,
}

impl KeyboardManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configuration strings. Any unparsable combo is an error.
    pub fn from_config(bindings: &HashMap<String, KeyboardAction>) -> Result<Self, Error> {
        let mut manager = Self::new();
        for (combo, action) in bindings {
            manager.add_binding(combo.parse()?, *action);
        }
        Ok(manager)
    }

    pub fn add_binding(&mut self, combo: KeyCombo, action: KeyboardAction) {
        debug!(%combo, ?action, "adding key binding");
        self.bindings.insert(combo, action);
    }

    pub fn handle_key_press(&self, mods: ModMask, key: Key) -> Option<KeyboardAction> {
        self.bindings.get(&KeyCombo::new(mods, key)).copied()
    }

    /// Every combo, for grabbing on the root window
    pub fn combos(&self) -> impl Iterator<Item = &KeyCombo> {
        self.bindings.keys()
    }
}

/// Default shortcuts, as written into a freshly generated config file
pub fn default_bindings() -> HashMap<String, KeyboardAction> {
    use KeyboardAction::*;

    [
        ("Alt+Tab", CycleForward),
        ("Alt+Shift+Tab", CycleBackward),
        ("Alt+F7", MoveWindow),
        ("Alt+F8", ResizeWindow),
        ("Alt+F4", CloseWindow),
        ("Alt+Shift+F4", KillWindow),
        ("Alt+F3", RaiseWindow),
        ("Alt+F2", LowerWindow),
        ("Alt+F10", ToggleMaximize),
        ("Ctrl+Alt+Left", PreviousWorkspace),
        ("Ctrl+Alt+Right", NextWorkspace),
    ]
    .into_iter()
    .map(|(combo, action)| (combo.to_string(), action))
    .collect()
}
